//! Flashbots 中继客户端
//!
//! 把单笔签名交易包装成 Bundle，通过 `eth_sendBundle` 发给中继

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::H256;
use ethers::utils::keccak256;
use models::CandidateTransaction;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::bundle::Bundle;
use super::types::{RelayRequest, RelayResponse, SendBundleResult};
use crate::types::RelayError;

/// Bundle 中继
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// 提交交易，返回 bundle 哈希
    async fn submit(&self, tx: &CandidateTransaction) -> Result<H256, RelayError>;
}

/// Flashbots 风格的中继客户端
pub struct FlashbotsRelay {
    /// 中继 URL
    endpoint: String,
    http_client: Client,
    /// Bundle 签名钱包（用于向中继证明身份）
    signer: LocalWallet,
    next_id: AtomicU64,
}

impl FlashbotsRelay {
    pub fn new(endpoint: impl Into<String>, signer: LocalWallet) -> Result<Self, RelayError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
            signer,
            next_id: AtomicU64::new(1),
        })
    }

    /// 发送签名的请求到中继
    async fn send_signed_request<P, T>(&self, method: &'static str, params: &[P]) -> Result<T, RelayError>
    where
        P: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&RelayRequest::new(id, method, params))?;
        let auth_header = flashbots_signature(&self.signer, &body).await?;

        debug!("X-Flashbots-Signature: {}", auth_header);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("X-Flashbots-Signature", auth_header)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RelayError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<RelayResponse<T>>(&text)?.into_result()
    }
}

#[async_trait]
impl BundleRelay for FlashbotsRelay {
    async fn submit(&self, tx: &CandidateTransaction) -> Result<H256, RelayError> {
        info!("发送 Flashbots Bundle: tx={}, 目标区块 {}", tx.hash_hex(), tx.target_block);

        let result: SendBundleResult = self
            .send_signed_request("eth_sendBundle", &[Bundle::single(tx)])
            .await?;

        info!("Bundle 已发送: {:?}", result.bundle_hash);
        Ok(result.bundle_hash)
    }
}

/// 生成 `X-Flashbots-Signature` 头
///
/// 格式 `{signer_address}:{signature}`，签名内容为
/// `keccak256(body)` 的 0x 十六进制字符串 (EIP-191)
async fn flashbots_signature(signer: &LocalWallet, body: &str) -> Result<String, RelayError> {
    let body_hash = keccak256(body.as_bytes());
    let hash_hex = format!("0x{}", hex::encode(body_hash));
    let signature = signer
        .sign_message(hash_hex.as_bytes())
        .await
        .map_err(|e| RelayError::Signing(e.to_string()))?;

    // r (32) + s (32) + v (1)，v 必须是 27 或 28
    let mut sig_bytes = signature.to_vec();
    if sig_bytes.len() == 65 && sig_bytes[64] < 27 {
        sig_bytes[64] += 27;
    }

    let signer_addr = format!("0x{}", hex::encode(signer.address().as_bytes()));
    Ok(format!("{}:0x{}", signer_addr, hex::encode(&sig_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_signature_header_recovers_signer() {
        let signer: LocalWallet = TEST_KEY.parse().unwrap();
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"eth_sendBundle","params":[]}"#;

        let header = flashbots_signature(&signer, body).await.unwrap();
        let (addr, sig_hex) = header.split_once(':').unwrap();

        assert_eq!(addr, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

        let sig_bytes = hex::decode(sig_hex.trim_start_matches("0x")).unwrap();
        assert_eq!(sig_bytes.len(), 65);
        assert!(sig_bytes[64] == 27 || sig_bytes[64] == 28);

        let signature = Signature::try_from(sig_bytes.as_slice()).unwrap();
        let hash_hex = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
        let recovered = signature.recover(hash_hex.as_str()).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_send_bundle_request_body() {
        let tx = CandidateTransaction::new(H256::zero(), Bytes::from(vec![0xab, 0xcd]), 256);
        let params = [Bundle::single(&tx)];
        let json = serde_json::to_value(RelayRequest::new(7, "eth_sendBundle", &params)).unwrap();

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "eth_sendBundle");
        assert_eq!(json["params"][0]["txs"][0], "0xabcd");
        assert_eq!(json["params"][0]["blockNumber"], "0x100");
    }
}
