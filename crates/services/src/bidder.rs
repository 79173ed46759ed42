use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// 出价请求引用的交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidPayload {
    /// 交易哈希 (不带 0x)
    TxHashes(Vec<String>),
    /// 签名后的原始交易 (hex, 不带 0x)
    RawTransactions(Vec<String>),
}

/// 出价网络返回的一条承诺
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    #[serde(default)]
    pub tx_hashes: Vec<String>,
    #[serde(default)]
    pub bid_amount: String,
    #[serde(default, deserialize_with = "int64_from_json")]
    pub block_number: i64,
    #[serde(default)]
    pub commitment_digest: String,
    #[serde(default)]
    pub provider_address: String,
}

/// 网关按 protojson 输出 int64，值是字符串，也兼容数字
fn int64_from_json<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// 一次出价的结果
#[derive(Debug, Clone, Default)]
pub struct BidAck {
    pub commitments: Vec<Commitment>,
}

#[derive(Debug, Error)]
pub enum BidServiceError {
    #[error("bidder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bidder rejected bid with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to decode bidder response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("bidder health check failed with status {0}")]
    Unhealthy(u16),

    #[error("bidder stream error: {0}")]
    Stream(String),
}

/// 出价服务
#[async_trait]
pub trait BidService: Send + Sync {
    async fn send_bid(
        &self,
        payload: BidPayload,
        amount_wei: U256,
        block_number: u64,
        decay_start_ms: i64,
        decay_end_ms: i64,
    ) -> Result<BidAck, BidServiceError>;
}

/// `POST /v1/bidder/bid` 请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BidRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tx_hashes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    raw_transactions: Vec<String>,
    amount: String,
    block_number: i64,
    decay_start_timestamp: i64,
    decay_end_timestamp: i64,
}

impl BidRequest {
    fn new(
        payload: BidPayload,
        amount_wei: U256,
        block_number: u64,
        decay_start_ms: i64,
        decay_end_ms: i64,
    ) -> Self {
        let (tx_hashes, raw_transactions) = match payload {
            BidPayload::TxHashes(hashes) => (hashes, Vec::new()),
            BidPayload::RawTransactions(raw) => (Vec::new(), raw),
        };

        Self {
            tx_hashes,
            raw_transactions,
            amount: amount_wei.to_string(),
            block_number: block_number as i64,
            decay_start_timestamp: decay_start_ms,
            decay_end_timestamp: decay_end_ms,
        }
    }
}

/// 流式响应中的一行: `{"result": ...}` 或 `{"error": ...}`
#[derive(Debug, Deserialize)]
struct StreamLine {
    result: Option<Commitment>,
    error: Option<Value>,
}

/// 解析换行分隔的 JSON 响应
fn parse_bid_stream(body: &str) -> Result<BidAck, BidServiceError> {
    let mut ack = BidAck::default();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: StreamLine = serde_json::from_str(line)?;
        if let Some(err) = parsed.error {
            return Err(BidServiceError::Stream(err.to_string()));
        }
        if let Some(commitment) = parsed.result {
            ack.commitments.push(commitment);
        }
    }

    Ok(ack)
}

/// mev-commit bidder 节点的 HTTP 网关客户端
pub struct MevCommitBidder {
    base_url: String,
    client: reqwest::Client,
}

impl MevCommitBidder {
    /// 创建客户端并检查 `/health`
    pub async fn connect(base_url: impl Into<String>) -> Result<Self, BidServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let response = client.get(format!("{}/health", base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BidServiceError::Unhealthy(status.as_u16()));
        }

        info!("已连接 mev-commit bidder: {}", base_url);
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BidService for MevCommitBidder {
    async fn send_bid(
        &self,
        payload: BidPayload,
        amount_wei: U256,
        block_number: u64,
        decay_start_ms: i64,
        decay_end_ms: i64,
    ) -> Result<BidAck, BidServiceError> {
        let request = BidRequest::new(payload, amount_wei, block_number, decay_start_ms, decay_end_ms);

        let response = self
            .client
            .post(format!("{}/v1/bidder/bid", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BidServiceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let ack = parse_bid_stream(&body)?;
        debug!("bidder 返回 {} 条承诺", ack.commitments.len());
        Ok(ack)
    }
}

/// 加载签名账户
pub fn authenticate(private_key: &str) -> Result<LocalWallet> {
    let wallet: LocalWallet = private_key
        .trim_start_matches("0x")
        .parse()
        .context("invalid private key")?;
    info!("已加载账户: {:?}", wallet.address());
    Ok(wallet)
}
