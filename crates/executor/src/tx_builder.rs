//! 候选交易构建
//!
//! - 自转账: ethers 构建 EIP-1559 交易并签名
//! - blob 交易: alloy 构建 EIP-4844 交易 (带 sidecar) 并签名

use alloy::consensus::{SidecarBuilder, SimpleCoder};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder as _, TransactionBuilder4844 as _};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::keccak256;
use models::CandidateTransaction;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::TxBuildError;

/// 普通转账的 gas 上限
const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// 每个 blob 的可用数据字节数 (4096 个字段元素 × 31 字节)
const BLOB_DATA_BYTES: usize = 4096 * 31;

/// blob 费用相对当前 blob base fee 的倍数
const BLOB_FEE_MULTIPLIER: u64 = 2;

/// 交易构建器
///
/// 每个区块头调用一次，目标区块号由调用方计算后传入
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    type Conn: Send + Sync;

    async fn build_self_transfer(
        &self,
        conn: &Self::Conn,
        account: &LocalWallet,
        amount: U256,
        target_block: u64,
    ) -> Result<CandidateTransaction, TxBuildError>;

    async fn build_blob_transaction(
        &self,
        conn: &Self::Conn,
        account: &LocalWallet,
        blob_count: usize,
        target_block: u64,
    ) -> Result<CandidateTransaction, TxBuildError>;
}

/// 基于 WebSocket 连接的交易构建器
#[derive(Debug, Clone, Default)]
pub struct ChainTxBuilder;

impl ChainTxBuilder {
    pub fn new() -> Self {
        Self
    }
}

/// 构建交易所需的链上参数
struct TxContext {
    chain_id: u64,
    nonce: U256,
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
}

async fn fetch_context<M: Middleware>(conn: &M, from: Address) -> Result<TxContext, TxBuildError> {
    let chain_id = conn
        .get_chainid()
        .await
        .map_err(|e| TxBuildError::ProviderError(e.to_string()))?
        .as_u64();

    let nonce = conn
        .get_transaction_count(from, Some(BlockNumber::Pending.into()))
        .await
        .map_err(|e| TxBuildError::NonceError(e.to_string()))?;

    let (max_fee_per_gas, max_priority_fee_per_gas) = conn
        .estimate_eip1559_fees(None)
        .await
        .map_err(|e| TxBuildError::FeeEstimationFailed(e.to_string()))?;

    Ok(TxContext {
        chain_id,
        nonce,
        max_fee_per_gas,
        max_priority_fee_per_gas,
    })
}

/// U256 转 u128，超出范围取最大值
fn to_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

/// 生成刚好填满 `blob_count` 个 blob 的随机数据
///
/// SimpleCoder 会额外占用长度前缀，这里预留几个字段元素
fn random_blob_data(blob_count: usize) -> Vec<u8> {
    let len = blob_count * BLOB_DATA_BYTES - 31 * 4;
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

#[async_trait]
impl TransactionBuilder for ChainTxBuilder {
    type Conn = Arc<Provider<Ws>>;

    async fn build_self_transfer(
        &self,
        conn: &Self::Conn,
        account: &LocalWallet,
        amount: U256,
        target_block: u64,
    ) -> Result<CandidateTransaction, TxBuildError> {
        let from = account.address();
        let ctx = fetch_context(conn.as_ref(), from).await?;
        let wallet = account.clone().with_chain_id(ctx.chain_id);

        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(from)
            .to(from)
            .value(amount)
            .nonce(ctx.nonce)
            .gas(TRANSFER_GAS_LIMIT)
            .max_fee_per_gas(ctx.max_fee_per_gas)
            .max_priority_fee_per_gas(ctx.max_priority_fee_per_gas)
            .chain_id(ctx.chain_id)
            .into();

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| TxBuildError::WalletError(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));

        info!(
            "自转账交易已签名: hash={:?}, nonce={}, 目标区块 {}",
            hash, ctx.nonce, target_block
        );

        Ok(CandidateTransaction::new(hash, raw, target_block))
    }

    async fn build_blob_transaction(
        &self,
        conn: &Self::Conn,
        account: &LocalWallet,
        blob_count: usize,
        target_block: u64,
    ) -> Result<CandidateTransaction, TxBuildError> {
        if blob_count == 0 {
            return Err(TxBuildError::NoBlobs);
        }

        let from = account.address();
        let ctx = fetch_context(conn.as_ref(), from).await?;

        let blob_base_fee: U256 = conn
            .request("eth_blobBaseFee", ())
            .await
            .map_err(|e| TxBuildError::FeeEstimationFailed(e.to_string()))?;
        let max_fee_per_blob_gas = blob_base_fee.saturating_mul(U256::from(BLOB_FEE_MULTIPLIER));

        let sidecar = SidecarBuilder::<SimpleCoder>::from_slice(&random_blob_data(blob_count))
            .build()
            .map_err(|e| TxBuildError::SidecarError(e.to_string()))?;
        debug!("blob sidecar: {} 个 blob", sidecar.blobs.len());

        let signer = PrivateKeySigner::from_slice(&account.signer().to_bytes())
            .map_err(|e| TxBuildError::WalletError(e.to_string()))?;
        let wallet = EthereumWallet::from(signer);
        let address = alloy::primitives::Address::new(from.0);

        let request = TransactionRequest::default()
            .with_from(address)
            .with_to(address)
            .with_nonce(ctx.nonce.as_u64())
            .with_chain_id(ctx.chain_id)
            .with_gas_limit(TRANSFER_GAS_LIMIT.into())
            .with_max_fee_per_gas(to_u128(ctx.max_fee_per_gas))
            .with_max_priority_fee_per_gas(to_u128(ctx.max_priority_fee_per_gas))
            .with_max_fee_per_blob_gas(to_u128(max_fee_per_blob_gas))
            .with_blob_sidecar(sidecar);

        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| TxBuildError::WalletError(e.to_string()))?;

        let hash = H256::from_slice(envelope.tx_hash().as_slice());
        let raw = Bytes::from(envelope.encoded_2718());

        info!(
            "blob 交易已签名: hash={:?}, blobs={}, nonce={}, 目标区块 {}",
            hash, blob_count, ctx.nonce, target_block
        );

        Ok(CandidateTransaction::new(hash, raw, target_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_data_fills_requested_blobs() {
        for blob_count in [1usize, 2, 6] {
            let data = random_blob_data(blob_count);
            let sidecar = SidecarBuilder::<SimpleCoder>::from_slice(&data)
                .build()
                .unwrap();
            assert_eq!(sidecar.blobs.len(), blob_count);
        }
    }

    #[test]
    fn test_to_u128_saturates() {
        assert_eq!(to_u128(U256::from(42u64)), 42);
        assert_eq!(to_u128(U256::MAX), u128::MAX);
    }
}
