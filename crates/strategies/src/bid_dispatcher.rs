use ethers::utils::format_ether;
use models::{Bid, BidReference};
use services::{BidAck, BidPayload, BidService, BidServiceError};
use thiserror::Error;
use tracing::{info, warn};
use utils::BID_LOG_TARGET;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported bid reference: {0}")]
    UnsupportedReferenceType(String),

    #[error(transparent)]
    Service(#[from] BidServiceError),
}

/// 出价提交器
///
/// - 哈希引用: 去掉 `0x` 后按哈希提交
/// - 交易引用: 提交完整的签名交易
pub struct BidDispatcher<S: BidService> {
    service: S,
}

impl<S: BidService> BidDispatcher<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn dispatch(&self, bid: &Bid) -> Result<BidAck, DispatchError> {
        let payload = to_payload(&bid.reference)?;

        match &payload {
            BidPayload::TxHashes(hashes) => {
                info!(target: BID_LOG_TARGET, "发送出价 (交易哈希): tx=0x{}", hashes.join(","))
            }
            BidPayload::RawTransactions(_) => {
                if let BidReference::Payload(tx) = &bid.reference {
                    info!(target: BID_LOG_TARGET, "发送出价 (交易内容): tx={}", tx.hash_hex());
                }
            }
        }

        match self
            .service
            .send_bid(
                payload,
                bid.amount_wei,
                bid.target_block,
                bid.decay_start_ms,
                bid.decay_end_ms,
            )
            .await
        {
            Ok(ack) => {
                info!(
                    target: BID_LOG_TARGET,
                    "出价已发送: block={}, amount={} ETH, commitments={}",
                    bid.target_block,
                    format_ether(bid.amount_wei),
                    ack.commitments.len()
                );
                Ok(ack)
            }
            Err(e) => {
                warn!(target: BID_LOG_TARGET, "出价发送失败: block={}, err={}", bid.target_block, e);
                Err(e.into())
            }
        }
    }
}

/// 把出价引用转换为请求内容，不合法的引用不会产生网络调用
fn to_payload(reference: &BidReference) -> Result<BidPayload, DispatchError> {
    match reference {
        BidReference::Hash(hash) => {
            let stripped = hash.strip_prefix("0x").unwrap_or(hash);
            if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DispatchError::UnsupportedReferenceType(format!(
                    "malformed transaction hash {:?}",
                    hash
                )));
            }
            Ok(BidPayload::TxHashes(vec![stripped.to_string()]))
        }
        BidReference::Payload(tx) => {
            if tx.raw.is_empty() {
                return Err(DispatchError::UnsupportedReferenceType(
                    "empty transaction payload".to_string(),
                ));
            }
            Ok(BidPayload::RawTransactions(vec![hex::encode(&tx.raw)]))
        }
    }
}
