//! 单交易 Bundle

use models::CandidateTransaction;
use serde::Serialize;

/// `eth_sendBundle` 参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// 签名后的交易 (0x 十六进制)
    pub txs: Vec<String>,
    /// 目标区块号 (0x 十六进制)
    pub block_number: String,
}

impl Bundle {
    /// 只包含一笔候选交易，目标区块取交易自身的目标区块
    pub fn single(tx: &CandidateTransaction) -> Self {
        Self {
            txs: vec![format!("0x{}", hex::encode(&tx.raw))],
            block_number: format!("0x{:x}", tx.target_block),
        }
    }
}
