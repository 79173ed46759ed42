use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::CandidateTransaction;

/// 出价衰减窗口宽度 (毫秒)，约 2 个区块
pub const DECAY_WINDOW_MS: i64 = 36_000;

/// 出价引用的交易
///
/// - `Hash`: 交易已作为 bundle 发往区块构建者，只提交哈希
/// - `Payload`: 未经中继，出价网络需要看到完整交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidReference {
    Hash(String),
    Payload(CandidateTransaction),
}

/// 预确认出价
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// 出价金额 (wei)
    pub amount_wei: U256,
    /// 衰减开始时间 (毫秒时间戳)
    pub decay_start_ms: i64,
    /// 衰减结束时间 (毫秒时间戳)
    pub decay_end_ms: i64,
    /// 目标区块号
    pub target_block: u64,
    pub reference: BidReference,
}

impl Bid {
    pub fn decay_width_ms(&self) -> i64 {
        self.decay_end_ms - self.decay_start_ms
    }
}
