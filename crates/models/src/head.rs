use ethers::types::{Block, H256};
use serde::{Deserialize, Serialize};

/// 新区块头事件
///
/// 每轮循环消费一次，之后即丢弃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub number: u64,
    pub timestamp: u64,
    pub hash: H256,
}

impl ChainHead {
    pub fn new(number: u64, timestamp: u64, hash: H256) -> Self {
        Self {
            number,
            timestamp,
            hash,
        }
    }
}

impl<TX> From<&Block<TX>> for ChainHead {
    fn from(block: &Block<TX>) -> Self {
        Self {
            number: block.number.unwrap_or_default().as_u64(),
            timestamp: block.timestamp.as_u64(),
            hash: block.hash.unwrap_or_default(),
        }
    }
}
