use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

/// 交易模式 (两者互斥)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    /// 给自己转账 ETH
    SelfTransfer,
    /// EIP-4844 blob 交易
    Blob,
}

impl TxMode {
    pub fn name(&self) -> &'static str {
        match self {
            TxMode::SelfTransfer => "self-transfer",
            TxMode::Blob => "blob",
        }
    }
}

/// 已签名的候选交易
///
/// 只属于一轮循环，不跨轮共享
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    /// 交易哈希
    pub hash: H256,
    /// 签名后的 RLP 编码 (EIP-2718 envelope)
    pub raw: Bytes,
    /// 目标区块号 = head.number + offset
    pub target_block: u64,
}

impl CandidateTransaction {
    pub fn new(hash: H256, raw: Bytes, target_block: u64) -> Self {
        Self {
            hash,
            raw,
            target_block,
        }
    }

    /// 带 0x 前缀的完整哈希字符串
    pub fn hash_hex(&self) -> String {
        format!("{:?}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_is_full_length() {
        let tx = CandidateTransaction::new(H256::repeat_byte(0x11), Bytes::from(vec![0x02]), 101);
        let hex = tx.hash_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
    }
}
