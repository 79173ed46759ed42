use ethers::signers::LocalWallet;
use ethers::types::U256;
use executor::{TransactionBuilder, TxBuildError};
use models::{CandidateTransaction, ChainHead, Session, TxMode};
use tracing::debug;

/// 交易编排器
///
/// 每个区块头按会话模式构建一笔候选交易，失败不重试
pub struct TxOrchestrator<B: TransactionBuilder> {
    builder: B,
    account: LocalWallet,
    transfer_amount: U256,
    num_blobs: usize,
}

impl<B: TransactionBuilder> TxOrchestrator<B> {
    pub fn new(builder: B, account: LocalWallet, transfer_amount: U256, num_blobs: usize) -> Self {
        Self {
            builder,
            account,
            transfer_amount,
            num_blobs,
        }
    }

    /// 处理一个区块头
    ///
    /// 返回 `Ok(None)` 表示会话未启用任何交易模式
    pub async fn on_head(
        &self,
        conn: &B::Conn,
        head: &ChainHead,
        session: &Session,
    ) -> Result<Option<CandidateTransaction>, TxBuildError> {
        let Some(mode) = session.mode else {
            return Ok(None);
        };

        let target_block = session.target_block(head.number);
        debug!("区块 {} → 目标区块 {} ({})", head.number, target_block, mode.name());

        let tx = match mode {
            TxMode::SelfTransfer => {
                self.builder
                    .build_self_transfer(conn, &self.account, self.transfer_amount, target_block)
                    .await?
            }
            TxMode::Blob => {
                self.builder
                    .build_blob_transaction(conn, &self.account, self.num_blobs, target_block)
                    .await?
            }
        };

        Ok(Some(tx))
    }
}
