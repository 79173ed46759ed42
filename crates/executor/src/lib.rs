//! 交易执行模块
//!
//! ## 模块结构
//!
//! - `tx_builder`: 构建并签名候选交易 (自转账 / blob)
//! - `flashbots`: Bundle 中继，交易不经过公开 mempool
//! - `types`: 错误类型定义

mod tx_builder;
mod types;
pub mod flashbots;

pub use tx_builder::{ChainTxBuilder, TransactionBuilder};
pub use types::{RelayError, TxBuildError};
pub use flashbots::{Bundle, BundleRelay, FlashbotsRelay};
