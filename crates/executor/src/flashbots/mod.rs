//! Flashbots 模块
//!
//! 交易不进入公开 mempool，直接由中继转给区块构建者
//!
//! ```text
//! 中继模式: 候选交易 → Flashbots 中继 (eth_sendBundle) → 构建者
//!           → 以交易哈希出价
//! ```

mod client;
mod bundle;
mod types;

pub use client::{BundleRelay, FlashbotsRelay};
pub use bundle::Bundle;
pub use types::SendBundleResult;
