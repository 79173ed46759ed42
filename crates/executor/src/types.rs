//! 执行器类型定义

use thiserror::Error;

/// 交易构建错误
#[derive(Debug, Error)]
pub enum TxBuildError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Fee estimation failed: {0}")]
    FeeEstimationFailed(String),

    #[error("Nonce error: {0}")]
    NonceError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("Blob sidecar error: {0}")]
    SidecarError(String),

    #[error("Blob transaction needs at least one blob")]
    NoBlobs,
}

/// Bundle 中继错误
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Flashbots request failed: {status} - {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Flashbots RPC error: {code} - {message}")]
    Rpc { code: i64, message: String },

    #[error("Flashbots response has no result")]
    EmptyResult,

    #[error("Flashbots transport error: {0}")]
    Transport(String),

    #[error("Flashbots signing error: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}
