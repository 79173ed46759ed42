use anyhow::anyhow;
use ethers::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use ::utils::{mask_endpoint, RetryPolicy};

/// 指数退避的基础间隔
pub const DIAL_BACKOFF_BASE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DialError {
    #[error("failed to connect to {endpoint} after {attempts} attempts: {last}")]
    ConnectFailed {
        endpoint: String,
        attempts: u32,
        last: String,
    },
}

/// RPC 拨号器
///
/// 每次尝试有独立超时，失败后按 `base * 2^attempt` 退避
#[derive(Debug, Clone)]
pub struct RpcDialer {
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl RpcDialer {
    pub fn new(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            policy: RetryPolicy::exponential(DIAL_BACKOFF_BASE, max_attempts),
            attempt_timeout,
        }
    }

    /// 连接 HTTP RPC 端点
    ///
    /// `Provider<Http>` 创建时不联网，这里用 `eth_chainId` 确认端点可用
    pub async fn dial_http(&self, endpoint: &str) -> Result<Arc<Provider<Http>>, DialError> {
        self.dial_with(endpoint, || async {
            let provider = Provider::<Http>::try_from(endpoint)?;
            provider.get_chainid().await?;
            Ok(Arc::new(provider))
        })
        .await
    }

    /// 用任意连接函数拨号
    pub async fn dial_with<T, F, Fut>(&self, endpoint: &str, mut connect: F) -> Result<T, DialError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let timeout = self.attempt_timeout;
        let result = self
            .policy
            .run("连接 RPC 客户端", |_| {
                let attempt = connect();
                async move {
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow!("timed out after {:?}", timeout)),
                    }
                }
            })
            .await;

        match result {
            Ok(conn) => {
                info!("(rpc) 客户端已连接: {}", mask_endpoint(endpoint));
                Ok(conn)
            }
            Err(e) => {
                error!("(rpc) {} 次尝试后仍无法连接: {}", e.attempts, e.last);
                Err(DialError::ConnectFailed {
                    endpoint: mask_endpoint(endpoint),
                    attempts: e.attempts,
                    last: e.last.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_dial_gives_up_after_max_attempts() {
        let dialer = RpcDialer::new(5, Duration::from_secs(30));
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let result: Result<(), _> = dialer
            .dial_with("http://localhost:8545", || {
                calls.set(calls.get() + 1);
                async { Err(anyhow!("connection refused")) }
            })
            .await;

        assert!(matches!(result, Err(DialError::ConnectFailed { attempts: 5, .. })));
        assert_eq!(calls.get(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(10 + 20 + 40 + 80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dial_attempt_timeout_counts_as_failure() {
        let dialer = RpcDialer::new(2, Duration::from_secs(30));
        let calls = Cell::new(0u32);

        let result = dialer
            .dial_with("http://localhost:8545", || {
                calls.set(calls.get() + 1);
                let first = calls.get() == 1;
                async move {
                    if first {
                        // 第一次挂起，触发超时
                        std::future::pending::<()>().await;
                    }
                    Ok(7u64)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_masks_endpoint() {
        let dialer = RpcDialer::new(1, Duration::from_secs(1));
        let err = dialer
            .dial_with("https://secret-rpc.example.org/key", || async {
                Err::<(), _>(anyhow!("dns error"))
            })
            .await
            .unwrap_err();

        let DialError::ConnectFailed { endpoint, .. } = err;
        assert_eq!(endpoint, "https*****");
    }
}
