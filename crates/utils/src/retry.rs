//! 重试策略
//!
//! RPC 拨号、WebSocket 连接与重连三处共用同一套重试逻辑，
//! 只在延迟策略和最大尝试次数上不同

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// 两次尝试之间的延迟策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// 固定间隔
    Fixed(Duration),
    /// 指数退避: base * 2^attempt (attempt 从 0 开始)
    Exponential(Duration),
}

impl Delay {
    /// 第 `attempt` 次失败 (从 0 开始) 之后的等待时长
    pub fn for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Delay::Fixed(delay) => *delay,
            Delay::Exponential(base) => base.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

/// 重试次数耗尽
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    pub attempts: u32,
    /// 最后一次失败的错误
    pub last: E,
}

/// 重试策略: (延迟策略, 最大尝试次数 | 无上限)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Delay,
    /// None 表示无限重试
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// 固定间隔，最多 `max_attempts` 次 (至少 1 次)
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay: Delay::Fixed(delay),
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// 指数退避，最多 `max_attempts` 次 (至少 1 次)
    pub fn exponential(base: Duration, max_attempts: u32) -> Self {
        Self {
            delay: Delay::Exponential(base),
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// 固定间隔，无限重试
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay: Delay::Fixed(delay),
            max_attempts: None,
        }
    }

    /// 执行 `op` 直到成功或次数耗尽
    ///
    /// `op` 收到当前尝试序号 (从 0 开始)。最后一次失败后不再等待。
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let failed = attempt + 1;
            if let Some(max) = self.max_attempts {
                if failed >= max {
                    return Err(RetryError {
                        attempts: failed,
                        last: err,
                    });
                }
            }

            let delay = self.delay.for_attempt(attempt);
            warn!(
                "{} 失败 (第 {} 次尝试): {}, {:?} 后重试",
                label, failed, err, delay
            );
            tokio::time::sleep(delay).await;
            attempt = failed;
        }
    }
}
