use models::Session;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

/// 运行时长计时器
///
/// 截止时间在创建时确定，之后只读
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    deadline: Instant,
}

impl SessionClock {
    pub fn new(run_duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + run_duration,
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self {
            deadline: Instant::from_std(session.deadline),
        }
    }

    /// 在截止时间完成的 future，用于 `select!`
    pub fn fired(&self) -> Sleep {
        sleep_until(self.deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_deadline() {
        let clock = SessionClock::new(Duration::from_secs(3600));
        let start = Instant::now();

        assert!(timeout(Duration::from_secs(3599), clock.fired()).await.is_err());
        clock.fired().await;

        assert_eq!(start.elapsed(), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_fires_immediately() {
        let clock = SessionClock::new(Duration::ZERO);
        let start = Instant::now();
        clock.fired().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
