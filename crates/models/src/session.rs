use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::TxMode;

/// 默认运行时长: 14 天
pub const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(14 * 24 * 3600);
/// 运行时长上限: 10 年
pub const MAX_RUN_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// 一次运行的会话参数
///
/// 启动时由已校验的配置构建一次，整个运行期间不可变，
/// 以引用方式传给各个组件
#[derive(Debug, Clone)]
pub struct Session {
    /// 交易模式，None 表示未启用任何模式 (每个区块只记录警告)
    pub mode: Option<TxMode>,
    /// 目标区块偏移
    pub offset: u64,
    /// 运行截止时间
    pub deadline: Instant,
    /// 出价随机数种子 (每次运行一个)
    pub seed: u64,
}

impl Session {
    /// 运行时长超过 `MAX_RUN_DURATION` 时按上限截断
    pub fn new(mode: Option<TxMode>, offset: u64, run_duration: Duration) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        Self {
            mode,
            offset,
            deadline: Instant::now() + run_duration.min(MAX_RUN_DURATION),
            seed,
        }
    }

    /// 目标区块号
    pub fn target_block(&self, head_number: u64) -> u64 {
        head_number.saturating_add(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_block_adds_offset() {
        for offset in [0u64, 1, 2, 5, 64] {
            let session = Session::new(Some(TxMode::SelfTransfer), offset, DEFAULT_RUN_DURATION);
            for number in [0u64, 1, 100, 19_000_000] {
                assert_eq!(session.target_block(number), number + offset);
            }
        }
    }

    #[test]
    fn test_deadline_in_future() {
        let before = Instant::now();
        let session = Session::new(None, 1, Duration::from_secs(60));
        let ahead = session.deadline.duration_since(before);
        assert!(ahead >= Duration::from_secs(60));
        assert!(ahead < Duration::from_secs(70));
    }

    #[test]
    fn test_huge_duration_is_capped() {
        let before = Instant::now();
        let session = Session::new(None, 1, Duration::MAX);
        let ahead = session.deadline.duration_since(before);
        assert!(ahead >= MAX_RUN_DURATION);
        assert!(ahead < MAX_RUN_DURATION + Duration::from_secs(10));
    }
}
