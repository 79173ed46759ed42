use ethers::types::U256;
use models::{Bid, BidReference, DECAY_WINDOW_MS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use utils::now_ms;

/// 出价生成器
///
/// 随机数源每次运行只播种一次
pub struct BidComposer {
    rng: StdRng,
    min_wei: u128,
    max_wei: u128,
    decay_width_ms: i64,
}

impl BidComposer {
    /// `min_wei <= max_wei` 由配置加载时保证
    pub fn new(seed: u64, min_wei: U256, max_wei: U256) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min_wei: clamp_u128(min_wei),
            max_wei: clamp_u128(max_wei),
            decay_width_ms: DECAY_WINDOW_MS,
        }
    }

    pub fn compose(&mut self, target_block: u64, reference: BidReference) -> Bid {
        self.compose_at(target_block, reference, now_ms())
    }

    pub fn compose_at(&mut self, target_block: u64, reference: BidReference, now_ms: i64) -> Bid {
        let amount = if self.min_wei >= self.max_wei {
            self.min_wei
        } else {
            self.rng.gen_range(self.min_wei..=self.max_wei)
        };

        Bid {
            amount_wei: U256::from(amount),
            decay_start_ms: now_ms,
            decay_end_ms: now_ms + self.decay_width_ms,
            target_block,
            reference,
        }
    }
}

fn clamp_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer(seed: u64) -> BidComposer {
        // 0.0002 ~ 0.001 ETH
        BidComposer::new(
            seed,
            U256::from(200_000_000_000_000u64),
            U256::from(1_000_000_000_000_000u64),
        )
    }

    #[test]
    fn test_amount_within_range() {
        let mut composer = composer(42);
        for block in 0..500u64 {
            let bid = composer.compose(block, BidReference::Hash("aa".to_string()));
            assert!(bid.amount_wei >= U256::from(200_000_000_000_000u64));
            assert!(bid.amount_wei <= U256::from(1_000_000_000_000_000u64));
        }
    }

    #[test]
    fn test_decay_window() {
        let mut composer = composer(7);
        let before = now_ms();
        let bid = composer.compose(101, BidReference::Hash("aa".to_string()));

        assert_eq!(bid.decay_width_ms(), 36_000);
        assert!(bid.decay_start_ms >= before);
        assert_eq!(bid.target_block, 101);
    }

    #[test]
    fn test_same_seed_same_amounts() {
        let mut a = composer(1);
        let mut b = composer(1);
        for _ in 0..10 {
            let x = a.compose_at(1, BidReference::Hash(String::new()), 0);
            let y = b.compose_at(1, BidReference::Hash(String::new()), 0);
            assert_eq!(x.amount_wei, y.amount_wei);
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut composer = BidComposer::new(3, U256::from(5u64), U256::from(5u64));
        let bid = composer.compose_at(1, BidReference::Hash(String::new()), 1_000);
        assert_eq!(bid.amount_wei, U256::from(5u64));
        assert_eq!(bid.decay_end_ms, 37_000);
    }
}
