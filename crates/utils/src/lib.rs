mod logger;
pub mod retry;
pub mod time_utils;

pub use logger::{LoggerManager, BID_LOG_TARGET};
pub use retry::{Delay, RetryError, RetryPolicy};
pub use time_utils::{now_ms, mask_endpoint};
