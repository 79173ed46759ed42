//! 时间工具模块

use chrono::Utc;

/// 当前 Unix 时间戳 (毫秒)
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// 日志中隐藏端点，只保留前 5 个字符
pub fn mask_endpoint(endpoint: &str) -> String {
    match endpoint.char_indices().nth(5) {
        Some((idx, _)) => format!("{}*****", &endpoint[..idx]),
        None => "*****".to_string(),
    }
}
