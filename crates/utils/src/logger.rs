use std::fs;
use time::macros::offset;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::{EnvFilter, FilterFn, LevelFilter};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// 出价日志 target，单独写入 bid.log
pub const BID_LOG_TARGET: &str = "preconf_bid";

/// 日志管理器 - 基于target分类的日志系统
pub struct LoggerManager {
    _guards: Vec<non_blocking::WorkerGuard>,
}

impl LoggerManager {
    /// 初始化日志系统
    ///
    /// 日志分类：
    /// - 控制台: 按 `level` 过滤
    /// - app.log: 通用应用日志
    /// - bid.log: 预确认出价日志 (每次出价及其结果)
    pub fn init(level: &str, dir: &str) -> Self {
        let mut guards = Vec::new();

        // 创建日志目录
        fs::create_dir_all(dir).ok();

        let timer = OffsetTime::new(offset!(UTC), time::format_description::well_known::Rfc3339);

        let console_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

        // 1. 控制台输出
        let console_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(console_filter);

        // 2. 通用应用日志 (app.log)
        let (app_writer, app_guard) = {
            let appender = rolling::daily(dir, "app.log");
            non_blocking(appender)
        };
        guards.push(app_guard);

        let app_layer = fmt::layer()
            .compact()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(LevelFilter::INFO);

        // 3. 出价日志 (bid.log)
        let (bid_writer, bid_guard) = {
            let appender = rolling::daily(dir, "bid.log");
            non_blocking(appender)
        };
        guards.push(bid_guard);

        let bid_layer = fmt::layer()
            .compact()
            .with_writer(bid_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer)
            .with_filter(FilterFn::new(|metadata| metadata.target() == BID_LOG_TARGET));

        // 初始化tracing订阅器
        tracing_subscriber::registry()
            .with(console_layer)
            .with(app_layer)
            .with(bid_layer)
            .init();

        Self { _guards: guards }
    }
}
