mod bootstrap;

use anyhow::Result;
use config_crate::AppConfig;
use tracing::info;
use utils::LoggerManager;

use crate::bootstrap::{setup_panic_hook, Application};

#[tokio::main]
async fn main() -> Result<()> {
    // 日志级别和目录来自配置，配置错误直接退出
    let config = AppConfig::load()?;

    // 初始化日志系统
    let _logger = LoggerManager::init(&config.log.level, &config.log.dir);

    // 设置 panic hook
    setup_panic_hook();

    info!("========================================");
    info!("  预确认出价系统启动");
    info!("========================================");

    // 启动应用
    let app = Application::start(config).await?;

    // 运行主循环（阻塞直到时长到期或收到退出信号）
    app.run().await?;

    info!("预确认出价系统已退出");
    Ok(())
}
