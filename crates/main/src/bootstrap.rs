//! 应用启动引导模块
//!
//! 按顺序完成启动期检查，任何一步失败都直接退出:
//! 加载账户 → 连接出价服务 → (中继模式) 连接 RPC → 订阅区块头 → 进入主循环

use anyhow::{anyhow, Context, Result};
use config_crate::AppConfig;
use ethers::prelude::*;
use ethers::utils::format_ether;
use executor::{ChainTxBuilder, FlashbotsRelay};
use models::Session;
use services::{
    authenticate, HeadStreamConfig, HeadStreamManager, MevCommitBidder, RpcDialer, SessionClock,
    WsHeadSource,
};
use std::sync::Arc;
use strategies::{BidComposer, BidDispatcher, PreconfRunner, SubmissionPath, TxOrchestrator};
use tracing::{error, info, warn};
use ::utils::mask_endpoint;

/// 应用程序实例
pub struct Application {
    runner: PreconfRunner<WsHeadSource, ChainTxBuilder, MevCommitBidder>,
}

impl Application {
    /// 初始化并启动应用
    pub async fn start(config: AppConfig) -> Result<Self> {
        Self::log_config(&config);

        // 加载账户
        let account = authenticate(&config.wallet.private_key)?;

        // 连接出价服务
        let bidder = MevCommitBidder::connect(config.bidder.base_url())
            .await
            .context("failed to connect to mev-commit bidder API")?;

        // 中继模式才需要 RPC 连接，连不上只降级
        let rpc_provider = if config.preconf.use_payload {
            None
        } else {
            let rpc_endpoint = config
                .chain
                .rpc_endpoint
                .as_deref()
                .ok_or_else(|| anyhow!("RPC_ENDPOINT is required when USE_PAYLOAD=false"))?;
            let dialer = RpcDialer::new(config.dial.max_attempts, config.dial.attempt_timeout);
            match dialer.dial_http(rpc_endpoint).await {
                Ok(provider) => Some(provider),
                Err(e) => {
                    error!("RPC 客户端不可用，继续运行: {}", e);
                    None
                }
            }
        };

        // 订阅区块头
        let source = WsHeadSource::new(config.chain.ws_endpoint.clone());
        let stream = HeadStreamManager::connect(source, HeadStreamConfig::default()).await?;

        if let Some(provider) = &rpc_provider {
            Self::check_chain_id(provider, stream.connection()).await;
        }

        let path = match &config.chain.rpc_endpoint {
            Some(endpoint) if !config.preconf.use_payload => {
                let relay = FlashbotsRelay::new(endpoint.clone(), account.clone())?;
                SubmissionPath::Relay(Box::new(relay))
            }
            _ => SubmissionPath::Payload,
        };

        let session = Session::new(
            config.preconf.mode,
            config.preconf.offset,
            config.preconf.run_duration,
        );
        if session.mode.is_none() {
            warn!("ETH_TRANSFER 和 BLOB 均未启用，只会记录区块，不会出价");
        }
        let clock = SessionClock::from_session(&session);

        let runner = PreconfRunner::new(
            stream,
            TxOrchestrator::new(
                ChainTxBuilder::new(),
                account,
                config.preconf.transfer_amount_wei,
                config.preconf.num_blobs,
            ),
            path,
            BidComposer::new(session.seed, config.preconf.bid_min_wei, config.preconf.bid_max_wei),
            BidDispatcher::new(bidder),
            session,
            clock,
        );

        info!("应用启动完成");
        Ok(Self { runner })
    }

    /// 运行主循环，直到时长到期、收到退出信号或重连耗尽
    pub async fn run(self) -> Result<()> {
        tokio::select! {
            result = self.runner.run() => {
                result.context("head stream failed permanently")?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("收到退出信号，停止运行");
            }
        }
        Ok(())
    }

    /// RPC 与 WebSocket 连接的链 ID 应一致
    async fn check_chain_id(rpc: &Arc<Provider<Http>>, ws: &Arc<Provider<Ws>>) {
        let (rpc_chain, ws_chain) = match (rpc.get_chainid().await, ws.get_chainid().await) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                warn!("无法读取链 ID: {}", e);
                return;
            }
        };

        if rpc_chain != ws_chain {
            warn!("RPC 与 WebSocket 链 ID 不一致: rpc={}, ws={}", rpc_chain, ws_chain);
        } else {
            info!("链 ID: {}", rpc_chain);
        }
    }

    fn log_config(config: &AppConfig) {
        info!("bidder 地址: {}", config.bidder.address);
        info!("WebSocket: {}", mask_endpoint(&config.chain.ws_endpoint));
        if let Some(rpc) = &config.chain.rpc_endpoint {
            info!("RPC: {}", mask_endpoint(rpc));
        }
        info!(
            "use_payload={}, offset={}, 模式={}, blobs={}",
            config.preconf.use_payload,
            config.preconf.offset,
            config.preconf.mode.map(|m| m.name()).unwrap_or("none"),
            config.preconf.num_blobs
        );
        info!(
            "出价范围: {} ~ {} ETH, 运行时长: {} 小时",
            format_ether(config.preconf.bid_min_wei),
            format_ether(config.preconf.bid_max_wei),
            config.preconf.run_duration.as_secs() / 3600
        );
    }
}

/// panic 写入日志文件，否则只会出现在 stderr
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let message = panic_message(panic_info.payload());
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let thread = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();

        error!(%location, %thread, "出价进程 panic: {}", message);
    }));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".to_string())
}
