//! 预确认出价主循环
//!
//! 单一循环同时等待三个事件源: 运行时长到期、订阅错误、新区块头。
//! 每次唤醒只处理一个事件，同一时刻最多一个区块在处理中。

use executor::{BundleRelay, TransactionBuilder};
use models::{BidReference, ChainHead, Session};
use services::{BidService, HeadEvent, HeadSource, HeadStreamError, HeadStreamManager, SessionClock};
use tracing::{error, info, warn};

use crate::bid_composer::BidComposer;
use crate::bid_dispatcher::BidDispatcher;
use crate::orchestrator::TxOrchestrator;

/// 候选交易的出价路径
pub enum SubmissionPath {
    /// 出价中直接携带签名交易
    Payload,
    /// 先经中继发送 bundle，再以交易哈希出价
    Relay(Box<dyn BundleRelay>),
}

impl SubmissionPath {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionPath::Payload => "payload",
            SubmissionPath::Relay(_) => "relay",
        }
    }
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 收到的区块头
    pub heads_seen: u64,
    /// 被跳过的重复区块头
    pub duplicate_heads: u64,
    pub txs_built: u64,
    pub build_failures: u64,
    pub relay_failures: u64,
    pub bids_sent: u64,
    pub bid_failures: u64,
    pub reconnects: u64,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "运行统计: 区块头={}, 重复={}, 交易构建 成功={} 失败={}, 中继失败={}, 出价 成功={} 失败={}, 重连={}",
            self.heads_seen,
            self.duplicate_heads,
            self.txs_built,
            self.build_failures,
            self.relay_failures,
            self.bids_sent,
            self.bid_failures,
            self.reconnects
        );
    }
}

/// 预确认出价运行器
pub struct PreconfRunner<S, B, D>
where
    S: HeadSource,
    B: TransactionBuilder<Conn = S::Conn>,
    D: BidService,
{
    stream: HeadStreamManager<S>,
    orchestrator: TxOrchestrator<B>,
    path: SubmissionPath,
    composer: BidComposer,
    dispatcher: BidDispatcher<D>,
    session: Session,
    clock: SessionClock,
    /// 已处理的最高区块号
    last_head: Option<u64>,
    summary: RunSummary,
}

impl<S, B, D> PreconfRunner<S, B, D>
where
    S: HeadSource,
    B: TransactionBuilder<Conn = S::Conn>,
    D: BidService,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: HeadStreamManager<S>,
        orchestrator: TxOrchestrator<B>,
        path: SubmissionPath,
        composer: BidComposer,
        dispatcher: BidDispatcher<D>,
        session: Session,
        clock: SessionClock,
    ) -> Self {
        Self {
            stream,
            orchestrator,
            path,
            composer,
            dispatcher,
            session,
            clock,
            last_head: None,
            summary: RunSummary::default(),
        }
    }

    /// 运行直到时长到期
    ///
    /// 只有重连耗尽会返回错误
    pub async fn run(mut self) -> Result<RunSummary, HeadStreamError> {
        info!(
            "开始预确认出价: 模式={}, 路径={}, offset={}",
            self.session.mode.map(|m| m.name()).unwrap_or("none"),
            self.path.name(),
            self.session.offset
        );

        let deadline = self.clock.fired();
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    info!("运行时长已到，停止主循环");
                    break;
                }
                event = self.stream.next_event() => match event {
                    HeadEvent::Error(e) => {
                        warn!("订阅错误: {}", e);
                        self.summary.reconnects += 1;
                        if let Err(e) = self.stream.reconnect().await {
                            self.summary.log();
                            return Err(e);
                        }
                    }
                    HeadEvent::Head(head) => self.on_head(head).await,
                },
            }
        }

        self.summary.log();
        Ok(self.summary)
    }

    /// 处理一个区块头，所有错误在此记录后吞掉
    async fn on_head(&mut self, head: ChainHead) {
        self.summary.heads_seen += 1;

        if let Some(last) = self.last_head {
            if head.number <= last {
                self.summary.duplicate_heads += 1;
                info!("跳过已处理的区块: {} (最近 {})", head.number, last);
                return;
            }
        }
        self.last_head = Some(head.number);

        info!(
            "收到新区块: number={}, timestamp={}, hash={:?}",
            head.number, head.timestamp, head.hash
        );

        let tx = match self
            .orchestrator
            .on_head(self.stream.connection(), &head, &self.session)
            .await
        {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                warn!("未启用交易模式 (ETH_TRANSFER / BLOB)，区块 {} 不出价", head.number);
                return;
            }
            Err(e) => {
                self.summary.build_failures += 1;
                error!("交易构建失败: 区块 {}, err={}", head.number, e);
                return;
            }
        };
        self.summary.txs_built += 1;

        let target_block = tx.target_block;
        let reference = match &self.path {
            SubmissionPath::Payload => BidReference::Payload(tx),
            SubmissionPath::Relay(relay) => match relay.submit(&tx).await {
                Ok(_) => BidReference::Hash(tx.hash_hex()),
                Err(e) => {
                    self.summary.relay_failures += 1;
                    error!("中继发送失败: tx={}, err={}", tx.hash_hex(), e);
                    return;
                }
            },
        };

        let bid = self.composer.compose(target_block, reference);
        match self.dispatcher.dispatch(&bid).await {
            Ok(_) => self.summary.bids_sent += 1,
            Err(_) => self.summary.bid_failures += 1,
        }
    }
}
