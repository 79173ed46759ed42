use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use futures_util::StreamExt;
use models::ChainHead;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};
use ::utils::RetryPolicy;

/// 区块头订阅配置
#[derive(Debug, Clone)]
pub struct HeadStreamConfig {
    /// 连接失败后的固定等待 (无上限重试)
    pub connect_retry_delay: Duration,
    /// 重连尝试之间的固定等待
    pub reconnect_delay: Duration,
    /// 重连最大尝试次数，耗尽即致命
    pub reconnect_attempts: u32,
}

impl Default for HeadStreamConfig {
    fn default() -> Self {
        Self {
            connect_retry_delay: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            reconnect_attempts: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum HeadStreamError {
    #[error("failed to connect head stream: {0}")]
    Connect(String),

    #[error("failed to subscribe to new heads: {0}")]
    Subscribe(String),

    #[error("failed to reconnect head stream after {attempts} attempts: {last}")]
    ReconnectExhausted { attempts: u32, last: String },
}

/// 订阅流上的一个事件
#[derive(Debug)]
pub enum HeadEvent {
    Head(ChainHead),
    Error(anyhow::Error),
}

/// 一次活跃的区块头订阅
///
/// 持有连接、两个事件通道以及转发任务；drop 时结束转发任务
pub struct HeadSubscription<C> {
    conn: C,
    heads: mpsc::Receiver<ChainHead>,
    errors: mpsc::Receiver<anyhow::Error>,
    pump: Option<JoinHandle<()>>,
}

impl<C> HeadSubscription<C> {
    pub fn new(
        conn: C,
        heads: mpsc::Receiver<ChainHead>,
        errors: mpsc::Receiver<anyhow::Error>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            conn,
            heads,
            errors,
            pump,
        }
    }
}

impl<C> Drop for HeadSubscription<C> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// 区块头来源
///
/// `dial` 建立连接，`subscribe` 在该连接上订阅新区块头
#[async_trait]
pub trait HeadSource: Send + Sync {
    type Conn: Clone + Send + Sync + 'static;

    async fn dial(&self) -> Result<Self::Conn>;

    async fn subscribe(&self, conn: &Self::Conn) -> Result<HeadSubscription<Self::Conn>>;
}

/// 基于 WebSocket `eth_subscribe("newHeads")` 的区块头来源
pub struct WsHeadSource {
    ws_url: String,
}

impl WsHeadSource {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

#[async_trait]
impl HeadSource for WsHeadSource {
    type Conn = Arc<Provider<Ws>>;

    async fn dial(&self) -> Result<Self::Conn> {
        let ws = Ws::connect(&self.ws_url).await?;
        Ok(Arc::new(Provider::new(ws)))
    }

    async fn subscribe(&self, conn: &Self::Conn) -> Result<HeadSubscription<Self::Conn>> {
        let (head_tx, head_rx) = mpsc::channel(64);
        let (err_tx, err_rx) = mpsc::channel(4);
        let (ready_tx, ready_rx) = oneshot::channel();

        let provider = conn.clone();
        let pump = tokio::spawn(async move {
            let mut stream = match provider.subscribe_blocks().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while let Some(block) = stream.next().await {
                if head_tx.send(ChainHead::from(&block)).await.is_err() {
                    // 订阅已被替换
                    return;
                }
            }

            let _ = err_tx.send(anyhow!("new head subscription closed")).await;
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(HeadSubscription::new(conn.clone(), head_rx, err_rx, Some(pump))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(anyhow!("subscription task exited before subscribing")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Streaming,
    Reconnecting,
    Fatal,
}

/// 区块头订阅管理器
///
/// 持有唯一的区块头订阅，出错时在内部替换连接；
/// 使用方只会看到区块头事件出现一段空档
pub struct HeadStreamManager<S: HeadSource> {
    source: S,
    config: HeadStreamConfig,
    state: ConnectionState,
    subscription: HeadSubscription<S::Conn>,
}

impl<S: HeadSource> HeadStreamManager<S> {
    /// 连接 (无上限重试) 并订阅
    ///
    /// 首次订阅失败是致命的
    pub async fn connect(source: S, config: HeadStreamConfig) -> Result<Self, HeadStreamError> {
        let conn = dial_until_connected(&source, config.connect_retry_delay)
            .await
            .map_err(|e| HeadStreamError::Connect(e.to_string()))?;
        info!("(ws) 客户端已连接");

        let subscription = source
            .subscribe(&conn)
            .await
            .map_err(|e| HeadStreamError::Subscribe(e.to_string()))?;
        info!("已订阅新区块头");

        Ok(Self {
            source,
            config,
            state: ConnectionState::Streaming,
            subscription,
        })
    }

    /// 当前连接 (重连后会变化)
    pub fn connection(&self) -> &S::Conn {
        &self.subscription.conn
    }

    /// 等待下一个事件，错误优先于区块头
    ///
    /// 两个通道都已关闭时返回错误事件
    pub async fn next_event(&mut self) -> HeadEvent {
        let subscription = &mut self.subscription;
        tokio::select! {
            biased;
            Some(err) = subscription.errors.recv() => HeadEvent::Error(err),
            Some(head) = subscription.heads.recv() => HeadEvent::Head(head),
            else => HeadEvent::Error(anyhow!("head stream channels closed")),
        }
    }

    /// 重连并重新订阅
    ///
    /// 每次尝试 = 连接 (无上限重试) + 订阅；固定间隔，次数耗尽即致命。
    /// 进入致命状态后不再发起任何尝试
    pub async fn reconnect(&mut self) -> Result<(), HeadStreamError> {
        if self.state == ConnectionState::Fatal {
            return Err(HeadStreamError::ReconnectExhausted {
                attempts: self.config.reconnect_attempts,
                last: "head stream already failed".to_string(),
            });
        }
        self.state = ConnectionState::Reconnecting;

        let source = &self.source;
        let connect_delay = self.config.connect_retry_delay;
        let policy = RetryPolicy::fixed(self.config.reconnect_delay, self.config.reconnect_attempts);

        let result = policy
            .run("重连 WebSocket 客户端", |_| async move {
                let conn = dial_until_connected(source, connect_delay).await?;
                info!("(ws) 客户端已重连");
                source.subscribe(&conn).await
            })
            .await;

        match result {
            Ok(subscription) => {
                self.subscription = subscription;
                self.state = ConnectionState::Streaming;
                info!("已重新订阅新区块头");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Fatal;
                error!("{} 次尝试后仍无法重连 WebSocket 客户端: {}", e.attempts, e.last);
                Err(HeadStreamError::ReconnectExhausted {
                    attempts: e.attempts,
                    last: e.last.to_string(),
                })
            }
        }
    }
}

/// 无上限重试直到连上，无上限策略只会返回 Ok
async fn dial_until_connected<S: HeadSource>(source: &S, delay: Duration) -> Result<S::Conn> {
    RetryPolicy::unbounded(delay)
        .run("连接 WebSocket 客户端", |_| source.dial())
        .await
        .map_err(|e| e.last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::H256;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// 测试用来源: 可控制拨号/订阅失败次数，并保留事件发送端
    #[derive(Default)]
    struct FakeSource {
        dial_failures: AtomicU32,
        dials: AtomicU32,
        subscribe_failures: AtomicU32,
        subscribes: AtomicU32,
        senders: Mutex<Vec<(mpsc::Sender<ChainHead>, mpsc::Sender<anyhow::Error>)>>,
    }

    impl FakeSource {
        fn failing_subscribe(times: u32) -> Self {
            let source = Self::default();
            source.subscribe_failures.store(times, Ordering::SeqCst);
            source
        }

        fn latest(&self) -> (mpsc::Sender<ChainHead>, mpsc::Sender<anyhow::Error>) {
            self.senders.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HeadSource for Arc<FakeSource> {
        type Conn = u32;

        async fn dial(&self) -> Result<u32> {
            let n = self.dials.fetch_add(1, Ordering::SeqCst);
            if self.dial_failures.load(Ordering::SeqCst) > 0 {
                self.dial_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("dial refused"));
            }
            Ok(n)
        }

        async fn subscribe(&self, conn: &u32) -> Result<HeadSubscription<u32>> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            if self.subscribe_failures.load(Ordering::SeqCst) > 0 {
                self.subscribe_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("subscribe refused"));
            }
            let (head_tx, head_rx) = mpsc::channel(8);
            let (err_tx, err_rx) = mpsc::channel(8);
            self.senders.lock().unwrap().push((head_tx, err_tx));
            Ok(HeadSubscription::new(*conn, head_rx, err_rx, None))
        }
    }

    fn head(number: u64) -> ChainHead {
        ChainHead::new(number, 1_700_000_000 + number, H256::from_low_u64_be(number))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_dial_without_limit() {
        let source = Arc::new(FakeSource::default());
        source.dial_failures.store(25, Ordering::SeqCst);
        let start = Instant::now();

        let manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        assert_eq!(source.dials.load(Ordering::SeqCst), 26);
        assert_eq!(*manager.connection(), 25);
        assert_eq!(start.elapsed(), Duration::from_secs(250));
    }

    #[tokio::test]
    async fn test_initial_subscribe_failure_is_fatal() {
        let source = Arc::new(FakeSource::failing_subscribe(1));
        let result = HeadStreamManager::connect(source, HeadStreamConfig::default()).await;
        assert!(matches!(result, Err(HeadStreamError::Subscribe(_))));
    }

    #[tokio::test]
    async fn test_events_are_delivered() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        let (head_tx, _) = source.latest();
        head_tx.send(head(100)).await.unwrap();

        match manager.next_event().await {
            HeadEvent::Head(h) => assert_eq!(h.number, 100),
            HeadEvent::Error(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn test_error_wins_over_head() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        let (head_tx, err_tx) = source.latest();
        head_tx.send(head(1)).await.unwrap();
        err_tx.send(anyhow!("socket reset")).await.unwrap();

        assert!(matches!(manager.next_event().await, HeadEvent::Error(_)));
        assert!(matches!(manager.next_event().await, HeadEvent::Head(_)));
    }

    #[tokio::test]
    async fn test_closed_channels_surface_as_error() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        source.senders.lock().unwrap().clear();
        assert!(matches!(manager.next_event().await, HeadEvent::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_swaps_connection() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();
        assert_eq!(*manager.connection(), 0);

        // 旧订阅中积压的区块头不会被再次投递
        let (old_head_tx, _) = source.latest();
        old_head_tx.send(head(7)).await.unwrap();

        manager.reconnect().await.unwrap();
        assert_eq!(*manager.connection(), 1);
        assert_eq!(manager.state, ConnectionState::Streaming);

        let (head_tx, _) = source.latest();
        head_tx.send(head(8)).await.unwrap();
        match manager.next_event().await {
            HeadEvent::Head(h) => assert_eq!(h.number, 8),
            HeadEvent::Error(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_gives_up_after_ten_attempts() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        source.subscribe_failures.store(u32::MAX, Ordering::SeqCst);
        let subscribes_before = source.subscribes.load(Ordering::SeqCst);
        let start = Instant::now();

        let result = manager.reconnect().await;

        assert!(matches!(
            result,
            Err(HeadStreamError::ReconnectExhausted { attempts: 10, .. })
        ));
        assert_eq!(source.subscribes.load(Ordering::SeqCst) - subscribes_before, 10);
        assert_eq!(manager.state, ConnectionState::Fatal);
        // 9 次 5 秒间隔
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_attempts_after_fatal() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        source.subscribe_failures.store(u32::MAX, Ordering::SeqCst);
        assert!(manager.reconnect().await.is_err());

        let dials = source.dials.load(Ordering::SeqCst);
        let subscribes = source.subscribes.load(Ordering::SeqCst);
        let start = Instant::now();

        let result = manager.reconnect().await;

        assert!(matches!(result, Err(HeadStreamError::ReconnectExhausted { .. })));
        assert_eq!(source.dials.load(Ordering::SeqCst), dials);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), subscribes);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_recovers_within_ceiling() {
        let source = Arc::new(FakeSource::default());
        let mut manager = HeadStreamManager::connect(source.clone(), HeadStreamConfig::default())
            .await
            .unwrap();

        source.subscribe_failures.store(9, Ordering::SeqCst);
        manager.reconnect().await.unwrap();
        assert_eq!(manager.state, ConnectionState::Streaming);
    }
}
