use async_trait::async_trait;
use domain::MarketEvent;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 单一的事件扇出点。
///
/// “在线”以广播那一刻为准：广播时已订阅的连接各收到一次，
/// 之后才订阅的连接收不到，也没有重放。
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast(&self, event: MarketEvent) -> Result<(), BroadcastError>;

    /// 订阅之后广播的所有事件
    fn subscribe(&self) -> EventStream;

    fn subscriber_count(&self) -> usize;
}

/// 单个连接的事件流
pub struct EventStream {
    receiver: broadcast::Receiver<MarketEvent>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<MarketEvent>) -> Self {
        Self { receiver }
    }

    /// 等待下一个事件；广播器关闭时返回 `None`。
    ///
    /// 积压超过容量的事件会被丢弃，流本身继续可用。
    pub async fn recv(&mut self) -> Option<MarketEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "连接消费过慢，丢弃了积压的事件");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 非阻塞读取，没有待处理事件时返回 `None`
    pub fn try_recv(&mut self) -> Option<MarketEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "连接消费过慢，丢弃了积压的事件");
                }
                Err(_) => return None,
            }
        }
    }
}
