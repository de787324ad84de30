// 进程内广播器实现
use crate::broadcaster::{BroadcastError, EventBroadcaster, EventStream};
use async_trait::async_trait;
use domain::MarketEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct LocalEventBroadcaster {
    sender: broadcast::Sender<MarketEvent>,
}

impl LocalEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for LocalEventBroadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBroadcaster for LocalEventBroadcaster {
    async fn broadcast(&self, event: MarketEvent) -> Result<(), BroadcastError> {
        // 没有任何连接时事件直接丢弃
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        let event_type = event.event_type();
        let delivered = self
            .sender
            .send(event)
            .map_err(|err| BroadcastError::failed(err.to_string()))?;
        tracing::debug!(event_type, delivered, "事件已广播");
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        EventStream::new(self.sender.subscribe())
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Identity, ListingId, PresenceState};

    #[tokio::test]
    async fn broadcast_without_subscribers_is_ok() {
        let broadcaster = LocalEventBroadcaster::new(8);
        let event = MarketEvent::listing_removed(ListingId::generate());
        assert!(broadcaster.broadcast(event).await.is_ok());
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_event_once() {
        let broadcaster = LocalEventBroadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        let event = MarketEvent::presence_changed(
            Identity::parse("alice@0000000001").unwrap(),
            PresenceState::Online,
        );
        broadcaster.broadcast(event.clone()).await.unwrap();

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(second.recv().await, Some(event));
        assert!(first.try_recv().is_none());
        assert!(second.try_recv().is_none());
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_later_events() {
        let broadcaster = LocalEventBroadcaster::new(8);
        let _early = broadcaster.subscribe();
        let before = MarketEvent::listing_removed(ListingId::generate());
        broadcaster.broadcast(before).await.unwrap();

        let mut late = broadcaster.subscribe();
        let after = MarketEvent::listing_removed(ListingId::generate());
        broadcaster.broadcast(after.clone()).await.unwrap();

        assert_eq!(late.recv().await, Some(after));
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_overflow_and_keeps_going() {
        let broadcaster = LocalEventBroadcaster::new(2);
        let mut slow = broadcaster.subscribe();
        let ids: Vec<_> = (0..4).map(|_| ListingId::generate()).collect();
        for id in &ids {
            broadcaster
                .broadcast(MarketEvent::listing_removed(*id))
                .await
                .unwrap();
        }

        // 容量为 2，只剩最后两个
        assert_eq!(slow.recv().await, Some(MarketEvent::listing_removed(ids[2])));
        assert_eq!(slow.recv().await, Some(MarketEvent::listing_removed(ids[3])));
    }
}
