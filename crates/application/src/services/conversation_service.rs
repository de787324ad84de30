use std::{collections::BTreeMap, sync::Arc};

use domain::{Identity, MarketEvent, Message, PresenceState};
use tokio::sync::Mutex;

use crate::{
    broadcaster::EventBroadcaster, clock::Clock, conversation_store::ConversationStore,
    error::ApplicationError, session_registry::PresenceTransition,
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub from: String,
    pub to: String,
    pub content: String,
}

pub struct ConversationServiceDependencies {
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

/// 私信与在线状态的修改入口，与商品存储使用各自独立的锁
pub struct ConversationService {
    deps: ConversationServiceDependencies,
    store: Mutex<ConversationStore>,
}

impl ConversationService {
    pub fn new(deps: ConversationServiceDependencies) -> Self {
        Self {
            deps,
            store: Mutex::new(ConversationStore::new()),
        }
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let now = self.deps.clock.now();
        let mut store = self.store.lock().await;
        let message = store.send(&request.from, &request.to, request.content, now)?;

        tracing::info!(
            message_id = %message.id,
            from = %message.from,
            to = %message.to,
            "私信已送达"
        );
        self.publish(MarketEvent::message_sent(message.clone()))
            .await;
        Ok(message)
    }

    /// 该身份参与的全部会话，按对端分组；未知身份得到空集合
    pub async fn history(
        &self,
        identity: &str,
    ) -> Result<BTreeMap<Identity, Vec<Message>>, ApplicationError> {
        let identity = Identity::parse(identity)?;
        Ok(self.store.lock().await.history(&identity))
    }

    pub async fn presence(&self, identity: &str) -> Result<PresenceState, ApplicationError> {
        let identity = Identity::parse(identity)?;
        Ok(self.store.lock().await.presence(&identity))
    }

    /// 只有状态确实改变时才广播 `presence_changed`
    pub async fn set_presence(&self, identity: Identity, state: PresenceState) -> bool {
        let mut store = self.store.lock().await;
        self.apply_locked(&mut store, identity, state).await
    }

    /// 按顺序落地一组迁移，整组在同一临界区内完成
    pub async fn apply_transitions(&self, transitions: Vec<PresenceTransition>) {
        if transitions.is_empty() {
            return;
        }
        let mut store = self.store.lock().await;
        for transition in transitions {
            self.apply_locked(&mut store, transition.identity, transition.state)
                .await;
        }
    }

    async fn apply_locked(
        &self,
        store: &mut ConversationStore,
        identity: Identity,
        state: PresenceState,
    ) -> bool {
        if !store.set_presence(identity.clone(), state) {
            return false;
        }
        tracing::info!(identity = %identity, state = ?state, "在线状态变化");
        self.publish(MarketEvent::presence_changed(identity, state))
            .await;
        true
    }

    async fn publish(&self, event: MarketEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.deps.broadcaster.broadcast(event).await {
            tracing::error!(error = %err, event_type, "修改已提交，但事件广播失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::SystemClock, local_broadcast::LocalEventBroadcaster};
    use domain::DomainError;

    const ALICE: &str = "alice@0000000001";
    const BOB: &str = "bob@0000000002";

    fn service() -> (ConversationService, Arc<LocalEventBroadcaster>) {
        let broadcaster = Arc::new(LocalEventBroadcaster::new(64));
        let service = ConversationService::new(ConversationServiceDependencies {
            broadcaster: broadcaster.clone(),
            clock: Arc::new(SystemClock),
        });
        (service, broadcaster)
    }

    fn request(from: &str, to: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn send_message_broadcasts_once() {
        let (service, broadcaster) = service();
        let mut events = broadcaster.subscribe();

        let message = service.send_message(request(BOB, ALICE, "hi")).await.unwrap();

        assert_eq!(
            events.try_recv(),
            Some(MarketEvent::message_sent(message.clone()))
        );
        assert_eq!(events.try_recv(), None);

        let history = service.history(ALICE).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn rejected_message_emits_nothing() {
        let (service, broadcaster) = service();
        let mut events = broadcaster.subscribe();

        let err = service
            .send_message(request("bob", ALICE, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidIdentity { .. })
        ));
        assert_eq!(events.try_recv(), None);
    }

    #[tokio::test]
    async fn presence_defaults_to_offline_and_rejects_malformed_identity() {
        let (service, _) = service();
        assert_eq!(service.presence(ALICE).await.unwrap(), PresenceState::Offline);
        assert!(service.presence("alice").await.is_err());
        assert!(service.history("alice").await.is_err());
    }

    #[tokio::test]
    async fn repeated_presence_is_not_rebroadcast() {
        let (service, broadcaster) = service();
        let mut events = broadcaster.subscribe();
        let alice = Identity::parse(ALICE).unwrap();

        assert!(service.set_presence(alice.clone(), PresenceState::Online).await);
        assert!(!service.set_presence(alice.clone(), PresenceState::Online).await);

        assert_eq!(
            events.try_recv(),
            Some(MarketEvent::presence_changed(alice, PresenceState::Online))
        );
        assert_eq!(events.try_recv(), None);
    }
}
