use std::sync::Arc;

use domain::{ConnectionId, Identity};
use tokio::sync::Mutex;

use crate::{
    error::ApplicationError,
    services::{Bootstrap, ConversationService, ListingService},
    session_registry::{SessionRegistry, SessionState},
};

/// 新连接拿到的句柄：连接 ID 和初始快照
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub bootstrap: Bootstrap,
}

/// 维护连接生命周期并驱动在线状态。
///
/// 加锁顺序固定为先会话表、后会话存储。
pub struct SessionService {
    registry: Mutex<SessionRegistry>,
    conversations: Arc<ConversationService>,
    listings: Arc<ListingService>,
}

impl SessionService {
    pub fn new(conversations: Arc<ConversationService>, listings: Arc<ListingService>) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            conversations,
            listings,
        }
    }

    /// 连接建立：匿名会话 + 商品快照 + 快照之后的事件流
    pub async fn connect(&self) -> SessionHandle {
        let bootstrap = self.listings.bootstrap().await;
        let connection_id = self.registry.lock().await.open();
        tracing::debug!(%connection_id, items = bootstrap.snapshot.items.len(), "会话已建立");
        SessionHandle {
            connection_id,
            bootstrap,
        }
    }

    pub async fn register(
        &self,
        connection_id: ConnectionId,
        identity: &str,
    ) -> Result<Identity, ApplicationError> {
        let mut registry = self.registry.lock().await;
        let transitions = registry.register(connection_id, identity)?;
        let identity = Identity::parse(identity)?;
        tracing::info!(%connection_id, identity = %identity, "会话绑定身份");

        self.conversations.apply_transitions(transitions).await;
        Ok(identity)
    }

    /// 重复断开是空操作
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.registry.lock().await;
        let transitions = registry.close(connection_id);
        tracing::debug!(%connection_id, "会话已关闭");

        self.conversations.apply_transitions(transitions).await;
    }

    pub async fn state(&self, connection_id: ConnectionId) -> SessionState {
        self.registry.lock().await.state(connection_id)
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.lock().await.active_sessions()
    }
}
