use std::sync::Arc;

use application::{
    ConversationService, ConversationServiceDependencies, InMemoryMediaStore, ListingService,
    ListingServiceDependencies, LocalEventBroadcaster, SessionService, SystemClock,
};
use config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub listing_service: Arc<ListingService>,
    pub conversation_service: Arc<ConversationService>,
    pub session_service: Arc<SessionService>,
    /// 上传接口的请求体上限
    pub media_max_bytes: usize,
}

impl AppState {
    pub fn new(
        listing_service: Arc<ListingService>,
        conversation_service: Arc<ConversationService>,
        session_service: Arc<SessionService>,
        media_max_bytes: usize,
    ) -> Self {
        Self {
            listing_service,
            conversation_service,
            session_service,
            media_max_bytes,
        }
    }

    /// 按配置组装单进程内存实现
    pub fn from_config(config: &AppConfig) -> Self {
        let broadcaster = Arc::new(LocalEventBroadcaster::new(config.broadcast.capacity));
        let clock = Arc::new(SystemClock);
        let media_store = Arc::new(InMemoryMediaStore::from_config(&config.media));

        let listing_service = Arc::new(ListingService::new(ListingServiceDependencies {
            media_store,
            broadcaster: broadcaster.clone(),
            clock: clock.clone(),
            config: config.listings.clone(),
        }));
        let conversation_service =
            Arc::new(ConversationService::new(ConversationServiceDependencies {
                broadcaster,
                clock,
            }));
        let session_service = Arc::new(SessionService::new(
            conversation_service.clone(),
            listing_service.clone(),
        ));

        Self::new(
            listing_service,
            conversation_service,
            session_service,
            config.media.max_bytes,
        )
    }
}
