//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：商品存储、私信与在线状态、
//! 会话生命周期，以及对外部适配器（媒体存储、事件广播）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod conversation_store;
pub mod dto;
pub mod error;
pub mod listing_store;
pub mod local_broadcast;
pub mod media;
pub mod services;
pub mod session_registry;

pub use broadcaster::{BroadcastError, EventBroadcaster, EventStream};
pub use clock::{Clock, SystemClock};
pub use conversation_store::ConversationStore;
pub use dto::{
    conversations_dto, ConversationsDto, ListingDto, ListingPageDto, MessageDto, PresenceDto,
    RatingDto,
};
pub use error::ApplicationError;
pub use listing_store::{CursorPage, ListingDraft, ListingStore, OffsetPage};
pub use local_broadcast::LocalEventBroadcaster;
pub use media::{InMemoryMediaStore, MediaError, MediaStore};
pub use services::{
    Bootstrap, ConversationService, ConversationServiceDependencies, CreateListingRequest,
    ListingPage, ListingQuery, ListingService, ListingServiceDependencies, MediaUpload,
    SendMessageRequest, SessionHandle, SessionService,
};
pub use session_registry::{PresenceTransition, SessionRegistry, SessionState};
