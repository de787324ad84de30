mod conversation_service;
mod listing_service;
mod session_service;

pub use conversation_service::{
    ConversationService, ConversationServiceDependencies, SendMessageRequest,
};
pub use listing_service::{
    Bootstrap, CreateListingRequest, ListingPage, ListingQuery, ListingService,
    ListingServiceDependencies, MediaUpload,
};
pub use session_service::{SessionHandle, SessionService};
