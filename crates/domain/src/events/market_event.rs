//! 集市相关的领域事件
//!
//! 每次成功的状态变更恰好产生一个事件，由广播器推送给所有在线连接。

use serde::{Deserialize, Serialize};

use crate::entities::{Listing, Message, PresenceState, RatingAggregate};
use crate::value_objects::{Identity, ListingId};

/// 集市领域事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    /// 新商品上架
    ListingCreated { listing: Listing },

    /// 商品评分更新，携带更新后的聚合
    ListingRated {
        id: ListingId,
        rating: RatingAggregate,
    },

    /// 商品被拥有者下架
    ListingRemoved { id: ListingId },

    /// 私信已发送
    MessageSent { message: Message },

    /// 身份在线状态发生了真实的变化
    PresenceChanged {
        identity: Identity,
        state: PresenceState,
    },
}

impl MarketEvent {
    pub fn listing_created(listing: Listing) -> Self {
        MarketEvent::ListingCreated { listing }
    }

    pub fn listing_rated(id: ListingId, rating: RatingAggregate) -> Self {
        MarketEvent::ListingRated { id, rating }
    }

    pub fn listing_removed(id: ListingId) -> Self {
        MarketEvent::ListingRemoved { id }
    }

    pub fn message_sent(message: Message) -> Self {
        MarketEvent::MessageSent { message }
    }

    pub fn presence_changed(identity: Identity, state: PresenceState) -> Self {
        MarketEvent::PresenceChanged { identity, state }
    }

    /// 获取事件类型名称
    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::ListingCreated { .. } => "listing_created",
            MarketEvent::ListingRated { .. } => "listing_rated",
            MarketEvent::ListingRemoved { .. } => "listing_removed",
            MarketEvent::MessageSent { .. } => "message_sent",
            MarketEvent::PresenceChanged { .. } => "presence_changed",
        }
    }

    /// 事件涉及的商品（如果有）
    pub fn listing_id(&self) -> Option<ListingId> {
        match self {
            MarketEvent::ListingCreated { listing } => Some(listing.id),
            MarketEvent::ListingRated { id, .. } | MarketEvent::ListingRemoved { id } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_snake_case() {
        let event = MarketEvent::presence_changed(
            Identity::parse("alice@0000000001").unwrap(),
            PresenceState::Online,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "presence_changed");
        assert_eq!(json["identity"], "alice@0000000001");
        assert_eq!(json["state"], "online");
        assert_eq!(event.event_type(), "presence_changed");
    }
}
