use std::collections::BTreeMap;

use domain::{Identity, Listing, MediaRef, Message, PresenceState, RatingAggregate, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::listing_store::{CursorPage, OffsetPage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDto {
    pub count: u64,
    pub total: u64,
    /// 尚无评分时为 `null`
    pub average: Option<f64>,
}

impl From<RatingAggregate> for RatingDto {
    fn from(rating: RatingAggregate) -> Self {
        Self {
            count: rating.count,
            total: rating.total,
            average: rating.average(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDto {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub media: Option<MediaRef>,
    pub rating: RatingDto,
    pub created_at: Timestamp,
}

impl From<&Listing> for ListingDto {
    fn from(listing: &Listing) -> Self {
        Self {
            id: Uuid::from(listing.id),
            owner: listing.owner.to_string(),
            title: listing.title.as_str().to_owned(),
            description: listing.description.clone(),
            price: listing.price.clone(),
            media: listing.media.clone(),
            rating: RatingDto::from(listing.rating),
            created_at: listing.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: Timestamp,
    pub delivered: bool,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.0,
            from: message.from.to_string(),
            to: message.to.to_string(),
            content: message.content.as_str().to_owned(),
            timestamp: message.timestamp,
            delivered: message.delivered,
        }
    }
}

/// 分页响应：偏移模式带 `next_offset`，游标模式带 `next_cursor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingPageDto {
    Offset {
        items: Vec<ListingDto>,
        next_offset: usize,
    },
    Cursor {
        items: Vec<ListingDto>,
        next_cursor: Option<Uuid>,
    },
}

impl ListingPageDto {
    pub fn items(&self) -> &[ListingDto] {
        match self {
            ListingPageDto::Offset { items, .. } | ListingPageDto::Cursor { items, .. } => items,
        }
    }
}

impl From<&OffsetPage> for ListingPageDto {
    fn from(page: &OffsetPage) -> Self {
        ListingPageDto::Offset {
            items: page.items.iter().map(ListingDto::from).collect(),
            next_offset: page.next_offset,
        }
    }
}

impl From<&CursorPage> for ListingPageDto {
    fn from(page: &CursorPage) -> Self {
        ListingPageDto::Cursor {
            items: page.items.iter().map(ListingDto::from).collect(),
            next_cursor: page.next_cursor.map(Uuid::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceDto {
    pub identity: String,
    pub state: PresenceState,
}

/// 对端身份 -> 消息序列
pub type ConversationsDto = BTreeMap<String, Vec<MessageDto>>;

pub fn conversations_dto(history: &BTreeMap<Identity, Vec<Message>>) -> ConversationsDto {
    history
        .iter()
        .map(|(peer, messages)| {
            (
                peer.to_string(),
                messages.iter().map(MessageDto::from).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_dto_has_null_average_until_first_rating() {
        let empty = serde_json::to_value(RatingDto::from(RatingAggregate::default())).unwrap();
        assert!(empty["average"].is_null());

        let rated = RatingDto::from(RatingAggregate { count: 2, total: 8 });
        assert_eq!(rated.average, Some(4.0));
    }

    #[test]
    fn page_shapes_are_distinguished_by_marker_field() {
        let offset = ListingPageDto::Offset {
            items: Vec::new(),
            next_offset: 3,
        };
        let json = serde_json::to_value(&offset).unwrap();
        assert_eq!(json["next_offset"], 3);
        assert!(json.get("next_cursor").is_none());

        let cursor = ListingPageDto::Cursor {
            items: Vec::new(),
            next_cursor: None,
        };
        let json = serde_json::to_value(&cursor).unwrap();
        assert!(json["next_cursor"].is_null());
    }
}
