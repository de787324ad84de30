use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{Identity, ListingId, ListingTitle, Rating, Timestamp};

/// 外部媒体存储返回的不透明引用，附带声明的内容类型。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub handle: String,
    pub content_type: String,
}

impl MediaRef {
    pub fn new(handle: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            content_type: content_type.into(),
        }
    }
}

/// 评分聚合：只增不减。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub count: u64,
    pub total: u64,
}

impl RatingAggregate {
    pub fn record(&mut self, rating: Rating) {
        self.count += 1;
        self.total += u64::from(rating.value());
    }

    /// 尚无评分时没有平均值。
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total as f64 / self.count as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner: Identity,
    pub title: ListingTitle,
    pub description: String,
    pub price: String,
    pub media: Option<MediaRef>,
    pub rating: RatingAggregate,
    pub created_at: Timestamp,
}

impl Listing {
    pub fn new(
        id: ListingId,
        owner: Identity,
        title: ListingTitle,
        description: impl Into<String>,
        price: impl Into<String>,
        media: Option<MediaRef>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            title,
            description: description.into(),
            price: price.into(),
            media,
            rating: RatingAggregate::default(),
            created_at,
        }
    }

    pub fn rate(&mut self, rating: Rating) -> RatingAggregate {
        self.rating.record(rating);
        self.rating
    }

    /// 只有拥有者可以下架。
    pub fn ensure_owned_by(&self, requester: &str) -> Result<(), DomainError> {
        if self.owner.as_str() != requester {
            return Err(DomainError::unauthorized(format!(
                "{requester} cannot remove listing {}",
                self.id
            )));
        }
        Ok(())
    }
}
