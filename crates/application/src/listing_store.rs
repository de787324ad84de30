//! 商品存储
//!
//! 持有权威的商品集合。规范顺序是插入顺序，最新的在最前。
//! 存储本身不加锁，由持有它的服务保证一次只有一个修改者。

use std::collections::{HashMap, VecDeque};

use domain::{
    DomainError, DomainResult, Identity, Listing, ListingId, ListingTitle, MediaRef, Rating,
    RatingAggregate, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::clock::MonotonicStamp;

/// 待创建的商品，字段尚未校验
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub owner: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub media: Option<MediaRef>,
}

impl ListingDraft {
    /// 按身份、标题的顺序校验，不产生任何副作用
    pub fn validate(&self) -> DomainResult<(Identity, ListingTitle)> {
        let owner = Identity::parse(self.owner.clone())?;
        let title = ListingTitle::new(self.title.clone())?;
        Ok((owner, title))
    }
}

/// 基于偏移量的分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetPage {
    pub items: Vec<Listing>,
    pub next_offset: usize,
}

/// 基于游标的分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage {
    pub items: Vec<Listing>,
    pub next_cursor: Option<ListingId>,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    listing: Listing,
}

#[derive(Debug, Default)]
pub struct ListingStore {
    /// 按 seq 降序排列
    entries: VecDeque<Entry>,
    /// 进程生命周期内分配过的每个 ID 及其 seq，下架后仍保留以支持游标
    positions: HashMap<ListingId, u64>,
    next_seq: u64,
    clock: MonotonicStamp,
}

impl ListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn create(&mut self, draft: ListingDraft, now: Timestamp) -> DomainResult<Listing> {
        let (owner, title) = draft.validate()?;

        let mut id = ListingId::generate();
        while self.positions.contains_key(&id) {
            id = ListingId::generate();
        }

        let listing = Listing::new(
            id,
            owner,
            title,
            draft.description,
            draft.price,
            draft.media,
            self.clock.stamp(now),
        );

        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(id, seq);
        self.entries.push_front(Entry {
            seq,
            listing: listing.clone(),
        });

        Ok(listing)
    }

    pub fn get(&self, id: ListingId) -> DomainResult<&Listing> {
        self.index_of(id)
            .map(|index| &self.entries[index].listing)
            .ok_or_else(|| DomainError::not_found("listing", id))
    }

    /// 返回规范顺序中从 `offset` 开始的连续切片。
    ///
    /// 新商品插在最前面，所以在两次调用之间发生插入时，之前算出的
    /// `offset` 会整体后移：下一页可能重复上一页的末尾条目。
    /// 这是偏移分页对前插序列的既定行为，不做掩盖。
    pub fn paginate(&self, offset: usize, limit: usize) -> OffsetPage {
        let items: Vec<Listing> = self
            .entries
            .iter()
            .skip(offset)
            .take(limit)
            .map(|entry| entry.listing.clone())
            .collect();
        let next_offset = offset + items.len();
        OffsetPage { items, next_offset }
    }

    /// 返回严格早于 `after` 的商品，不受并发插入影响。
    ///
    /// `after` 指向已下架的商品时仍然有效；从未分配过的 ID 返回 `NotFound`。
    pub fn paginate_after(
        &self,
        after: Option<ListingId>,
        limit: usize,
    ) -> DomainResult<CursorPage> {
        let start = match after {
            None => 0,
            Some(cursor) => {
                let seq = *self
                    .positions
                    .get(&cursor)
                    .ok_or_else(|| DomainError::not_found("listing cursor", cursor))?;
                self.entries.partition_point(|entry| entry.seq >= seq)
            }
        };

        let items: Vec<Listing> = self
            .entries
            .range(start..)
            .take(limit)
            .map(|entry| entry.listing.clone())
            .collect();
        let next_cursor = items.last().map(|listing| listing.id).or(after);
        Ok(CursorPage { items, next_cursor })
    }

    /// 先校验评分范围，再查找商品；成功时原子地累加
    pub fn rate(&mut self, id: ListingId, rating: i64) -> DomainResult<RatingAggregate> {
        let rating = Rating::new(rating)?;
        let index = self
            .index_of(id)
            .ok_or_else(|| DomainError::not_found("listing", id))?;
        Ok(self.entries[index].listing.rate(rating))
    }

    pub fn remove(&mut self, id: ListingId, requester: &str) -> DomainResult<Listing> {
        let index = self
            .index_of(id)
            .ok_or_else(|| DomainError::not_found("listing", id))?;
        self.entries[index].listing.ensure_owned_by(requester)?;

        let entry = self
            .entries
            .remove(index)
            .ok_or_else(|| DomainError::not_found("listing", id))?;
        Ok(entry.listing)
    }

    fn index_of(&self, id: ListingId) -> Option<usize> {
        let seq = *self.positions.get(&id)?;
        self.entries
            .binary_search_by(|entry| seq.cmp(&entry.seq))
            .ok()
    }
}
