use std::sync::Arc;

use config::{ListingConfig, PaginationMode};
use domain::{DomainError, Listing, ListingId, MarketEvent, MediaRef, RatingAggregate};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    broadcaster::{EventBroadcaster, EventStream},
    clock::Clock,
    error::ApplicationError,
    listing_store::{CursorPage, ListingDraft, ListingStore, OffsetPage},
    media::{MediaError, MediaStore},
};

#[derive(Debug, Clone, Default)]
pub struct CreateListingRequest {
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub media: Option<MediaRef>,
}

impl CreateListingRequest {
    fn into_draft(self) -> ListingDraft {
        ListingDraft {
            owner: self.owner,
            title: self.title,
            description: self.description.unwrap_or_default(),
            price: self.price.unwrap_or_default(),
            media: self.media,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListingQuery {
    pub offset: Option<usize>,
    pub after: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListingPage {
    Offset(OffsetPage),
    Cursor(CursorPage),
}

/// 连接建立时的初始快照，以及紧接着快照之后的事件流
pub struct Bootstrap {
    pub snapshot: OffsetPage,
    pub events: EventStream,
}

pub struct ListingServiceDependencies {
    pub media_store: Arc<dyn MediaStore>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub config: ListingConfig,
}

/// 商品存储的唯一修改入口。
///
/// 每个修改在持有存储锁期间完成写入并交出事件，
/// 因此同一商品的事件顺序与操作被接受的顺序一致。
pub struct ListingService {
    deps: ListingServiceDependencies,
    store: Mutex<ListingStore>,
}

impl ListingService {
    pub fn new(deps: ListingServiceDependencies) -> Self {
        Self {
            deps,
            store: Mutex::new(ListingStore::new()),
        }
    }

    pub fn config(&self) -> &ListingConfig {
        &self.deps.config
    }

    /// 写入外部媒体存储；被拒绝时不触碰商品存储
    pub async fn upload_media(&self, upload: MediaUpload) -> Result<MediaRef, ApplicationError> {
        let media = self
            .deps
            .media_store
            .store(upload.bytes, &upload.content_type)
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "媒体被拒绝"))?;
        Ok(media)
    }

    /// 引用已上传媒体的商品：媒体必须存在且未被其他在架商品占用
    pub async fn create_listing(
        &self,
        request: CreateListingRequest,
    ) -> Result<Listing, ApplicationError> {
        let draft = request.into_draft();
        draft.validate()?;
        self.insert_claiming(draft).await
    }

    /// 先校验字段、再写媒体、最后创建商品：媒体写入完成前不会宣布商品
    pub async fn create_listing_with_upload(
        &self,
        request: CreateListingRequest,
        upload: MediaUpload,
    ) -> Result<Listing, ApplicationError> {
        if request.media.is_some() {
            return Err(DomainError::invalid_argument(
                "media_ref",
                "cannot be combined with an upload",
            )
            .into());
        }

        let mut draft = request.into_draft();
        draft.validate()?;

        draft.media = Some(self.upload_media(upload).await?);
        self.insert_claiming(draft).await
    }

    /// 占用媒体后插入；插入失败时释放媒体，商品不会引用不存在的句柄
    async fn insert_claiming(&self, draft: ListingDraft) -> Result<Listing, ApplicationError> {
        let Some(media) = draft.media.clone() else {
            return self.insert(draft).await;
        };

        self.deps.media_store.claim(&media).await.map_err(|err| match err {
            MediaError::UnknownReference { .. } | MediaError::AlreadyClaimed { .. } => {
                tracing::warn!(handle = %media.handle, error = %err, "媒体引用被拒绝");
                ApplicationError::from(DomainError::media_rejected(err.to_string()))
            }
            other => other.into(),
        })?;

        match self.insert(draft).await {
            Ok(listing) => Ok(listing),
            Err(err) => {
                if let Err(release_err) = self.deps.media_store.release(&media).await {
                    tracing::warn!(error = %release_err, handle = %media.handle, "回滚媒体失败");
                }
                Err(err)
            }
        }
    }

    async fn insert(&self, draft: ListingDraft) -> Result<Listing, ApplicationError> {
        let now = self.deps.clock.now();
        let mut store = self.store.lock().await;
        let listing = store.create(draft, now)?;

        tracing::info!(
            listing_id = %listing.id,
            owner = %listing.owner,
            "商品已上架"
        );
        self.publish(MarketEvent::listing_created(listing.clone()))
            .await;
        Ok(listing)
    }

    pub async fn browse(&self, query: ListingQuery) -> Result<ListingPage, ApplicationError> {
        let limit = self.clamp_limit(query.limit);
        let offset = query.offset.unwrap_or(0);

        if query.after.is_some() && query.offset.is_some() {
            return Err(
                DomainError::invalid_argument("after", "cannot be combined with offset").into(),
            );
        }

        let store = self.store.lock().await;
        match self.deps.config.pagination_mode {
            PaginationMode::Offset => {
                if query.after.is_some() {
                    return Err(DomainError::invalid_argument(
                        "after",
                        "cursor pagination is disabled",
                    )
                    .into());
                }
                Ok(ListingPage::Offset(store.paginate(offset, limit)))
            }
            PaginationMode::Cursor => {
                if offset != 0 {
                    return Err(DomainError::invalid_argument(
                        "offset",
                        "offset pagination is disabled",
                    )
                    .into());
                }
                let page = store.paginate_after(query.after.map(ListingId::from), limit)?;
                Ok(ListingPage::Cursor(page))
            }
        }
    }

    /// 不受分页模式限制的偏移分页
    pub async fn paginate(&self, offset: usize, limit: usize) -> OffsetPage {
        self.store
            .lock()
            .await
            .paginate(offset, self.clamp_limit(Some(limit)))
    }

    pub async fn get_listing(&self, id: Uuid) -> Result<Listing, ApplicationError> {
        let store = self.store.lock().await;
        Ok(store.get(ListingId::from(id))?.clone())
    }

    pub async fn rate(&self, id: Uuid, rating: i64) -> Result<RatingAggregate, ApplicationError> {
        let id = ListingId::from(id);
        let mut store = self.store.lock().await;
        let aggregate = store.rate(id, rating)?;

        tracing::info!(
            listing_id = %id,
            rating,
            count = aggregate.count,
            total = aggregate.total,
            "商品评分已更新"
        );
        self.publish(MarketEvent::listing_rated(id, aggregate)).await;
        Ok(aggregate)
    }

    /// 拥有者下架：移出规范顺序、释放媒体、广播事件
    pub async fn remove(&self, id: Uuid, requester: &str) -> Result<Listing, ApplicationError> {
        let id = ListingId::from(id);
        let mut store = self.store.lock().await;
        let listing = store.remove(id, requester).inspect_err(|err| {
            if matches!(err, DomainError::Unauthorized { .. }) {
                tracing::warn!(listing_id = %id, requester, "非拥有者尝试下架商品");
            }
        })?;

        if let Some(media) = &listing.media {
            if let Err(err) = self.deps.media_store.release(media).await {
                tracing::warn!(error = %err, handle = %media.handle, "释放媒体失败");
            }
        }

        tracing::info!(listing_id = %id, "商品已下架");
        self.publish(MarketEvent::listing_removed(id)).await;
        Ok(listing)
    }

    /// 订阅与快照在同一临界区内完成：
    /// 快照之后的每个商品事件都会送达，快照之前的不会重复送达
    pub async fn bootstrap(&self) -> Bootstrap {
        let store = self.store.lock().await;
        let events = self.deps.broadcaster.subscribe();
        let snapshot = store.paginate(0, self.deps.config.page_size);
        Bootstrap { snapshot, events }
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }

    fn clamp_limit(&self, limit: Option<usize>) -> usize {
        limit
            .unwrap_or(self.deps.config.page_size)
            .clamp(1, self.deps.config.max_page_size)
    }

    /// 修改已经提交，广播失败只记录不回滚
    async fn publish(&self, event: MarketEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.deps.broadcaster.broadcast(event).await {
            tracing::error!(error = %err, event_type, "修改已提交，但事件广播失败");
        }
    }
}
