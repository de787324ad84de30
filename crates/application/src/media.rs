//! 媒体存储协作方
//!
//! 核心只通过不透明引用和内容类型访问上传的字节，从不检查内容本身。

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use domain::MediaRef;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("unsupported media type: {content_type}")]
    UnsupportedType { content_type: String },
    #[error("media too large: {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("media body is empty")]
    Empty,
    #[error("unknown media reference {handle}")]
    UnknownReference { handle: String },
    #[error("media reference {handle} is already used by another listing")]
    AlreadyClaimed { handle: String },
    #[error("media storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// 写入完成并返回引用之后，调用方才能宣布引用它的商品
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<MediaRef, MediaError>;

    async fn contains(&self, media: &MediaRef) -> bool;

    /// 把引用交给一个商品独占；未知引用或已被占用都会失败
    async fn claim(&self, media: &MediaRef) -> Result<(), MediaError>;

    /// 释放引用；重复释放不是错误
    async fn release(&self, media: &MediaRef) -> Result<(), MediaError>;
}

/// 去掉 `; charset=...` 之类的参数并转为小写
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

struct StoredBlob {
    content_type: String,
    #[allow(dead_code)]
    bytes: Vec<u8>,
    claimed: bool,
}

#[derive(Default)]
struct Blobs {
    by_handle: HashMap<String, StoredBlob>,
    /// 尚未被商品占用的句柄，按上传先后排列
    pending: VecDeque<String>,
}

impl Blobs {
    fn forget_pending(&mut self, handle: &str) {
        self.pending.retain(|pending| pending != handle);
    }
}

/// 内存实现的媒体存储，带类型白名单、大小上限和未占用上传的数量上限
pub struct InMemoryMediaStore {
    allowed_types: HashSet<String>,
    max_bytes: usize,
    max_pending: usize,
    blobs: RwLock<Blobs>,
}

impl InMemoryMediaStore {
    pub fn new(
        allowed_types: impl IntoIterator<Item = String>,
        max_bytes: usize,
        max_pending: usize,
    ) -> Self {
        Self {
            allowed_types: allowed_types
                .into_iter()
                .map(|t| normalize_content_type(&t))
                .collect(),
            max_bytes,
            max_pending: max_pending.max(1),
            blobs: RwLock::new(Blobs::default()),
        }
    }

    pub fn from_config(config: &config::MediaConfig) -> Self {
        Self::new(
            config.allowed_types.iter().cloned(),
            config.max_bytes,
            config.max_pending_uploads,
        )
    }

    /// 在任何写入之前完成校验
    pub fn check(&self, size: usize, content_type: &str) -> Result<String, MediaError> {
        let content_type = normalize_content_type(content_type);
        if !self.allowed_types.contains(&content_type) {
            return Err(MediaError::UnsupportedType { content_type });
        }
        if size == 0 {
            return Err(MediaError::Empty);
        }
        if size > self.max_bytes {
            return Err(MediaError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(content_type)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.by_handle.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.by_handle.is_empty()
    }

    /// 尚未被任何商品占用的上传数
    pub async fn pending_len(&self) -> usize {
        self.blobs.read().await.pending.len()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<MediaRef, MediaError> {
        let content_type = self.check(bytes.len(), content_type)?;
        let handle = Uuid::new_v4().simple().to_string();
        let size = bytes.len();

        let mut blobs = self.blobs.write().await;
        blobs.by_handle.insert(
            handle.clone(),
            StoredBlob {
                content_type: content_type.clone(),
                bytes,
                claimed: false,
            },
        );
        blobs.pending.push_back(handle.clone());

        while blobs.pending.len() > self.max_pending {
            let Some(oldest) = blobs.pending.pop_front() else {
                break;
            };
            if blobs.by_handle.remove(&oldest).is_some() {
                tracing::warn!(handle = %oldest, "未被商品引用的上传已回收");
            }
        }

        tracing::info!(handle = %handle, content_type = %content_type, size, "媒体已保存");
        Ok(MediaRef::new(handle, content_type))
    }

    async fn contains(&self, media: &MediaRef) -> bool {
        self.blobs
            .read()
            .await
            .by_handle
            .get(&media.handle)
            .is_some_and(|blob| blob.content_type == media.content_type)
    }

    async fn claim(&self, media: &MediaRef) -> Result<(), MediaError> {
        let mut blobs = self.blobs.write().await;
        let blob = blobs
            .by_handle
            .get_mut(&media.handle)
            .filter(|blob| blob.content_type == media.content_type)
            .ok_or_else(|| MediaError::UnknownReference {
                handle: media.handle.clone(),
            })?;
        if blob.claimed {
            return Err(MediaError::AlreadyClaimed {
                handle: media.handle.clone(),
            });
        }
        blob.claimed = true;
        blobs.forget_pending(&media.handle);
        Ok(())
    }

    async fn release(&self, media: &MediaRef) -> Result<(), MediaError> {
        let mut blobs = self.blobs.write().await;
        if blobs.by_handle.remove(&media.handle).is_some() {
            blobs.forget_pending(&media.handle);
            tracing::info!(handle = %media.handle, "媒体已释放");
        }
        Ok(())
    }
}
