//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 商品分页策略
//! - 事件广播容量
//! - 媒体上传限制
//!
//! 加载优先级：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，`__` 分隔层级）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 默认允许上传的媒体类型
pub const DEFAULT_ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "audio/mpeg",
    "audio/wav",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 商品列表配置
    #[validate(nested)]
    pub listings: ListingConfig,
    /// 广播器配置
    #[validate(nested)]
    pub broadcast: BroadcastConfig,
    /// 媒体存储配置
    #[validate(nested)]
    pub media: MediaConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 分页模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// 基于偏移量：并发插入时可能出现重复或遗漏
    #[default]
    Offset,
    /// 基于最后看到的商品 ID：不受并发插入影响
    Cursor,
}

/// 商品列表配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListingConfig {
    /// 默认页大小，同时用于连接建立时的初始快照
    #[validate(range(min = 1))]
    pub page_size: usize,
    #[validate(range(min = 1))]
    pub max_page_size: usize,
    #[serde(default)]
    pub pagination_mode: PaginationMode,
}

/// 广播器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BroadcastConfig {
    /// 单个连接最多可积压的事件数，超出部分会被丢弃
    #[validate(range(min = 1))]
    pub capacity: usize,
}

/// 媒体存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MediaConfig {
    #[validate(range(min = 1))]
    pub max_bytes: usize,
    #[validate(length(min = 1))]
    pub allowed_types: Vec<String>,
    /// 尚未被任何商品引用的上传最多保留多少个，超出时回收最早的
    #[validate(range(min = 1))]
    pub max_pending_uploads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            listings: ListingConfig::default(),
            broadcast: BroadcastConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3002,
            cors_origins: vec!["*".into()],
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            max_page_size: 100,
            pagination_mode: PaginationMode::Offset,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_types: DEFAULT_ALLOWED_MEDIA_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            max_pending_uploads: 64,
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的优先级加载配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 组装配置来源，便于测试中替换环境
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = fig.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        Validate::validate(self)?;

        if self.listings.page_size > self.listings.max_page_size {
            return Err(ConfigError::InvalidListingConfig(format!(
                "page_size {} exceeds max_page_size {}",
                self.listings.page_size, self.listings.max_page_size
            )));
        }

        if self
            .media
            .allowed_types
            .iter()
            .any(|t| !t.contains('/') || t.trim() != t)
        {
            return Err(ConfigError::InvalidMediaConfig(
                "allowed_types must be MIME types like `image/png`".to_string(),
            ));
        }

        Ok(())
    }

    /// 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid listing configuration: {0}")]
    InvalidListingConfig(String),
    #[error("invalid media configuration: {0}")]
    InvalidMediaConfig(String),
}
