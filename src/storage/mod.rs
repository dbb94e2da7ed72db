pub mod local;
#[cfg(test)]
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use local::LocalStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程对象元数据（head 的结果）
#[derive(Debug, Clone, Default)]
pub struct ObjectMeta {
    pub size: u64,
    /// 存储返回的原始摘要（例如 S3 的 ETag，可能带引号），未经规范化
    pub digest: Option<String>,
}

/// 存储错误类别，由各后端从自身的状态码映射而来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    PermissionDenied,
    RateLimited,
    Unavailable,
    InvalidConfig,
    Io,
    Unexpected,
}

/// 存储操作错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?} on '{key}': {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub key: String,
    pub message: String,
    /// 后端标记的临时性错误（可重试）
    pub temporary: bool,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            message: message.into(),
            temporary: false,
        }
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, key, "object not found")
    }

    /// 本地 IO 错误按 io::ErrorKind 归类
    pub fn from_io(key: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted => {
                StorageErrorKind::Unavailable
            }
            _ => StorageErrorKind::Io,
        };
        Self::new(kind, key, err.to_string())
    }
}

/// 对象存储能力接口
///
/// 实例在启动时构造一次，以 `Arc<dyn ObjectStore>` 传给引擎及其协作者。
/// 任何调用都可能长时间阻塞，超时由具体后端负责。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 获取对象元数据，不存在时返回 `Ok(None)`
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    /// 上传本地文件的完整内容，覆盖已有对象
    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StorageError>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例
pub async fn create_storage(
    target: &crate::config::TargetConfig,
) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match target {
        crate::config::TargetConfig::Local { path } => {
            tracing::info!("初始化本地目标存储: {}", path.display());
            Ok(Arc::new(LocalStorage::new(path)?) as Arc<dyn ObjectStore>)
        }
        crate::config::TargetConfig::S3(s3) => {
            tracing::info!("初始化S3存储: bucket={}, region={}", s3.bucket, s3.region);
            Ok(Arc::new(S3Storage::new(s3)?) as Arc<dyn ObjectStore>)
        }
    }
}
