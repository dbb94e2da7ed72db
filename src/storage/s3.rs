use super::{ObjectMeta, ObjectStore, StorageError, StorageErrorKind, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::config::S3Config;
use anyhow::Result;
use async_trait::async_trait;
use opendal::{layers::TimeoutLayer, Operator};
use std::path::Path;
use std::time::Duration;

/// S3 单次 PUT 的对象大小上限
pub const MAX_SINGLE_PUT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

pub struct S3Storage {
    operator: Operator,
    name: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(&config.bucket)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);

        if let Some(ref ep) = config.endpoint {
            builder = builder.endpoint(ep);
        }

        // 超时由客户端负责，核心逻辑不设超时
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!("s3://{}", config.bucket);

        Ok(Self { operator, name })
    }
}

/// 按 opendal 的错误类别映射，不解析错误文本
fn map_error(key: &str, err: opendal::Error) -> StorageError {
    let kind = match err.kind() {
        opendal::ErrorKind::NotFound => StorageErrorKind::NotFound,
        opendal::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
        opendal::ErrorKind::RateLimited => StorageErrorKind::RateLimited,
        opendal::ErrorKind::ConfigInvalid | opendal::ErrorKind::Unsupported => {
            StorageErrorKind::InvalidConfig
        }
        _ => StorageErrorKind::Unexpected,
    };
    StorageError::new(kind, key, err.to_string()).with_temporary(err.is_temporary())
}

/// 超过单次 PUT 上限的文件直接拒绝，不读入内存
fn check_single_put_size(key: &str, len: u64) -> Result<(), StorageError> {
    if len > MAX_SINGLE_PUT_BYTES {
        return Err(StorageError::new(
            StorageErrorKind::InvalidConfig,
            key,
            format!(
                "file is {} bytes, larger than the {} byte single PUT limit",
                len, MAX_SINGLE_PUT_BYTES
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                size: meta.content_length(),
                digest: meta.etag().map(str::to_string),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_error(key, e)),
        }
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        // 单次 PUT，保证 ETag 为内容的 MD5
        let len = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?
            .len();
        check_single_put_size(key, len)?;

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?;
        self.operator
            .write(key, data)
            .await
            .map_err(|e| map_error(key, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
