use super::{ObjectMeta, ObjectStore, StorageError};
use crate::core::checksum::local_fingerprint;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 以本地目录作为镜像目标
///
/// 目录没有 ETag，`head` 直接返回目标文件内容的 MD5。
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: &Path) -> Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        let name = format!("local:{}", path.display());
        Ok(Self {
            base_path: path.to_path_buf(),
            name,
        })
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        let mut full = self.base_path.clone();
        // key 统一使用 / 分隔
        for part in key.split('/').filter(|p| !p.is_empty() && *p != "." && *p != "..") {
            full.push(part);
        }
        full
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        let full_path = self.resolve_path(key);

        let metadata = match fs::metadata(&full_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_io(key, &e)),
        };

        let digest = local_fingerprint(&full_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?;

        Ok(Some(ObjectMeta {
            size: metadata.len(),
            digest: Some(digest.as_str().to_string()),
        }))
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let full_path = self.resolve_path(key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(key, &e))?;
        }

        // 使用临时文件写入，然后原子重命名
        let mut temp_name = full_path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        fs::copy(local_path, &temp_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?;
        fs::rename(&temp_path, &full_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?;

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
