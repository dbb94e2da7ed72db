//! 上传执行器

use super::candidate::Candidate;
use super::classifier::{classify, ErrorClass};
use crate::storage::{ObjectStore, StorageError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// 上传失败
#[derive(Error, Debug, Clone)]
#[error("upload of '{key}' failed ({class:?}): {source}")]
pub struct TransferError {
    pub key: String,
    pub class: ErrorClass,
    #[source]
    pub source: StorageError,
}

impl TransferError {
    pub fn new(key: impl Into<String>, source: StorageError) -> Self {
        Self {
            key: key.into(),
            class: classify(&source),
            source,
        }
    }
}

/// 上传配置
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// 临时错误的最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），按指数退避
    pub retry_base_delay_ms: u64,
    /// 只记录不上传
    pub dry_run: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 1000,
            dry_run: false,
        }
    }
}

/// 正在上传的 key 集合，保证同一个 key 不会被并发上传
///
/// 内部互斥锁只在登记/注销 key 时持有，不会跨越存储调用。
#[derive(Default)]
pub struct KeyLocks {
    in_flight: Mutex<HashSet<String>>,
    released: Notify,
}

pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
}

impl KeyLocks {
    pub async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        loop {
            // 先注册等待，避免错过释放通知
            let released = self.released.notified();
            {
                let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
                if set.insert(key.to_string()) {
                    return KeyGuard {
                        locks: self,
                        key: key.to_string(),
                    };
                }
            }
            debug!("等待同一 key 的上传完成: {}", key);
            released.await;
        }
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.locks.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
        drop(set);
        self.locks.released.notify_waiters();
    }
}

/// 上传执行器
pub struct TransferExecutor {
    store: Arc<dyn ObjectStore>,
    config: TransferConfig,
    locks: KeyLocks,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, config: TransferConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyLocks::default(),
        }
    }

    /// 完整上传文件到对应 key，覆盖已有对象，可安全重试
    pub async fn upload(&self, candidate: &Candidate) -> Result<(), TransferError> {
        let key = candidate.remote_key.as_str();

        if self.config.dry_run {
            info!("[dry-run] 将上传: {} -> {}", candidate.local_path.display(), key);
            return Ok(());
        }

        let _guard = self.locks.acquire(key).await;
        let max_retries = self.config.max_retries;

        let mut attempt = 0u32;
        loop {
            match self.store.put_file(key, &candidate.local_path).await {
                Ok(()) => {
                    info!("上传完成: {} -> {}", candidate.local_path.display(), key);
                    return Ok(());
                }
                Err(e) => {
                    let err = TransferError::new(key, e);
                    if err.class != ErrorClass::Transient || attempt >= max_retries {
                        error!("上传最终失败 (已重试{}次): {}", attempt, err);
                        return Err(err);
                    }

                    // 指数退避
                    let delay = self
                        .config
                        .retry_base_delay_ms
                        .saturating_mul(2_u64.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        "上传失败，{}ms 后重试 ({}/{}): {}",
                        delay, attempt, max_retries, err
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::StorageErrorKind;

    fn quick_config() -> TransferConfig {
        TransferConfig {
            max_retries: 2,
            retry_base_delay_ms: 1,
            dry_run: false,
        }
    }

    fn write_candidate(dir: &tempfile::TempDir, name: &str, key: &str) -> Candidate {
        let path = dir.path().join(name);
        std::fs::write(&path, b"hello").unwrap();
        Candidate::new(path, key.to_string())
    }

    #[tokio::test]
    async fn test_upload_writes_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new());
        let executor = TransferExecutor::new(store.clone(), quick_config());

        executor
            .upload(&write_candidate(&dir, "a.pdf", "x/a.pdf"))
            .await
            .unwrap();
        assert_eq!(store.puts(), vec!["x/a.pdf".to_string()]);
        assert_eq!(
            store.digest("x/a.pdf").as_deref(),
            Some("\"5d41402abc4b2a76b9719d911017c592\"")
        );
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new());
        store.fail_put(
            "a.pdf",
            2,
            StorageError::new(StorageErrorKind::RateLimited, "a.pdf", "slow down"),
        );
        let executor = TransferExecutor::new(store.clone(), quick_config());

        executor
            .upload(&write_candidate(&dir, "a.pdf", "a.pdf"))
            .await
            .unwrap();
        assert_eq!(store.puts().len(), 3);
    }

    #[tokio::test]
    async fn test_transient_error_gives_up_after_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new());
        store.fail_put(
            "a.pdf",
            10,
            StorageError::new(StorageErrorKind::Unavailable, "a.pdf", "503"),
        );
        let executor = TransferExecutor::new(store.clone(), quick_config());

        let err = executor
            .upload(&write_candidate(&dir, "a.pdf", "a.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.key, "a.pdf");
        assert_eq!(err.class, ErrorClass::Transient);
        assert_eq!(store.puts().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new());
        store.fail_put(
            "a.pdf",
            10,
            StorageError::new(StorageErrorKind::PermissionDenied, "a.pdf", "denied"),
        );
        let executor = TransferExecutor::new(store.clone(), quick_config());

        let err = executor
            .upload(&write_candidate(&dir, "a.pdf", "a.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Fatal);
        assert_eq!(store.puts().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new());
        let config = TransferConfig {
            dry_run: true,
            ..quick_config()
        };
        let executor = TransferExecutor::new(store.clone(), config);

        executor
            .upload(&write_candidate(&dir, "a.pdf", "a.pdf"))
            .await
            .unwrap();
        assert!(store.puts().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_never_uploads_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStorage::new().with_put_delay(Duration::from_millis(20)));
        let executor = Arc::new(TransferExecutor::new(store.clone(), quick_config()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let executor = executor.clone();
            let candidate = write_candidate(&dir, &format!("{i}.pdf"), "same.pdf");
            handles.push(tokio::spawn(async move { executor.upload(&candidate).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.puts().len(), 4);
        assert_eq!(store.max_in_flight(), 1);
    }
}
