//! 内存对象存储，仅用于测试

use super::{ObjectMeta, ObjectStore, StorageError, StorageErrorKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    objects: HashMap<String, (u64, String)>,
    head_failures: HashMap<String, StorageError>,
    /// key -> (剩余失败次数, 错误)
    put_failures: HashMap<String, (usize, StorageError)>,
    heads: Vec<String>,
    puts: Vec<String>,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
    put_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// 预置对象，digest 为存储原样返回的字符串
    pub fn insert(&self, key: &str, digest: &str) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (0, digest.to_string()));
    }

    pub fn fail_head(&self, key: &str, kind: StorageErrorKind) {
        self.inner
            .lock()
            .unwrap()
            .head_failures
            .insert(key.to_string(), StorageError::new(kind, key, "injected"));
    }

    pub fn fail_put(&self, key: &str, times: usize, error: StorageError) {
        self.inner
            .lock()
            .unwrap()
            .put_failures
            .insert(key.to_string(), (times, error));
    }

    pub fn digest(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().objects.get(key).map(|(_, d)| d.clone())
    }

    pub fn heads(&self) -> Vec<String> {
        self.inner.lock().unwrap().heads.clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.inner.lock().unwrap().puts.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.heads.push(key.to_string());
        if let Some(err) = inner.head_failures.get(key) {
            return Err(err.clone());
        }
        Ok(inner.objects.get(key).map(|(size, digest)| ObjectMeta {
            size: *size,
            digest: Some(digest.clone()),
        }))
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.record_put(key, local_path).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl MemoryStorage {
    async fn record_put(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.puts.push(key.to_string());
            if let Some((remaining, err)) = inner.put_failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(err.clone());
                }
            }
        }
        let digest = crate::core::checksum::local_fingerprint(local_path)
            .await
            .map_err(|e| StorageError::from_io(key, &e))?;
        let size = std::fs::metadata(local_path).map(|m| m.len()).unwrap_or(0);
        // 模拟 S3：ETag 带双引号
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (size, format!("\"{}\"", digest.as_str())));
        Ok(())
    }
}
