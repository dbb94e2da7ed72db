//! 内容指纹：本地 MD5 与远程 ETag
//!
//! S3 单次 PUT 的 ETag 就是内容 MD5 的十六进制形式，所以本地和远程都统一成
//! 32 位小写十六进制字符串再比较。两边算法或编码不一致会导致所有文件都被当作已修改。

use crate::storage::{ObjectStore, StorageError};
use md5::{Digest, Md5};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// 读取文件时的分块大小
pub const CHUNK_SIZE: usize = 64 * 1024;

/// 规范化后的内容指纹（小写十六进制 MD5）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 规范化存储返回的摘要
    ///
    /// 去掉空白、弱校验前缀 `W/`、双引号，统一小写。
    /// 非 32 位十六进制（如分片上传的 `<hex>-<n>`）无法与本地 MD5 比较。
    pub fn from_store(raw: &str) -> RemoteFingerprint {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let normalized = trimmed.trim_matches('"').to_ascii_lowercase();

        if normalized.len() == 32 && normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            RemoteFingerprint::Present(Fingerprint(normalized))
        } else {
            RemoteFingerprint::Unverifiable(normalized)
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 远程指纹查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFingerprint {
    Present(Fingerprint),
    /// 对象不存在
    Absent,
    /// 对象存在，但摘要不可比较
    Unverifiable(String),
}

impl RemoteFingerprint {
    pub fn matches(&self, local: &Fingerprint) -> bool {
        matches!(self, RemoteFingerprint::Present(remote) if remote == local)
    }
}

/// 流式计算本地文件的 MD5，不会把整个文件读入内存
pub async fn local_fingerprint(path: &Path) -> std::io::Result<Fingerprint> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// 指纹提供者：本地计算 + 远程元数据查询
#[derive(Clone)]
pub struct ChecksumProvider {
    store: Arc<dyn ObjectStore>,
}

impl ChecksumProvider {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn local_fingerprint(&self, path: &Path) -> std::io::Result<Fingerprint> {
        local_fingerprint(path).await
    }

    /// 查询远程指纹，对象不存在返回 `Absent`，其他错误原样返回给分类器
    pub async fn remote_fingerprint(&self, key: &str) -> Result<RemoteFingerprint, StorageError> {
        let meta = match self.store.head(key).await? {
            Some(meta) => meta,
            None => return Ok(RemoteFingerprint::Absent),
        };

        Ok(match meta.digest {
            Some(raw) => Fingerprint::from_store(&raw),
            None => RemoteFingerprint::Unverifiable(String::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::StorageErrorKind;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    #[tokio::test]
    async fn test_local_fingerprint_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"hello").unwrap();

        let fp = local_fingerprint(&path).await.unwrap();
        assert_eq!(fp.as_str(), HELLO_MD5);
    }

    #[tokio::test]
    async fn test_local_fingerprint_stable_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.csv");
        // 跨越多个分块
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let first = local_fingerprint(&path).await.unwrap();
        let second = local_fingerprint(&path).await.unwrap();
        assert_eq!(first, second);

        let mut changed = data.clone();
        changed[CHUNK_SIZE + 1] ^= 0xff;
        std::fs::write(&path, &changed).unwrap();
        assert_ne!(local_fingerprint(&path).await.unwrap(), first);

        // 内容恢复后指纹也恢复
        std::fs::write(&path, &data).unwrap();
        assert_eq!(local_fingerprint(&path).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_local_fingerprint_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = local_fingerprint(&dir.path().join("nope.pdf")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_from_store_normalizes_quotes_and_case() {
        let local = Fingerprint(HELLO_MD5.to_string());
        for raw in [
            HELLO_MD5.to_string(),
            format!("\"{}\"", HELLO_MD5),
            format!("\"{}\"", HELLO_MD5.to_uppercase()),
            format!(" W/\"{}\" ", HELLO_MD5),
            "5D41402abc4B2A76B9719d911017C592".to_string(),
        ] {
            assert!(Fingerprint::from_store(&raw).matches(&local), "raw = {raw}");
        }
    }

    #[test]
    fn test_from_store_multipart_is_unverifiable() {
        let raw = format!("\"{}-3\"", HELLO_MD5);
        let remote = Fingerprint::from_store(&raw);
        assert_eq!(
            remote,
            RemoteFingerprint::Unverifiable(format!("{}-3", HELLO_MD5))
        );
        assert!(!remote.matches(&Fingerprint(HELLO_MD5.to_string())));
    }

    #[tokio::test]
    async fn test_remote_fingerprint() {
        let store = Arc::new(MemoryStorage::new());
        store.insert("b.csv", &format!("\"{}\"", HELLO_MD5));
        store.fail_head("broken.pdf", StorageErrorKind::PermissionDenied);
        let provider = ChecksumProvider::new(store);

        assert_eq!(
            provider.remote_fingerprint("b.csv").await.unwrap(),
            RemoteFingerprint::Present(Fingerprint(HELLO_MD5.to_string()))
        );
        assert_eq!(
            provider.remote_fingerprint("a.pdf").await.unwrap(),
            RemoteFingerprint::Absent
        );
        let err = provider.remote_fingerprint("broken.pdf").await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::PermissionDenied);
    }
}
