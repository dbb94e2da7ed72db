use super::candidate::{Candidate, KeyError};
use super::checksum::{ChecksumProvider, RemoteFingerprint};
use super::classifier::{classify, ErrorClass};
use super::filter::TypeFilter;
use super::transfer::TransferError;
use crate::storage::StorageError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// 单个文件处理失败的原因
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata query for '{key}' failed ({class:?}): {source}")]
    Backend {
        key: String,
        class: ErrorClass,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// 对比结果
#[derive(Debug)]
pub enum Decision {
    /// 指纹一致
    Skip,
    /// 指纹不同或远程不存在
    Upload,
    /// 类型不在允许列表
    Reject,
    Error(ItemError),
}

/// 不带错误详情的决策类别，用于统计和进度事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Skip,
    Upload,
    Reject,
    Error,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Skip => DecisionKind::Skip,
            Decision::Upload => DecisionKind::Upload,
            Decision::Reject => DecisionKind::Reject,
            Decision::Error(_) => DecisionKind::Error,
        }
    }
}

/// 对比器：类型过滤 -> 本地指纹 -> 远程指纹 -> 决策
///
/// 相同的本地内容与远程状态总是得到相同的决策。
#[derive(Clone)]
pub struct Reconciler {
    filter: TypeFilter,
    checksums: ChecksumProvider,
}

impl Reconciler {
    pub fn new(filter: TypeFilter, checksums: ChecksumProvider) -> Self {
        Self { filter, checksums }
    }

    pub async fn decide(&self, candidate: &Candidate) -> Decision {
        if !self.filter.admits(candidate) {
            return Decision::Reject;
        }

        let local = match self.checksums.local_fingerprint(&candidate.local_path).await {
            Ok(fp) => fp,
            Err(source) => {
                return Decision::Error(ItemError::Io {
                    path: candidate.local_path.clone(),
                    source,
                })
            }
        };

        let remote = match self.checksums.remote_fingerprint(&candidate.remote_key).await {
            Ok(remote) => remote,
            Err(source) => match classify(&source) {
                ErrorClass::NeedsUpload => RemoteFingerprint::Absent,
                class => {
                    return Decision::Error(ItemError::Backend {
                        key: candidate.remote_key.clone(),
                        class,
                        source,
                    })
                }
            },
        };

        match remote {
            RemoteFingerprint::Absent => {
                debug!("远程不存在: {}", candidate.remote_key);
                Decision::Upload
            }
            ref r if r.matches(&local) => Decision::Skip,
            RemoteFingerprint::Unverifiable(ref raw) => {
                debug!("远程摘要不可比较: {} ({})", candidate.remote_key, raw);
                Decision::Upload
            }
            RemoteFingerprint::Present(ref remote_fp) => {
                debug!(
                    "指纹不同: {} (local={}, remote={})",
                    candidate.remote_key, local, remote_fp
                );
                Decision::Upload
            }
        }
    }
}
