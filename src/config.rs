//! 运行配置
//!
//! 来源按优先级从低到高：JSON 配置文件、环境变量、命令行参数。
//! 合并后解析成 [`MirrorConfig`]，核心逻辑只接收解析好的配置。

use crate::core::engine::SyncConfig;
use crate::core::filter::DEFAULT_EXTENSIONS;
use crate::core::transfer::TransferConfig;
use crate::error::SetupError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// S3 连接参数，原样传给客户端构造
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

/// 镜像目标
#[derive(Debug, Clone)]
pub enum TargetConfig {
    S3(S3Config),
    /// 本地目录作为目标
    Local { path: PathBuf },
}

/// 解析完成的配置
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub source_root: PathBuf,
    pub target: TargetConfig,
    pub key_prefix: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub dry_run: bool,
}

impl MirrorConfig {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            source_root: self.source_root.clone(),
            key_prefix: self.key_prefix.clone(),
            allowed_extensions: self.allowed_extensions.clone(),
            max_concurrent: self.max_concurrent,
            transfer: TransferConfig {
                max_retries: self.max_retries,
                retry_base_delay_ms: self.retry_base_delay_ms,
                dry_run: self.dry_run,
            },
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

/// 未解析的配置片段，每个来源产生一份，后者覆盖前者
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    pub source_dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub key_prefix: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub allowed_extensions: Option<Vec<String>>,
    pub max_concurrent: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub dry_run: Option<bool>,
}

impl ConfigLayer {
    /// 从 JSON 文件加载
    pub fn from_file(path: &Path) -> Result<Self, SetupError> {
        let content = fs::read_to_string(path).map_err(|e| SetupError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| SetupError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// 从进程环境变量加载
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// 从任意变量来源加载，空值视为未设置
    pub fn from_vars<F>(get: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            source_dir: var("SOURCE_DIR").map(PathBuf::from),
            bucket: var("BUCKET"),
            region: var("REGION_NAME"),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            endpoint: var("S3_ENDPOINT"),
            key_prefix: var("KEY_PREFIX"),
            target_dir: var("TARGET_DIR").map(PathBuf::from),
            allowed_extensions: var("ALLOWED_EXTENSIONS").map(|v| split_list(&v)),
            max_concurrent: parse_var("MAX_CONCURRENT", var("MAX_CONCURRENT"))?,
            max_retries: parse_var("MAX_RETRIES", var("MAX_RETRIES"))?,
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", var("RETRY_BASE_DELAY_MS"))?,
            dry_run: parse_var("DRY_RUN", var("DRY_RUN"))?,
        })
    }

    /// 用 `other` 中已设置的字段覆盖当前值
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            source_dir: other.source_dir.or(self.source_dir),
            bucket: other.bucket.or(self.bucket),
            region: other.region.or(self.region),
            access_key_id: other.access_key_id.or(self.access_key_id),
            secret_access_key: other.secret_access_key.or(self.secret_access_key),
            endpoint: other.endpoint.or(self.endpoint),
            key_prefix: other.key_prefix.or(self.key_prefix),
            target_dir: other.target_dir.or(self.target_dir),
            allowed_extensions: other.allowed_extensions.or(self.allowed_extensions),
            max_concurrent: other.max_concurrent.or(self.max_concurrent),
            max_retries: other.max_retries.or(self.max_retries),
            retry_base_delay_ms: other.retry_base_delay_ms.or(self.retry_base_delay_ms),
            dry_run: other.dry_run.or(self.dry_run),
        }
    }

    /// 校验并生成最终配置
    pub fn resolve(self) -> Result<MirrorConfig, SetupError> {
        let source_root = self
            .source_dir
            .ok_or(SetupError::MissingOption { name: "SOURCE_DIR" })?;
        if !source_root.is_dir() {
            return Err(SetupError::SourceRoot {
                reason: if source_root.exists() {
                    "not a directory".to_string()
                } else {
                    "does not exist".to_string()
                },
                path: source_root,
            });
        }

        let target = match self.target_dir {
            Some(path) => TargetConfig::Local { path },
            None => TargetConfig::S3(S3Config {
                bucket: self.bucket.ok_or(SetupError::MissingOption { name: "BUCKET" })?,
                region: self
                    .region
                    .ok_or(SetupError::MissingOption { name: "REGION_NAME" })?,
                access_key_id: self.access_key_id.ok_or(SetupError::MissingOption {
                    name: "AWS_ACCESS_KEY_ID",
                })?,
                secret_access_key: self.secret_access_key.ok_or(SetupError::MissingOption {
                    name: "AWS_SECRET_ACCESS_KEY",
                })?,
                endpoint: self.endpoint,
            }),
        };

        let allowed_extensions = self
            .allowed_extensions
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
        if allowed_extensions.iter().all(|e| e.trim().trim_start_matches('.').is_empty()) {
            return Err(SetupError::InvalidOption {
                name: "ALLOWED_EXTENSIONS",
                message: "at least one extension is required".to_string(),
            });
        }

        let max_concurrent = self.max_concurrent.unwrap_or_else(default_max_concurrent);
        if max_concurrent == 0 {
            return Err(SetupError::InvalidOption {
                name: "MAX_CONCURRENT",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(MirrorConfig {
            source_root,
            target,
            key_prefix: self.key_prefix,
            allowed_extensions,
            max_concurrent,
            max_retries: self.max_retries.unwrap_or_else(default_max_retries),
            retry_base_delay_ms: self
                .retry_base_delay_ms
                .unwrap_or_else(default_retry_base_delay_ms),
            dry_run: self.dry_run.unwrap_or(false),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, SetupError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| SetupError::InvalidOption {
                name,
                message: format!("'{}': {}", v, e),
            })
        })
        .transpose()
}
