//! 候选文件与远程 key 映射

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// 扫描得到的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub local_path: PathBuf,
    pub remote_key: String,
    /// 小写扩展名，无扩展名时为 None
    pub extension: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("{} is outside the source root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("{} is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },

    #[error("{} maps to an empty key", path.display())]
    Empty { path: PathBuf },
}

/// 可选的 key 改写（例如按数据集命名规则重命名），默认不改写
pub trait PathTranslator: Send + Sync {
    fn translate(&self, key: String) -> String;
}

/// 不做改写
pub struct IdentityTranslator;

impl PathTranslator for IdentityTranslator {
    fn translate(&self, key: String) -> String {
        key
    }
}

/// 本地路径 -> 远程 key
///
/// 按路径组件去掉源根目录前缀（而不是固定字符偏移），剩余组件用 `/` 连接，
/// 再加上可选的 key 前缀。
#[derive(Debug, Clone)]
pub struct RemoteKeyMapper {
    root: PathBuf,
    prefix: Option<String>,
}

impl RemoteKeyMapper {
    pub fn new(root: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            root: root.into(),
            prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn to_remote_key(&self, path: &Path) -> Result<String, KeyError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| KeyError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })?;

        let mut parts: Vec<&str> = Vec::new();
        if let Some(prefix) = &self.prefix {
            parts.push(prefix.as_str());
        }
        let mut has_name = false;
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| KeyError::NotUtf8 {
                        path: path.to_path_buf(),
                    })?;
                    parts.push(name);
                    has_name = true;
                }
                Component::CurDir => {}
                _ => {
                    return Err(KeyError::OutsideRoot {
                        path: path.to_path_buf(),
                        root: self.root.clone(),
                    })
                }
            }
        }

        if !has_name {
            return Err(KeyError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(parts.join("/"))
    }
}

impl Candidate {
    pub fn new(local_path: PathBuf, remote_key: String) -> Self {
        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        Self {
            local_path,
            remote_key,
            extension,
        }
    }
}
