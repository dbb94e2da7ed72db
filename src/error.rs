//! 启动阶段错误，处理任何文件之前发生，直接终止运行

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("missing required option {name}")]
    MissingOption { name: &'static str },

    #[error("invalid value for {name}: {message}")]
    InvalidOption { name: &'static str, message: String },

    #[error("source root {} is not usable: {reason}", path.display())]
    SourceRoot { path: PathBuf, reason: String },

    #[error("failed to read config file {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    #[error("failed to create storage client: {0}")]
    Storage(String),

    #[error("directory scan aborted: {0}")]
    Scan(String),
}
