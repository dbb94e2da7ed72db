pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{ConfigLayer, MirrorConfig, S3Config, TargetConfig};
pub use core::{Decision, SummarySnapshot, SyncConfig, SyncEngine};
pub use error::SetupError;
pub use storage::{ObjectStore, StorageError, StorageErrorKind};
