pub mod candidate;
pub mod checksum;
pub mod classifier;
pub mod engine;
pub mod filter;
pub mod progress;
pub mod reconciler;
pub mod scanner;
pub mod summary;
pub mod transfer;

pub use candidate::{Candidate, IdentityTranslator, KeyError, PathTranslator, RemoteKeyMapper};
pub use checksum::{local_fingerprint, ChecksumProvider, Fingerprint, RemoteFingerprint};
pub use classifier::{classify, ErrorClass};
pub use engine::{SyncConfig, SyncEngine};
pub use filter::TypeFilter;
pub use progress::{ChannelProgress, NoProgress, ProgressEvent, ProgressMessage, ProgressSink};
pub use reconciler::{Decision, DecisionKind, ItemError, Reconciler};
pub use summary::{RunSummary, SummarySnapshot};
pub use transfer::{TransferConfig, TransferError, TransferExecutor};
