use super::reconciler::DecisionKind;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 运行统计，多个 worker 并发累加
#[derive(Debug, Default)]
pub struct RunSummary {
    total: AtomicU64,
    processed: AtomicU64,
    uploaded: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    errored: AtomicU64,
    interrupted: AtomicBool,
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySnapshot {
    pub total: u64,
    pub processed: u64,
    pub uploaded: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub errored: u64,
    pub interrupted: bool,
    /// dry-run 时 uploaded 只表示需要上传，实际没有写入
    pub dry_run: bool,
    pub start_time: i64,
    pub end_time: i64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// 每个候选文件调用一次，返回累计处理数
    pub fn record(&self, kind: DecisionKind) -> u64 {
        let counter = match kind {
            DecisionKind::Upload => &self.uploaded,
            DecisionKind::Skip => &self.skipped,
            DecisionKind::Reject => &self.rejected,
            DecisionKind::Error => &self.errored,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SummarySnapshot {
        SummarySnapshot {
            total: self.total.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            uploaded: self.uploaded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            errored: self.errored.load(Ordering::SeqCst),
            interrupted: self.interrupted.load(Ordering::SeqCst),
            dry_run: false,
            start_time: 0,
            end_time: 0,
        }
    }
}

impl SummarySnapshot {
    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).max(0)
    }
}

impl fmt::Display for SummarySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uploaded = if self.dry_run { "would upload" } else { "uploaded" };
        write!(
            f,
            "processed {}/{}, {} {}, skipped {}, rejected {}, errored {}",
            self.processed,
            self.total,
            uploaded,
            self.uploaded,
            self.skipped,
            self.rejected,
            self.errored
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
