use crate::core::candidate::{Candidate, IdentityTranslator, PathTranslator, RemoteKeyMapper};
use crate::core::checksum::ChecksumProvider;
use crate::core::filter::TypeFilter;
use crate::core::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::core::reconciler::{Decision, Reconciler};
use crate::core::scanner;
use crate::core::summary::{RunSummary, SummarySnapshot};
use crate::core::transfer::{TransferConfig, TransferExecutor};
use crate::error::SetupError;
use crate::storage::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 扫描结果 channel 容量
const WALK_CHANNEL_CAPACITY: usize = 256;

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 本地源目录
    pub source_root: PathBuf,
    /// 远程 key 前缀
    pub key_prefix: Option<String>,
    /// 允许的扩展名
    pub allowed_extensions: Vec<String>,
    /// 最大并发处理数，1 表示顺序处理
    pub max_concurrent: usize,
    pub transfer: TransferConfig,
}

impl SyncConfig {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            key_prefix: None,
            allowed_extensions: crate::core::filter::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_concurrent: 4,
            transfer: TransferConfig::default(),
        }
    }
}

/// 每个候选文件共享的处理上下文
struct Worker {
    mapper: RemoteKeyMapper,
    translator: Arc<dyn PathTranslator>,
    reconciler: Reconciler,
    executor: TransferExecutor,
    summary: Arc<RunSummary>,
    progress: Arc<dyn ProgressSink>,
}

impl Worker {
    async fn process(&self, path: PathBuf) {
        let (key, decision) = match self.mapper.to_remote_key(&path) {
            Ok(key) => {
                let candidate = Candidate::new(path, self.translator.translate(key));
                let decision = match self.reconciler.decide(&candidate).await {
                    Decision::Upload => match self.executor.upload(&candidate).await {
                        Ok(()) => Decision::Upload,
                        Err(e) => Decision::Error(e.into()),
                    },
                    other => other,
                };
                (candidate.remote_key, decision)
            }
            Err(e) => (path.display().to_string(), Decision::Error(e.into())),
        };

        match &decision {
            Decision::Error(e) => warn!("处理失败: {}", e),
            Decision::Skip => debug!("指纹一致，跳过: {}", key),
            Decision::Reject => debug!("类型不匹配，忽略: {}", key),
            Decision::Upload => {}
        }

        let kind = decision.kind();
        let completed = self.summary.record(kind);
        self.progress.advance(&ProgressEvent {
            key,
            decision: kind,
            completed,
            total: self.summary.total(),
        });
    }
}

/// 同步引擎：遍历本地目录，逐个对比并上传
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn ObjectStore>,
    progress: Arc<dyn ProgressSink>,
    translator: Arc<dyn PathTranslator>,
    cancelled: CancellationToken,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: SyncConfig) -> Self {
        Self {
            config,
            store,
            progress: Arc::new(NoProgress),
            translator: Arc::new(IdentityTranslator),
            cancelled: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn PathTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// 取消令牌，用于外部中断
    ///
    /// 令牌不会重置：取消之后这个引擎的每次 `run` 都立即返回 interrupted，
    /// 需要重新运行时构造新的引擎。
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancelled.clone()
    }

    /// 取消同步
    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    fn check_root(&self) -> Result<(), SetupError> {
        let root = &self.config.source_root;
        match std::fs::metadata(root) {
            Ok(m) if m.is_dir() => Ok(()),
            Ok(_) => Err(SetupError::SourceRoot {
                path: root.clone(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(SetupError::SourceRoot {
                path: root.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// 运行一次同步
    ///
    /// 只有启动阶段的错误会返回 Err，单个文件的失败计入统计后继续。
    pub async fn run(&self) -> Result<SummarySnapshot, SetupError> {
        let start_time = chrono::Utc::now().timestamp();
        self.check_root()?;

        let root = self.config.source_root.clone();
        info!("开始同步: {} -> {}", root.display(), self.store.name());

        let summary = Arc::new(RunSummary::new());

        // 预扫描计数
        let count_root = root.clone();
        let count_cancel = self.cancelled.clone();
        let total = tokio::select! {
            biased;
            _ = self.cancelled.cancelled() => None,
            counted = tokio::task::spawn_blocking(move || {
                scanner::count(&count_root, count_cancel)
            }) => {
                Some(counted.map_err(|e| SetupError::Scan(e.to_string()))?)
            }
        };
        let Some(total) = total else {
            summary.mark_interrupted();
            return Ok(self.finish(&summary, start_time));
        };

        info!("预扫描完成: {} 个文件", total);
        summary.set_total(total);
        self.progress.start(total);

        let worker = Arc::new(Worker {
            mapper: RemoteKeyMapper::new(root.clone(), self.config.key_prefix.clone()),
            translator: self.translator.clone(),
            reconciler: Reconciler::new(
                TypeFilter::new(&self.config.allowed_extensions),
                ChecksumProvider::new(self.store.clone()),
            ),
            executor: TransferExecutor::new(self.store.clone(), self.config.transfer.clone()),
            summary: summary.clone(),
            progress: self.progress.clone(),
        });

        // 正式扫描，与预扫描使用同一遍历
        let (tx, mut rx) = mpsc::channel::<PathBuf>(WALK_CHANNEL_CAPACITY);
        let walk_cancel = self.cancelled.clone();
        let walker = tokio::task::spawn_blocking(move || {
            for path in scanner::walk(&root, walk_cancel) {
                if tx.blocking_send(path).is_err() {
                    break;
                }
            }
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        loop {
            let path = tokio::select! {
                biased;
                _ = self.cancelled.cancelled() => break,
                path = rx.recv() => match path {
                    Some(p) => p,
                    None => break,
                },
            };

            let permit = tokio::select! {
                biased;
                _ = self.cancelled.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let worker = worker.clone();
            let cancelled = self.cancelled.clone();
            tasks.spawn(async move {
                // 中断时放弃进行中的文件，上传可在下次运行时重新进行
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {}
                    _ = worker.process(path) => {}
                }
                drop(permit);
            });

            // 回收已完成的任务
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("处理任务异常退出: {}", e);
                }
            }
        }

        drop(rx);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("处理任务异常退出: {}", e);
            }
        }
        if let Err(e) = walker.await {
            warn!("目录遍历任务异常退出: {}", e);
        }

        if self.cancelled.is_cancelled() {
            summary.mark_interrupted();
        }

        let snapshot = self.finish(&summary, start_time);
        info!("同步结束: {}", snapshot);
        Ok(snapshot)
    }

    fn finish(&self, summary: &RunSummary, start_time: i64) -> SummarySnapshot {
        let mut snapshot = summary.snapshot();
        snapshot.dry_run = self.config.transfer.dry_run;
        snapshot.start_time = start_time;
        snapshot.end_time = chrono::Utc::now().timestamp();
        snapshot
    }
}
