//! 日志模块 - 控制台日志与可选的文件日志（带大小轮转）

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 日志文件名
const LOG_FILE_NAME: &str = "app.log";

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 是否启用日志记录
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// 最大日志文件大小（MB）
    pub max_size_mb: u32,
    /// 日志目录，未设置时只输出到控制台
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            max_size_mb: 5,
            dir: None,
        }
    }
}

impl LogConfig {
    /// 从环境变量加载：LOG_LEVEL、LOG_DIR、LOG_MAX_SIZE_MB、LOG_ENABLED
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            enabled: var("LOG_ENABLED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            level: var("LOG_LEVEL").unwrap_or(defaults.level),
            max_size_mb: var("LOG_MAX_SIZE_MB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size_mb),
            dir: var("LOG_DIR").map(PathBuf::from),
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 初始化日志系统
///
/// 控制台日志写到 stderr，stdout 留给运行摘要。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return Ok(());
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy()
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let file_layer = match &config.dir {
        Some(dir) => {
            let writer = SizeRotatingWriter::new(dir, config.max_size_mb)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

struct LogFile {
    writer: BufWriter<File>,
    size: u64,
}

/// 带大小限制的日志写入器，超过上限时 app.log 轮转为 app.log.old
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    state: Arc<Mutex<LogFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        Self::with_max_bytes(log_dir, (max_size_mb as u64) * 1024 * 1024)
    }

    pub fn with_max_bytes(log_dir: &Path, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let file_path = log_dir.join(LOG_FILE_NAME);

        // 启动时已超限则先轮转
        if fs::metadata(&file_path).map(|m| m.len() > max_size).unwrap_or(false) {
            Self::rotate_log(&file_path)?;
        }
        let state = Self::open_file(&file_path)?;

        Ok(Self {
            file_path,
            max_size,
            state: Arc::new(Mutex::new(state)),
        })
    }

    fn open_file(file_path: &Path) -> io::Result<LogFile> {
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        let size = file.metadata()?.len();
        Ok(LogFile {
            writer: BufWriter::new(file),
            size,
        })
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)
    }

    fn lock(&self) -> MutexGuard<'_, LogFile> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 日志写入器包装
pub struct LogWriter {
    inner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.inner.lock();
        let n = state.writer.write(buf)?;
        state.writer.flush()?;
        state.size += n as u64;

        if state.size > self.inner.max_size {
            SizeRotatingWriter::rotate_log(&self.inner.file_path)?;
            *state = SizeRotatingWriter::open_file(&self.inner.file_path)?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().writer.flush()
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.clone(),
        }
    }
}
