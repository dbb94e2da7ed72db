use clap::Parser;
use dotenv::dotenv;
use mirrorsync_lib::core::{ChannelProgress, ProgressMessage};
use mirrorsync_lib::logging::{init_logging, LogConfig};
use mirrorsync_lib::{ConfigLayer, SetupError, SummarySnapshot, SyncEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// 将本地目录单向镜像到对象存储，只上传内容有变化的文件
///
/// S3 目标使用单次 PUT 上传，单个文件不能超过 5 GiB。
#[derive(Parser, Debug)]
#[command(name = "mirrorsync", version, about)]
struct Cli {
    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 本地源目录（SOURCE_DIR）
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// 目标 bucket（BUCKET）
    #[arg(long)]
    bucket: Option<String>,

    /// 区域（REGION_NAME）
    #[arg(long)]
    region: Option<String>,

    /// 自定义 S3 endpoint（S3_ENDPOINT）
    #[arg(long)]
    endpoint: Option<String>,

    /// 远程 key 前缀（KEY_PREFIX）
    #[arg(long)]
    key_prefix: Option<String>,

    /// 以本地目录作为目标，代替 S3（TARGET_DIR）
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// 允许的扩展名，逗号分隔（ALLOWED_EXTENSIONS）
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// 最大并发数（MAX_CONCURRENT）
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// 临时错误最大重试次数（MAX_RETRIES）
    #[arg(long)]
    max_retries: Option<u32>,

    /// 只对比不上传
    #[arg(long)]
    dry_run: bool,

    /// 以 JSON 输出运行摘要
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            source_dir: self.source_dir.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            key_prefix: self.key_prefix.clone(),
            target_dir: self.target_dir.clone(),
            allowed_extensions: self.extensions.clone(),
            max_concurrent: self.max_concurrent,
            max_retries: self.max_retries,
            dry_run: self.dry_run.then_some(true),
            ..Default::default()
        }
    }
}

async fn run(cli: &Cli) -> Result<SummarySnapshot, SetupError> {
    let file_layer = match &cli.config {
        Some(path) => ConfigLayer::from_file(path)?,
        None => ConfigLayer::default(),
    };
    let config = file_layer
        .merge(ConfigLayer::from_env()?)
        .merge(cli.layer())
        .resolve()?;

    let store = mirrorsync_lib::storage::create_storage(&config.target)
        .await
        .map_err(|e| SetupError::Storage(e.to_string()))?;

    let (progress, mut progress_rx) = ChannelProgress::new();
    let renderer = tokio::spawn(async move {
        while let Some(msg) = progress_rx.recv().await {
            match msg {
                ProgressMessage::Started { total } => info!("共 {} 个文件", total),
                ProgressMessage::Advanced(e) => {
                    info!("[{}/{}] {:?}: {}", e.completed, e.total, e.decision, e.key)
                }
            }
        }
    });

    let engine = SyncEngine::new(store, config.sync_config()).with_progress(Arc::new(progress));

    let token = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = engine.run().await;
    drop(engine);
    let _ = renderer.await;
    result
}

fn print_summary(summary: &SummarySnapshot, json: bool) {
    if summary.interrupted {
        println!("Exiting");
    }
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("序列化摘要失败: {}", e),
        }
    } else {
        println!("{} ({}s)", summary, summary.duration_secs());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(summary) => {
            print_summary(&summary, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("启动失败: {}", e);
            eprintln!("mirrorsync: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_layer() {
        let cli = Cli::parse_from([
            "mirrorsync",
            "--source-dir",
            "/data",
            "--extensions",
            "pdf,xlsx",
            "--dry-run",
        ]);
        let layer = cli.layer();
        assert_eq!(layer.source_dir, Some(PathBuf::from("/data")));
        assert_eq!(
            layer.allowed_extensions,
            Some(vec!["pdf".to_string(), "xlsx".to_string()])
        );
        assert_eq!(layer.dry_run, Some(true));
        assert_eq!(layer.bucket, None);
    }

    #[test]
    fn test_cli_without_dry_run_does_not_override() {
        let cli = Cli::parse_from(["mirrorsync"]);
        assert_eq!(cli.layer().dry_run, None);
    }
}
