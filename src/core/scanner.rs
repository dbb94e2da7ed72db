use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

/// 唯一的目录遍历入口
///
/// 预扫描计数和正式处理都必须经过这里，否则进度总数与实际处理数会对不上。
/// 不跟随符号链接，只产出文件，无法读取的条目被跳过。
/// 取消后遍历在下一个条目（包括目录）处停止。
pub fn walk(root: &Path, cancelled: CancellationToken) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .take_while(move |_| !cancelled.is_cancelled())
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("跳过无法访问的条目: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

/// 预扫描：统计候选文件总数
pub fn count(root: &Path, cancelled: CancellationToken) -> u64 {
    walk(root, cancelled).count() as u64
}
