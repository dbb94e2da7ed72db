use super::reconciler::DecisionKind;
use serde::Serialize;
use tokio::sync::mpsc;

/// 单个候选文件处理完成的事件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub key: String,
    pub decision: DecisionKind,
    /// 含本次在内已处理的数量
    pub completed: u64,
    pub total: u64,
}

/// 进度接收者
///
/// `start` 在处理前调用一次，之后每个候选文件（上传、跳过、拒绝、失败）各调用一次 `advance`。
pub trait ProgressSink: Send + Sync {
    fn start(&self, total: u64);
    fn advance(&self, event: &ProgressEvent);
}

/// 丢弃所有事件
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total: u64) {}
    fn advance(&self, _event: &ProgressEvent) {}
}

/// 进度消息
#[derive(Debug, Clone)]
pub enum ProgressMessage {
    Started { total: u64 },
    Advanced(ProgressEvent),
}

/// 通过 channel 转发进度，由调用方负责渲染
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn start(&self, total: u64) {
        let _ = self.tx.send(ProgressMessage::Started { total });
    }

    fn advance(&self, event: &ProgressEvent) {
        let _ = self.tx.send(ProgressMessage::Advanced(event.clone()));
    }
}
