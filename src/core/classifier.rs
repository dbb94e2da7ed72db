use crate::storage::{StorageError, StorageErrorKind};
use serde::Serialize;

/// 存储错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// 远程不存在，按需要上传处理
    NeedsUpload,
    /// 可重试
    Transient,
    /// 放弃当前文件，继续下一个
    Fatal,
}

/// 只根据后端给出的错误类别判定，不做文本匹配
pub fn classify(error: &StorageError) -> ErrorClass {
    match error.kind {
        StorageErrorKind::NotFound => ErrorClass::NeedsUpload,
        StorageErrorKind::RateLimited | StorageErrorKind::Unavailable => ErrorClass::Transient,
        _ if error.temporary => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_needs_upload() {
        let err = StorageError::not_found("a.pdf");
        assert_eq!(classify(&err), ErrorClass::NeedsUpload);
    }

    #[test]
    fn test_transient_kinds() {
        for kind in [StorageErrorKind::RateLimited, StorageErrorKind::Unavailable] {
            assert_eq!(classify(&StorageError::new(kind, "k", "x")), ErrorClass::Transient);
        }
        let err = StorageError::new(StorageErrorKind::Unexpected, "k", "reset").with_temporary(true);
        assert_eq!(classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_message_text_is_ignored() {
        let err = StorageError::new(StorageErrorKind::Unexpected, "k", "404 NoSuchKey");
        assert_eq!(classify(&err), ErrorClass::Fatal);
        let err = StorageError::new(StorageErrorKind::PermissionDenied, "k", "NotFound");
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }
}
