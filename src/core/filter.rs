use super::candidate::Candidate;
use std::collections::HashSet;

/// 默认允许的扩展名
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "csv"];

/// 文件类型过滤器，只放行扩展名在允许集合内的文件
#[derive(Debug, Clone)]
pub struct TypeFilter {
    allowed: HashSet<String>,
}

impl TypeFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn admits(&self, candidate: &Candidate) -> bool {
        candidate
            .extension
            .as_ref()
            .is_some_and(|ext| self.allowed.contains(ext))
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl Default for TypeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn candidate(name: &str) -> Candidate {
        Candidate::new(PathBuf::from("/root").join(name), name.to_string())
    }

    #[test]
    fn test_default_allows_pdf_and_csv() {
        let filter = TypeFilter::default();
        assert!(filter.admits(&candidate("a.pdf")));
        assert!(filter.admits(&candidate("b.CSV")));
        assert!(!filter.admits(&candidate("c.txt")));
        assert!(!filter.admits(&candidate("Makefile")));
        // 只看最后一个扩展名
        assert!(!filter.admits(&candidate("d.pdf.bak")));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let filter = TypeFilter::new([".XLSX", " docx ", ""]);
        assert!(filter.admits(&candidate("report.xlsx")));
        assert!(filter.admits(&candidate("letter.docx")));
        assert!(!filter.admits(&candidate("a.pdf")));
    }

    #[test]
    fn test_empty_filter_rejects_everything() {
        let filter = TypeFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(!filter.admits(&candidate("a.pdf")));
    }
}
