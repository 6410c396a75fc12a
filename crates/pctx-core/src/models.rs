//! Core data models used throughout pctx.
//!
//! These types represent the indexed lines and the scopes and filters that
//! flow between the scanning pipeline and the content index.

use serde::Serialize;

/// One addressable unit of indexed content: a single non-empty source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedLine {
    /// Random UUID. Identity is not derived from path and line; consistency
    /// comes from replacing whole scopes.
    pub id: String,
    /// Line text with surrounding whitespace trimmed. Never empty.
    pub content: String,
    /// Absolute file path.
    pub path: String,
    /// 1-based position in the original file.
    pub line_number: u32,
    /// Absolute parent directory of `path`.
    pub dir: String,
}

/// The unit of deletion before re-insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    /// All records whose `path` equals the given file.
    Path(String),
    /// All records whose `dir` equals the given directory.
    Directory(String),
}

/// Predicate over record metadata understood by every [`ContentIndex`](crate::store::ContentIndex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    PathEq(String),
    DirEq(String),
    DirIn(Vec<String>),
}

impl MetadataFilter {
    pub fn matches(&self, line: &IndexedLine) -> bool {
        match self {
            MetadataFilter::PathEq(path) => line.path == *path,
            MetadataFilter::DirEq(dir) => line.dir == *dir,
            MetadataFilter::DirIn(dirs) => dirs.iter().any(|d| *d == line.dir),
        }
    }
}

impl From<&ScanScope> for MetadataFilter {
    fn from(scope: &ScanScope) -> Self {
        match scope {
            ScanScope::Path(path) => MetadataFilter::PathEq(path.clone()),
            ScanScope::Directory(dir) => MetadataFilter::DirEq(dir.clone()),
        }
    }
}

/// A similarity query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub line: IndexedLine,
    /// Distance reported by the index; smaller is closer.
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(path: &str, dir: &str) -> IndexedLine {
        IndexedLine {
            id: "id".to_string(),
            content: "x".to_string(),
            path: path.to_string(),
            line_number: 1,
            dir: dir.to_string(),
        }
    }

    #[test]
    fn scope_converts_to_equality_filter() {
        let by_dir = MetadataFilter::from(&ScanScope::Directory("/w/src".to_string()));
        assert!(by_dir.matches(&line("/w/src/a.rs", "/w/src")));
        assert!(!by_dir.matches(&line("/w/src/sub/a.rs", "/w/src/sub")));

        let by_path = MetadataFilter::from(&ScanScope::Path("/w/a.rs".to_string()));
        assert!(by_path.matches(&line("/w/a.rs", "/w")));
        assert!(!by_path.matches(&line("/w/b.rs", "/w")));
    }

    #[test]
    fn dir_in_is_set_membership() {
        let filter = MetadataFilter::DirIn(vec!["/a".to_string(), "/b".to_string()]);
        assert!(filter.matches(&line("/b/x", "/b")));
        assert!(!filter.matches(&line("/c/x", "/c")));
        assert!(!MetadataFilter::DirIn(Vec::new()).matches(&line("/a/x", "/a")));
    }
}
