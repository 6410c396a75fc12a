//! Line extraction for a single eligible file.
//!
//! Runs classification rules 4 and 5 (binary probe, raw line ceiling) and
//! turns the file's text into [`IndexedLine`] records. Invalid UTF-8 is
//! replaced with U+FFFD rather than failing. The text-to-records step is
//! [`pctx_core::lines::split_lines`].
//!
//! Every call returns a [`FileOutcome`]; nothing here aborts a scan.

use pctx_core::lines::{raw_line_count, split_lines};
use pctx_core::models::IndexedLine;
use std::io;
use std::path::Path;

use crate::classify::{is_binary, skip_reason_for, ScanLimits, SkipReason};

/// Result of reading one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Non-empty set of records for the file.
    Indexed(Vec<IndexedLine>),
    /// The file is ineligible; its lines must not be indexed.
    Skipped(SkipReason),
    /// Transient I/O failure; a later scan may succeed.
    Failed(io::Error),
}

impl FileOutcome {
    fn from_io(err: io::Error) -> Self {
        match skip_reason_for(&err) {
            Some(reason) => FileOutcome::Skipped(reason),
            None => FileOutcome::Failed(err),
        }
    }
}

/// Read `path` and produce its line records.
///
/// `dir` is stored on every record and must be the file's absolute parent.
pub fn extract_file(path: &Path, dir: &Path, limits: &ScanLimits) -> FileOutcome {
    match is_binary(path, limits.binary_probe_bytes) {
        Ok(true) => return FileOutcome::Skipped(SkipReason::Binary),
        Ok(false) => {}
        Err(e) => return FileOutcome::from_io(e),
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return FileOutcome::from_io(e),
    };
    // The file may have grown between enumeration and read.
    if bytes.len() as u64 > limits.max_file_bytes {
        return FileOutcome::Skipped(SkipReason::TooLarge);
    }
    let text = String::from_utf8_lossy(&bytes);

    if raw_line_count(&text) > limits.max_lines {
        return FileOutcome::Skipped(SkipReason::TooManyLines);
    }

    let records = split_lines(
        &path.to_string_lossy(),
        &dir.to_string_lossy(),
        &text,
    );
    if records.is_empty() {
        FileOutcome::Skipped(SkipReason::NoContent)
    } else {
        FileOutcome::Indexed(records)
    }
}

/// Records for `path`, or none when the file is unreadable, binary, over a
/// ceiling, or has no non-blank line.
pub fn extract_lines(path: &Path, limits: &ScanLimits) -> Vec<IndexedLine> {
    let dir = path.parent().unwrap_or(path);
    match extract_file(path, dir, limits) {
        FileOutcome::Indexed(records) => records,
        FileOutcome::Skipped(_) | FileOutcome::Failed(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn contents(records: &[IndexedLine]) -> Vec<(&str, u32)> {
        records
            .iter()
            .map(|r| (r.content.as_str(), r.line_number))
            .collect()
    }

    #[test]
    fn indexes_trimmed_lines_with_original_numbers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "a\n\nb\n").unwrap();

        match extract_file(&path, tmp.path(), &ScanLimits::default()) {
            FileOutcome::Indexed(records) => {
                assert_eq!(contents(&records), vec![("a", 1), ("b", 3)]);
                assert!(records
                    .iter()
                    .all(|r| r.dir == tmp.path().to_string_lossy()));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9\nok\n").unwrap();

        let records = extract_lines(&path, &ScanLimits::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "caf\u{FFFD}");
    }

    #[test]
    fn binary_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.bin");
        fs::write(&path, b"text\0more\n").unwrap();
        assert!(matches!(
            extract_file(&path, tmp.path(), &ScanLimits::default()),
            FileOutcome::Skipped(SkipReason::Binary)
        ));
    }

    #[test]
    fn too_many_raw_lines_rejects_whole_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("long.txt");
        // Three raw lines, only two of them non-blank.
        fs::write(&path, "a\n\nb\n").unwrap();
        let limits = ScanLimits {
            max_lines: 2,
            ..ScanLimits::default()
        };
        assert!(matches!(
            extract_file(&path, tmp.path(), &limits),
            FileOutcome::Skipped(SkipReason::TooManyLines)
        ));
    }

    #[test]
    fn whitespace_only_file_has_no_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        fs::write(&path, "  \n\t\n").unwrap();
        assert!(matches!(
            extract_file(&path, tmp.path(), &ScanLimits::default()),
            FileOutcome::Skipped(SkipReason::NoContent)
        ));
    }

    #[test]
    fn vanished_file_is_skipped_not_failed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.txt");
        assert!(matches!(
            extract_file(&path, tmp.path(), &ScanLimits::default()),
            FileOutcome::Skipped(SkipReason::Vanished)
        ));
        assert!(extract_lines(&path, &ScanLimits::default()).is_empty());
    }
}
