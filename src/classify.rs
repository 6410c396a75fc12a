//! File eligibility rules.
//!
//! A directory entry is indexed only when it passes, in order:
//!
//! 1. it is a regular file (symlinks are never followed),
//! 2. it is not ignored by the directory's [`IgnoreSpec`] or an exclude glob,
//! 3. its size is in `1..=max_file_bytes`,
//! 4. its first `binary_probe_bytes` contain no NUL byte,
//! 5. it has at most `max_lines` raw lines.
//!
//! Rules 1–3 only need directory-entry metadata and run during enumeration
//! ([`precheck`]). Rules 4–5 read the file and run on a worker
//! ([`crate::extract::extract_file`]).

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fmt;
use std::fs::{File, FileType};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::ignore_rules::IgnoreSpec;

/// Size and volume ceilings applied to every file.
#[derive(Debug, Clone)]
pub struct ScanLimits {
    pub max_file_bytes: u64,
    pub max_lines: usize,
    pub binary_probe_bytes: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanLimits {
    fn from(cfg: &ScanConfig) -> Self {
        Self {
            max_file_bytes: cfg.max_file_bytes,
            max_lines: cfg.max_lines,
            binary_probe_bytes: cfg.binary_probe_bytes,
        }
    }
}

/// Why an entry was not indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotRegularFile,
    Ignored,
    Empty,
    TooLarge,
    Binary,
    TooManyLines,
    NoContent,
    Unreadable,
    Vanished,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotRegularFile => "not a regular file",
            SkipReason::Ignored => "ignored",
            SkipReason::Empty => "empty",
            SkipReason::TooLarge => "too large",
            SkipReason::Binary => "binary",
            SkipReason::TooManyLines => "too many lines",
            SkipReason::NoContent => "no content",
            SkipReason::Unreadable => "unreadable",
            SkipReason::Vanished => "vanished",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the enumeration-time checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    /// Passed rules 1–3; carries the file size.
    Candidate(u64),
    Skipped(SkipReason),
}

/// Extra exclusion globs from `scan.exclude_globs`, matched against paths
/// relative to the scan root.
#[derive(Debug, Clone)]
pub struct ExcludeGlobs {
    root: PathBuf,
    set: GlobSet,
}

impl ExcludeGlobs {
    pub fn new(root: &Path, patterns: &[String]) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            root: root.to_path_buf(),
            set: builder.build()?,
        })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.set.is_match(relative)
    }
}

/// Apply rules 1–3 to a directory entry.
///
/// `file_type` and `len` must come from metadata that does not traverse
/// symlinks (`DirEntry::file_type`, `DirEntry::metadata`).
pub fn precheck(
    path: &Path,
    file_type: FileType,
    len: u64,
    spec: &IgnoreSpec,
    excludes: Option<&ExcludeGlobs>,
    limits: &ScanLimits,
) -> Precheck {
    if !file_type.is_file() {
        return Precheck::Skipped(SkipReason::NotRegularFile);
    }
    if spec.is_ignored(path, false) || excludes.is_some_and(|e| e.is_match(path)) {
        return Precheck::Skipped(SkipReason::Ignored);
    }
    if len == 0 {
        return Precheck::Skipped(SkipReason::Empty);
    }
    if len > limits.max_file_bytes {
        return Precheck::Skipped(SkipReason::TooLarge);
    }
    Precheck::Candidate(len)
}

/// Rule 4: whether the first `probe_bytes` of the file contain a NUL byte.
pub fn is_binary(path: &Path, probe_bytes: usize) -> io::Result<bool> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(probe_bytes.min(64 * 1024));
    file.take(probe_bytes as u64).read_to_end(&mut head)?;
    Ok(looks_binary(&head))
}

pub fn looks_binary(head: &[u8]) -> bool {
    head.contains(&0)
}

/// Map a read error to a skip reason, or `None` when the error is transient
/// and worth retrying.
pub fn skip_reason_for(err: &io::Error) -> Option<SkipReason> {
    match err.kind() {
        io::ErrorKind::NotFound => Some(SkipReason::Vanished),
        io::ErrorKind::PermissionDenied => Some(SkipReason::Unreadable),
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            Some(SkipReason::Unreadable)
        }
        _ => None,
    }
}
