//! Directory tree walker: the driver of a scan.
//!
//! [`Walker::scan`] visits the tree rooted at a directory one directory at
//! a time, from an explicit work stack:
//!
//! 1. resolve the directory's [`IgnoreSpec`](crate::ignore_rules::IgnoreSpec),
//! 2. list its entries once and apply classification rules 1–3,
//! 3. extract candidate files on a bounded pool of blocking workers,
//! 4. replace the directory's scope in the index with the union of records,
//!    even when that union is empty,
//! 5. push non-ignored subdirectories (sorted) and, when enabled, purge the
//!    records of ignored ones.
//!
//! Only one directory's files are in flight at a time. Symlinks are never
//! followed, so the walk terminates on any finite tree.

use pctx_core::models::{IndexedLine, ScanScope};
use pctx_core::store::{sort_by_location, ContentIndex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::{precheck, ExcludeGlobs, Precheck, ScanLimits, SkipReason};
use crate::config::ScanConfig;
use crate::extract::{extract_file, FileOutcome};
use crate::ignore_rules::IgnoreResolver;
use crate::progress::{NoProgress, ScanProgressEvent, ScanProgressReporter};
use crate::writer::{BatchWriter, WriteStats};

/// Errors that stop a scan before any directory is written.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot access scan root {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("invalid exclude pattern: {0}")]
    InvalidExclude(String),
    #[error("content index unavailable: {0}")]
    IndexUnavailable(String),
}

/// A file that could not be read for a reason worth retrying.
#[derive(Debug, Clone, Serialize)]
pub struct TransientFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub directories_scanned: u64,
    pub files_indexed: u64,
    pub lines_written: u64,
    pub records_deleted: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
    pub failed_batches: u64,
    pub failed_deletes: u64,
    pub unreadable_dirs: u64,
    pub ignored_dirs_purged: u64,
    pub transient_failures: Vec<TransientFailure>,
}

impl ScanReport {
    pub fn files_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> u64 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    fn absorb(&mut self, stats: WriteStats) {
        self.lines_written += stats.written;
        self.records_deleted += stats.deleted;
        self.failed_batches += stats.failed_batches;
        self.failed_deletes += stats.failed_deletes;
    }
}

/// One directory's entries after rules 1–3.
#[derive(Default)]
struct Listing {
    candidates: Vec<PathBuf>,
    skipped: Vec<(PathBuf, SkipReason)>,
    subdirs: Vec<PathBuf>,
    ignored_dirs: Vec<PathBuf>,
}

pub struct Walker {
    writer: BatchWriter,
    resolver: Arc<IgnoreResolver>,
    limits: Arc<ScanLimits>,
    permits: Arc<Semaphore>,
    purge_ignored: bool,
    exclude_globs: Vec<String>,
    progress: Box<dyn ScanProgressReporter>,
}

impl Walker {
    pub fn new(index: Arc<dyn ContentIndex>, config: &ScanConfig) -> Self {
        Self {
            writer: BatchWriter::new(index, config.batch_size),
            resolver: Arc::new(IgnoreResolver::new()),
            limits: Arc::new(ScanLimits::from(config)),
            permits: Arc::new(Semaphore::new(config.effective_workers().max(1))),
            purge_ignored: config.purge_ignored,
            exclude_globs: config.exclude_globs.clone(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ScanProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn resolver(&self) -> &Arc<IgnoreResolver> {
        &self.resolver
    }

    /// Scan `root` and bring the index in line with it.
    ///
    /// Safe to re-run: every visited directory's scope is replaced, so an
    /// unchanged tree yields the same records and a changed one loses its
    /// stale lines.
    pub async fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|source| ScanError::RootInaccessible {
                path: root.to_path_buf(),
                source,
            })?;
        let meta = tokio::fs::metadata(&root)
            .await
            .map_err(|source| ScanError::RootInaccessible {
                path: root.clone(),
                source,
            })?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        let excludes = Arc::new(
            ExcludeGlobs::new(&root, &self.exclude_globs)
                .map_err(|e| ScanError::InvalidExclude(e.to_string()))?,
        );
        self.writer
            .check_available()
            .await
            .map_err(|e| ScanError::IndexUnavailable(e.to_string()))?;

        info!(
            root = %root.display(),
            batch_size = self.writer.batch_size(),
            workers = self.permits.available_permits(),
            "scan started"
        );
        let mut report = ScanReport {
            root: root.clone(),
            ..ScanReport::default()
        };

        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let listing = match self.list(&dir, &excludes).await {
                Ok(listing) => listing,
                Err(source) if dir == root => {
                    return Err(ScanError::RootInaccessible { path: root, source });
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot list directory; skipping");
                    report.unreadable_dirs += 1;
                    continue;
                }
            };

            self.scan_directory(&dir, &listing, &mut report).await;

            if self.purge_ignored && !listing.ignored_dirs.is_empty() {
                self.purge(&listing.ignored_dirs, &mut report).await;
            }

            // Reverse so the smallest name is popped first.
            stack.extend(listing.subdirs.into_iter().rev());
        }

        info!(
            root = %report.root.display(),
            directories = report.directories_scanned,
            files = report.files_indexed,
            lines = report.lines_written,
            skipped = report.files_skipped(),
            "scan finished"
        );
        Ok(report)
    }

    /// Resolve ignore rules and list `dir` on a blocking thread.
    async fn list(&self, dir: &Path, excludes: &Arc<ExcludeGlobs>) -> io::Result<Listing> {
        let resolver = self.resolver.clone();
        let excludes = excludes.clone();
        let limits = self.limits.clone();
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || list_directory(&dir, &resolver, &excludes, &limits))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
    }

    async fn scan_directory(&self, dir: &Path, listing: &Listing, report: &mut ScanReport) {
        report.directories_scanned += 1;
        for (path, reason) in &listing.skipped {
            report.skip(*reason);
            self.progress.report(ScanProgressEvent::FileSkipped {
                path,
                reason: *reason,
            });
        }

        let mut tasks = JoinSet::new();
        for path in &listing.candidates {
            let permits = self.permits.clone();
            let limits = self.limits.clone();
            let path = path.clone();
            let dir = dir.to_path_buf();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let file = path.clone();
                let outcome = tokio::task::spawn_blocking(move || extract_file(&file, &dir, &limits))
                    .await
                    .unwrap_or_else(|e| FileOutcome::Failed(io::Error::other(e)));
                (path, outcome)
            });
        }

        let mut records: Vec<IndexedLine> = Vec::new();
        let mut files = 0u64;
        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "extraction task failed");
                    continue;
                }
            };
            if self.record_outcome(path, outcome, &mut records, report) {
                files += 1;
            }
        }
        sort_by_location(&mut records);

        let scope = ScanScope::Directory(dir.to_string_lossy().into_owned());
        let stats = self.writer.replace_scope(&scope, &records).await;
        report.files_indexed += files;
        report.absorb(stats);

        self.progress.report(ScanProgressEvent::DirectoryDone {
            dir,
            files,
            lines: stats.written,
        });
    }

    /// Fold one file's outcome into the directory's records and the report.
    /// Returns `true` when the file was indexed.
    fn record_outcome(
        &self,
        path: PathBuf,
        outcome: FileOutcome,
        records: &mut Vec<IndexedLine>,
        report: &mut ScanReport,
    ) -> bool {
        match outcome {
            FileOutcome::Indexed(lines) => {
                self.progress.report(ScanProgressEvent::FileIndexed {
                    path: &path,
                    lines: lines.len(),
                });
                records.extend(lines);
                true
            }
            FileOutcome::Skipped(reason) => {
                debug!(path = %path.display(), reason = %reason, "file skipped");
                report.skip(reason);
                self.progress
                    .report(ScanProgressEvent::FileSkipped { path: &path, reason });
                false
            }
            FileOutcome::Failed(e) => {
                warn!(path = %path.display(), error = %e, "read failed; will retry next scan");
                report.transient_failures.push(TransientFailure {
                    path,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Remove records under directories that are now ignored.
    async fn purge(&self, ignored: &[PathBuf], report: &mut ScanReport) {
        let ignored = ignored.to_vec();
        let dirs = tokio::task::spawn_blocking(move || descendant_dirs(&ignored))
            .await
            .unwrap_or_default();
        if dirs.is_empty() {
            return;
        }
        let stats = self.writer.purge_directories(&dirs).await;
        if stats.deleted > 0 {
            debug!(dirs = dirs.len(), deleted = stats.deleted, "purged ignored directories");
        }
        report.ignored_dirs_purged += dirs.len() as u64;
        report.absorb(stats);
    }
}

fn list_directory(
    dir: &Path,
    resolver: &IgnoreResolver,
    excludes: &ExcludeGlobs,
    limits: &ScanLimits,
) -> io::Result<Listing> {
    let spec = resolver.resolve(dir);
    let mut listing = Listing::default();

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot stat entry");
                continue;
            }
        };

        if file_type.is_dir() {
            if spec.is_ignored(&path, true) || excludes.is_match(&path) {
                listing.ignored_dirs.push(path);
            } else {
                listing.subdirs.push(path);
            }
            continue;
        }

        let len = if file_type.is_file() {
            match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    listing.skipped.push((path, SkipReason::Vanished));
                    continue;
                }
                Err(_) => {
                    listing.skipped.push((path, SkipReason::Unreadable));
                    continue;
                }
            }
        } else {
            0
        };

        match precheck(&path, file_type, len, &spec, Some(excludes), limits) {
            Precheck::Candidate(_) => listing.candidates.push(path),
            Precheck::Skipped(reason) => listing.skipped.push((path, reason)),
        }
    }

    listing.subdirs.sort();
    listing.candidates.sort();
    Ok(listing)
}

/// Every directory at or below each of `roots`, without following symlinks.
fn descendant_dirs(roots: &[PathBuf]) -> Vec<String> {
    let mut dirs = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    dirs.push(entry.path().to_string_lossy().into_owned());
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "skipping entry during purge walk"),
            }
        }
    }
    dirs
}
