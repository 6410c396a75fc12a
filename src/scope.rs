//! Query-time scope: the non-ignored directories under a root.
//!
//! Searches are restricted to records whose `dir` is in
//! [`allowed_directories`], so nothing indexed under a directory that is
//! now ignored (or outside the root) shows up in results.

use anyhow::{bail, Context, Result};
use pctx_core::models::MetadataFilter;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::ignore_rules::IgnoreResolver;

/// File name tested inside each candidate directory. A directory counts as
/// ignored when a file inside it would be.
const PROBE_NAME: &str = "__pctx_scope_probe__";

/// `root` and every descendant directory not excluded by ignore rules.
///
/// Descent stops at ignored directories and symlinks are not followed.
pub fn allowed_directories(root: &Path, resolver: &IgnoreResolver) -> Result<BTreeSet<PathBuf>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot access {}", root.display()))?;
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let mut allowed = BTreeSet::new();
    let mut walker = WalkDir::new(&root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let spec_dir = if dir == root {
            root.as_path()
        } else {
            dir.parent().unwrap_or(&root)
        };
        let spec = resolver.resolve(spec_dir);
        if spec.is_ignored(&dir.join(PROBE_NAME), false) {
            walker.skip_current_dir();
            continue;
        }
        allowed.insert(dir.to_path_buf());
    }
    Ok(allowed)
}

/// [`allowed_directories`] as an index filter.
pub fn scope_filter(root: &Path, resolver: &IgnoreResolver) -> Result<MetadataFilter> {
    let dirs = allowed_directories(root, resolver)?;
    Ok(MetadataFilter::DirIn(
        dirs.into_iter()
            .map(|d| d.to_string_lossy().into_owned())
            .collect(),
    ))
}
