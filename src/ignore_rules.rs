//! Hierarchical `.gitignore` resolution.
//!
//! [`IgnoreResolver::resolve`] builds an [`IgnoreSpec`] for a directory
//! from its own `.gitignore` and every ancestor's, the way git does:
//! each file's patterns are anchored at the directory holding it, and a
//! deeper file wins over a shallower one. Two implicit patterns,
//! `.gitignore` and `.git/`, apply everywhere with the lowest precedence.
//!
//! Resolved specs and raw pattern lists are cached per absolute directory
//! for the lifetime of the resolver. Nothing watches the filesystem; call
//! [`IgnoreResolver::invalidate`] or [`IgnoreResolver::clear`] after
//! editing ignore files in a long-running process.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

const IGNORE_FILE: &str = ".gitignore";
const IMPLICIT_PATTERNS: [&str; 2] = [".gitignore", ".git/"];

/// Patterns of one `.gitignore`, anchored at the directory that holds it.
struct IgnoreLevel {
    dir: PathBuf,
    matcher: Gitignore,
}

/// Merged ignore rules for one directory.
///
/// Levels are stored innermost first; the first level with an opinion on a
/// path decides it.
pub struct IgnoreSpec {
    levels: Vec<Arc<IgnoreLevel>>,
}

impl IgnoreSpec {
    /// Whether `path` is ignored. `path` must be absolute and lie inside the
    /// directory this spec was resolved for.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        for level in &self.levels {
            if !path.starts_with(&level.dir) {
                continue;
            }
            match level.matcher.matched_path_or_any_parents(path, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        false
    }

    /// Number of pattern levels, implicit level included.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

/// Cache of resolved [`IgnoreSpec`]s keyed by absolute directory.
///
/// Safe to share between tasks: entries are immutable once built and the
/// maps sit behind `RwLock`s.
#[derive(Default)]
pub struct IgnoreResolver {
    specs: RwLock<HashMap<PathBuf, Arc<IgnoreSpec>>>,
    patterns: RwLock<HashMap<PathBuf, Arc<Vec<String>>>>,
}

impl IgnoreResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the merged spec for `dir` (absolute).
    ///
    /// Walks up until the filesystem root or a parent that does not exist,
    /// reusing any ancestor already in the cache.
    pub fn resolve(&self, dir: &Path) -> Arc<IgnoreSpec> {
        if let Some(spec) = self.cached_spec(dir) {
            return spec;
        }

        // Directories still to build, innermost first.
        let mut chain = vec![dir.to_path_buf()];
        let mut base: Option<Arc<IgnoreSpec>> = None;
        let mut current = dir.to_path_buf();
        while let Some(parent) = current.parent() {
            if parent == current || !parent.exists() {
                break;
            }
            if let Some(spec) = self.cached_spec(parent) {
                base = Some(spec);
                break;
            }
            chain.push(parent.to_path_buf());
            current = parent.to_path_buf();
        }

        let mut spec = match base {
            Some(spec) => spec,
            None => {
                let top = chain.last().cloned().unwrap_or_else(|| dir.to_path_buf());
                Arc::new(IgnoreSpec {
                    levels: vec![Arc::new(implicit_level(&top))],
                })
            }
        };

        for directory in chain.into_iter().rev() {
            let patterns = self.patterns_for(&directory);
            let mut levels = Vec::with_capacity(spec.levels.len() + 1);
            if !patterns.is_empty() {
                levels.push(Arc::new(build_level(&directory, &patterns)));
            }
            levels.extend(spec.levels.iter().cloned());
            spec = Arc::new(IgnoreSpec { levels });
            self.store_spec(directory, spec.clone());
        }

        spec
    }

    /// Raw patterns of `dir/.gitignore`: trimmed, non-empty, non-comment,
    /// duplicates removed, file order kept.
    pub fn patterns_for(&self, dir: &Path) -> Arc<Vec<String>> {
        if let Ok(cache) = self.patterns.read() {
            if let Some(patterns) = cache.get(dir) {
                return patterns.clone();
            }
        }
        let patterns = Arc::new(read_patterns(&dir.join(IGNORE_FILE)));
        if let Ok(mut cache) = self.patterns.write() {
            cache.insert(dir.to_path_buf(), patterns.clone());
        }
        patterns
    }

    /// Drop cached entries for `dir` and every directory below it.
    pub fn invalidate(&self, dir: &Path) {
        if let Ok(mut specs) = self.specs.write() {
            specs.retain(|k, _| !k.starts_with(dir));
        }
        if let Ok(mut patterns) = self.patterns.write() {
            patterns.retain(|k, _| !k.starts_with(dir));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut specs) = self.specs.write() {
            specs.clear();
        }
        if let Ok(mut patterns) = self.patterns.write() {
            patterns.clear();
        }
    }

    fn cached_spec(&self, dir: &Path) -> Option<Arc<IgnoreSpec>> {
        self.specs.read().ok()?.get(dir).cloned()
    }

    fn store_spec(&self, dir: PathBuf, spec: Arc<IgnoreSpec>) {
        if let Ok(mut specs) = self.specs.write() {
            specs.insert(dir, spec);
        }
    }
}

fn read_patterns(path: &Path) -> Vec<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable ignore file");
            return Vec::new();
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let mut patterns: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !patterns.iter().any(|p| p == line) {
            patterns.push(line.to_string());
        }
    }
    patterns
}

fn build_level(dir: &Path, patterns: &[String]) -> IgnoreLevel {
    let mut builder = GitignoreBuilder::new(dir);
    let source = dir.join(IGNORE_FILE);
    for pattern in patterns {
        if let Err(e) = builder.add_line(Some(source.clone()), pattern) {
            warn!(file = %source.display(), pattern = %pattern, error = %e, "skipping invalid ignore pattern");
        }
    }
    let matcher = builder.build().unwrap_or_else(|e| {
        warn!(file = %source.display(), error = %e, "ignore file could not be compiled");
        Gitignore::empty()
    });
    IgnoreLevel {
        dir: dir.to_path_buf(),
        matcher,
    }
}

fn implicit_level(top: &Path) -> IgnoreLevel {
    let patterns: Vec<String> = IMPLICIT_PATTERNS.iter().map(|p| p.to_string()).collect();
    build_level(top, &patterns)
}
