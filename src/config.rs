//! TOML configuration.
//!
//! Every section and field is optional; omitted values fall back to the
//! defaults below. [`load_config`] parses and validates a file,
//! [`Config::default`] is used when no file exists.

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    data_dir().join("index.sqlite")
}

/// `$HOME/.pctx`, or `./.pctx` when no home directory can be determined.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pctx")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_binary_probe_bytes")]
    pub binary_probe_bytes: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_purge_ignored")]
    pub purge_ignored: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            max_lines: default_max_lines(),
            binary_probe_bytes: default_binary_probe_bytes(),
            batch_size: default_batch_size(),
            workers: None,
            purge_ignored: default_purge_ignored(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}
fn default_max_lines() -> usize {
    10_000
}
fn default_binary_probe_bytes() -> usize {
    8 * 1024
}
fn default_batch_size() -> usize {
    2_000
}
fn default_purge_ignored() -> bool {
    true
}

/// Upper bound on the derived worker count.
const MAX_DEFAULT_WORKERS: usize = 8;
/// Upper bound on an explicitly configured worker count.
const MAX_WORKERS: usize = 64;

impl ScanConfig {
    /// Extraction worker count: the configured value, or the available
    /// parallelism capped at [`MAX_DEFAULT_WORKERS`].
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .clamp(1, MAX_DEFAULT_WORKERS)
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_max_distance() -> f64 {
    0.9
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Resolve the configuration for the CLI.
///
/// An explicit path must exist. Without one, `$HOME/.pctx/config.toml` is
/// used when present, otherwise the built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let fallback = data_dir().join("config.toml");
    if fallback.is_file() {
        return load_config(&fallback);
    }
    Ok(Config::default())
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.scan.max_file_bytes == 0 {
            bail!("scan.max_file_bytes must be > 0");
        }
        if self.scan.max_lines == 0 {
            bail!("scan.max_lines must be > 0");
        }
        if self.scan.binary_probe_bytes == 0 {
            bail!("scan.binary_probe_bytes must be > 0");
        }
        if self.scan.batch_size == 0 {
            bail!("scan.batch_size must be > 0");
        }
        if let Some(workers) = self.scan.workers {
            if !(1..=MAX_WORKERS).contains(&workers) {
                bail!("scan.workers must be in [1, {}]", MAX_WORKERS);
            }
        }
        for pattern in &self.scan.exclude_globs {
            Glob::new(pattern)
                .with_context(|| format!("Invalid scan.exclude_globs pattern: '{}'", pattern))?;
        }

        if self.retrieval.limit < 1 {
            bail!("retrieval.limit must be >= 1");
        }
        if !self.retrieval.max_distance.is_finite() || self.retrieval.max_distance < 0.0 {
            bail!("retrieval.max_distance must be a finite value >= 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(body: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pctx.toml");
        std::fs::write(&path, body).unwrap();
        (tmp, path)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let (_tmp, path) = write_config("");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.scan.max_file_bytes, 1024 * 1024);
        assert_eq!(cfg.scan.max_lines, 10_000);
        assert_eq!(cfg.scan.binary_probe_bytes, 8192);
        assert_eq!(cfg.scan.batch_size, 2_000);
        assert!(cfg.scan.purge_ignored);
        assert_eq!(cfg.retrieval.limit, 10);
        assert!(cfg.db.path.ends_with(".pctx/index.sqlite"));
    }

    #[test]
    fn sections_override_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/x.sqlite"

[scan]
max_lines = 50
workers = 3
exclude_globs = ["**/*.lock"]

[retrieval]
max_distance = 0.5
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("/tmp/x.sqlite"));
        assert_eq!(cfg.scan.max_lines, 50);
        assert_eq!(cfg.scan.effective_workers(), 3);
        assert_eq!(cfg.scan.exclude_globs, vec!["**/*.lock".to_string()]);
        assert_eq!(cfg.retrieval.max_distance, 0.5);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let (_tmp, path) = write_config("[scan]\nbatch_size = 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn rejects_bad_glob() {
        let (_tmp, path) = write_config("[scan]\nexclude_globs = [\"a[\"]\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_out_of_range_workers() {
        let (_tmp, path) = write_config("[scan]\nworkers = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn derived_workers_are_bounded() {
        let workers = ScanConfig::default().effective_workers();
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&workers));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(resolve_config(Some(&tmp.path().join("nope.toml"))).is_err());
    }
}
