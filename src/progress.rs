//! Scan progress reporting.
//!
//! Reports observable progress during `pctx scan` so users see which files
//! are being indexed and which directories are done. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::classify::SkipReason;

/// A single progress event for a scan.
#[derive(Clone, Debug)]
pub enum ScanProgressEvent<'a> {
    /// A file produced records.
    FileIndexed { path: &'a Path, lines: usize },
    /// A file was not indexed.
    FileSkipped { path: &'a Path, reason: SkipReason },
    /// A directory's scope was replaced.
    DirectoryDone {
        dir: &'a Path,
        files: u64,
        lines: u64,
    },
}

/// Reports scan progress. Implementations write to stderr (human or JSON).
pub trait ScanProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the walker.
    fn report(&self, event: ScanProgressEvent<'_>);
}

/// Human-friendly progress on stderr: `[Scanning] /path/to/file`.
pub struct StderrProgress;

impl ScanProgressReporter for StderrProgress {
    fn report(&self, event: ScanProgressEvent<'_>) {
        let line = match &event {
            ScanProgressEvent::FileIndexed { path, .. } => {
                format!("[Scanning] {}\n", path.display())
            }
            ScanProgressEvent::FileSkipped { .. } => return,
            ScanProgressEvent::DirectoryDone { dir, files, lines } if *files > 0 => format!(
                "[Done] {}  {} files, {} lines\n",
                dir.display(),
                format_number(*files),
                format_number(*lines)
            ),
            ScanProgressEvent::DirectoryDone { .. } => return,
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

#[derive(Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Indexed { path: &'a Path, lines: usize },
    Skipped { path: &'a Path, reason: SkipReason },
    Directory { dir: &'a Path, files: u64, lines: u64 },
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ScanProgressReporter for JsonProgress {
    fn report(&self, event: ScanProgressEvent<'_>) {
        let obj = match event {
            ScanProgressEvent::FileIndexed { path, lines } => JsonEvent::Indexed { path, lines },
            ScanProgressEvent::FileSkipped { path, reason } => JsonEvent::Skipped { path, reason },
            ScanProgressEvent::DirectoryDone { dir, files, lines } => {
                JsonEvent::Directory { dir, files, lines }
            }
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ScanProgressReporter for NoProgress {
    fn report(&self, _event: ScanProgressEvent<'_>) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ScanProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
