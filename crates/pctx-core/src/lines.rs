//! Line splitter.
//!
//! Turns file text into [`IndexedLine`] records, one per line that is
//! non-empty after trimming. Empty lines are dropped without shifting the
//! numbering of the lines that follow them, so every record points at its
//! true position in the source file.
//!
//! # Example
//!
//! ```rust
//! use pctx_core::lines::split_lines;
//!
//! let lines = split_lines("/w/a.txt", "/w", "a\n\nb\n");
//! let got: Vec<(&str, u32)> = lines.iter().map(|l| (l.content.as_str(), l.line_number)).collect();
//! assert_eq!(got, vec![("a", 1), ("b", 3)]);
//! ```

use uuid::Uuid;

use crate::models::IndexedLine;

/// Lines of `text`, ended by `\n`, `\r\n` or a lone `\r`. A trailing
/// terminator does not open an extra line.
fn raw_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(|c: char| c == '\n' || c == '\r') {
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
            Some(end) => {
                let line = &rest[..end];
                let width = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[end + width..];
                Some(line)
            }
        }
    })
}

/// Number of raw lines in `text`, counting blank ones.
///
/// A trailing newline does not open an extra line: `"a\n"` has one line.
pub fn raw_line_count(text: &str) -> usize {
    raw_lines(text).count()
}

/// Split text into trimmed, non-empty line records.
///
/// `\n`, `\r\n` and a lone `\r` all end a line. Each surviving record
/// gets a fresh UUID; dropped lines do not consume one.
pub fn split_lines(path: &str, dir: &str, text: &str) -> Vec<IndexedLine> {
    raw_lines(text)
        .enumerate()
        .filter_map(|(i, raw)| {
            let content = raw.trim();
            if content.is_empty() {
                return None;
            }
            Some(IndexedLine {
                id: Uuid::new_v4().to_string(),
                content: content.to_string(),
                path: path.to_string(),
                line_number: (i + 1) as u32,
                dir: dir.to_string(),
            })
        })
        .collect()
}
