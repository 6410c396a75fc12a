//! `find` and `ask`: lookups over the index, scoped to a workspace root.
//!
//! Both commands restrict results to the root's non-ignored directories
//! (see [`crate::scope`]) unless `--all` is given. `find` is an exact,
//! case-sensitive substring lookup; `ask` is a similarity query whose hits
//! are kept only when their distance is within the threshold.

use anyhow::Result;
use pctx_core::models::{IndexedLine, MetadataFilter, QueryHit};
use pctx_core::store::ContentIndex;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::ignore_rules::IgnoreResolver;
use crate::migrate::migrate_pool;
use crate::scope::scope_filter;
use crate::sqlite_index::SqliteIndex;

const NO_RESULTS: &str = "No results found.";

/// Lines containing `needle`, ordered by path and line number.
pub async fn find_lines(
    index: &dyn ContentIndex,
    needle: &str,
    scope: Option<&MetadataFilter>,
) -> Result<Vec<IndexedLine>> {
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    index.get(needle, scope).await
}

/// Closest lines to `question`, at most `limit`, none farther than
/// `max_distance`.
pub async fn ask_lines(
    index: &dyn ContentIndex,
    question: &str,
    scope: Option<&MetadataFilter>,
    limit: usize,
    max_distance: f64,
) -> Result<Vec<QueryHit>> {
    if question.trim().is_empty() {
        return Ok(Vec::new());
    }
    let hits = index.query(question, scope, limit).await?;
    Ok(hits
        .into_iter()
        .filter(|h| h.distance <= max_distance)
        .collect())
}

pub fn render_find(lines: &[IndexedLine]) -> String {
    if lines.is_empty() {
        return format!("{}\n", NO_RESULTS);
    }
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{}", line.path);
        let _ = writeln!(out, "({}) {}", line.line_number, line.content);
    }
    out
}

pub fn render_ask(hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return format!("{}\n", NO_RESULTS);
    }
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(out, "{} at line {}:", hit.line.path, hit.line.line_number);
        let _ = writeln!(out, "{}", hit.line.content);
    }
    out
}

/// Filter for `root`, or none when searching everything.
fn resolve_scope(root: &Path, all: bool) -> Result<Option<MetadataFilter>> {
    if all {
        return Ok(None);
    }
    Ok(Some(scope_filter(root, &IgnoreResolver::new())?))
}

pub async fn run_find(config: &Config, text: &str, root: &Path, all: bool) -> Result<()> {
    let scope = resolve_scope(root, all)?;
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let index = SqliteIndex::new(pool.clone());

    let lines = find_lines(&index, text, scope.as_ref()).await?;
    print!("{}", render_find(&lines));

    pool.close().await;
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    root: &Path,
    all: bool,
    limit: Option<usize>,
    threshold: Option<f64>,
) -> Result<()> {
    let scope = resolve_scope(root, all)?;
    let limit = limit.unwrap_or(config.retrieval.limit).max(1);
    let max_distance = threshold.unwrap_or(config.retrieval.max_distance);

    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let index = SqliteIndex::new(pool.clone());

    let hits = ask_lines(&index, question, scope.as_ref(), limit, max_distance).await?;
    print!("{}", render_ask(&hits));

    pool.close().await;
    Ok(())
}
