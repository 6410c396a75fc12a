//! SQLite-backed [`ContentIndex`] implementation.
//!
//! Records live in the `lines` table; `lines_fts` (FTS5) mirrors their
//! content for candidate retrieval. Similarity queries fetch FTS
//! candidates matching any query term and rank them with the same
//! term-vector distance the in-memory index uses. Substring lookups use
//! `instr`, which is case-sensitive.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use pctx_core::models::{IndexedLine, MetadataFilter, QueryHit};
use pctx_core::similarity;
use pctx_core::store::{sort_hits, ContentIndex};

/// Dirs bound one placeholder each. Larger sets are split (deletes) or
/// bound as a single JSON array and expanded with `json_each` (reads).
const MAX_BOUND_DIRS: usize = 900;
/// FTS candidates fetched per requested hit before ranking.
const CANDIDATES_PER_HIT: usize = 50;
const MIN_CANDIDATES: usize = 500;

/// Row counts reported by `pctx stats`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub lines: u64,
    pub files: u64,
    pub directories: u64,
}

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS lines, COUNT(DISTINCT path) AS files, COUNT(DISTINCT dir) AS dirs FROM lines",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(IndexStats {
            lines: row.get::<i64, _>("lines") as u64,
            files: row.get::<i64, _>("files") as u64,
            directories: row.get::<i64, _>("dirs") as u64,
        })
    }
}

fn line_from_row(row: &SqliteRow) -> IndexedLine {
    IndexedLine {
        id: row.get("id"),
        content: row.get("content"),
        path: row.get("path"),
        line_number: row.get::<i64, _>("line_number") as u32,
        dir: row.get("dir"),
    }
}

/// Append ` AND <predicate>` for `filter`.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: Option<&MetadataFilter>) -> Result<()> {
    match filter {
        None => {}
        Some(MetadataFilter::PathEq(path)) => {
            qb.push(" AND l.path = ").push_bind(path.clone());
        }
        Some(MetadataFilter::DirEq(dir)) => {
            qb.push(" AND l.dir = ").push_bind(dir.clone());
        }
        Some(MetadataFilter::DirIn(dirs)) if dirs.is_empty() => {
            qb.push(" AND 0");
        }
        Some(MetadataFilter::DirIn(dirs)) if dirs.len() <= MAX_BOUND_DIRS => {
            qb.push(" AND l.dir IN (");
            push_list(qb, dirs);
        }
        Some(MetadataFilter::DirIn(dirs)) => {
            qb.push(" AND l.dir IN (SELECT value FROM json_each(")
                .push_bind(serde_json::to_string(dirs)?)
                .push("))");
        }
    }
    Ok(())
}

fn push_list(qb: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

/// FTS5 expression matching any of the query's terms.
fn match_expression(text: &str) -> Option<String> {
    let mut terms = similarity::tokenize(text);
    terms.sort();
    terms.dedup();
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl ContentIndex for SqliteIndex {
    async fn add(&self, records: &[IndexedLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO lines (id, content, path, line_number, dir) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.content)
            .bind(&record.path)
            .bind(record.line_number as i64)
            .bind(&record.dir)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO lines_fts (line_id, content) VALUES (?, ?)")
                .bind(&record.id)
                .bind(&record.content)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = match filter {
            MetadataFilter::PathEq(value) | MetadataFilter::DirEq(value) => {
                let column = match filter {
                    MetadataFilter::PathEq(_) => "path",
                    _ => "dir",
                };
                sqlx::query(&format!(
                    "DELETE FROM lines_fts WHERE line_id IN (SELECT id FROM lines WHERE {} = ?)",
                    column
                ))
                .bind(value)
                .execute(&mut *tx)
                .await?;
                sqlx::query(&format!("DELETE FROM lines WHERE {} = ?", column))
                    .bind(value)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
            }
            MetadataFilter::DirIn(dirs) => {
                let mut removed = 0;
                for chunk in dirs.chunks(MAX_BOUND_DIRS) {
                    let mut qb = QueryBuilder::<Sqlite>::new(
                        "DELETE FROM lines_fts WHERE line_id IN (SELECT id FROM lines WHERE dir IN (",
                    );
                    push_list(&mut qb, chunk);
                    qb.push(")");
                    qb.build().execute(&mut *tx).await?;

                    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM lines WHERE dir IN (");
                    push_list(&mut qb, chunk);
                    removed += qb.build().execute(&mut *tx).await?.rows_affected();
                }
                removed
            }
        };
        tx.commit().await?;
        Ok(removed)
    }

    async fn query(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<QueryHit>> {
        let Some(expression) = match_expression(text) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT l.id, l.content, l.path, l.line_number, l.dir \
             FROM lines_fts JOIN lines l ON l.id = lines_fts.line_id \
             WHERE lines_fts MATCH ",
        );
        qb.push_bind(expression);
        push_filter(&mut qb, filter)?;
        let candidates = (limit * CANDIDATES_PER_HIT).max(MIN_CANDIDATES);
        qb.push(" ORDER BY lines_fts.rank LIMIT ")
            .push_bind(candidates as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let query_vec = similarity::term_vector(text);
        let mut hits: Vec<QueryHit> = rows
            .iter()
            .map(line_from_row)
            .map(|line| QueryHit {
                distance: similarity::distance(&query_vec, &line.content),
                line,
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(
        &self,
        needle: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexedLine>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT l.id, l.content, l.path, l.line_number, l.dir FROM lines l WHERE instr(l.content, ",
        );
        qb.push_bind(needle.to_string()).push(") > 0");
        push_filter(&mut qb, filter)?;
        qb.push(" ORDER BY l.path, l.line_number");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(line_from_row).collect())
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM lines l WHERE 1");
        push_filter(&mut qb, filter)?;
        let n: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::migrate_pool;
    use pctx_core::lines::split_lines;
    use tempfile::TempDir;

    async fn open() -> (TempDir, SqliteIndex) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        // Running twice must be harmless.
        migrate_pool(&pool).await.unwrap();
        (tmp, SqliteIndex::new(pool))
    }

    #[test]
    fn match_expression_quotes_distinct_terms() {
        assert_eq!(
            match_expression("Open the file, open it").as_deref(),
            Some("\"file\" OR \"it\" OR \"open\" OR \"the\"")
        );
        assert_eq!(match_expression("?!"), None);
    }

    #[tokio::test]
    async fn add_get_and_delete_by_dir() {
        let (_tmp, index) = open().await;
        index
            .add(&split_lines("/w/b.rs", "/w", "let Needle = 1;\nneedle()"))
            .await
            .unwrap();
        index
            .add(&split_lines("/w/sub/a.rs", "/w/sub", "\nneedle again"))
            .await
            .unwrap();

        let found = index.get("needle", None).await.unwrap();
        let got: Vec<(&str, u32)> = found
            .iter()
            .map(|l| (l.path.as_str(), l.line_number))
            .collect();
        assert_eq!(got, vec![("/w/b.rs", 2), ("/w/sub/a.rs", 2)]);

        let removed = index
            .delete(&MetadataFilter::DirEq("/w".to_string()))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.count(None).await.unwrap(), 1);
        assert!(index
            .query("needle", Some(&MetadataFilter::DirEq("/w".into())), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn query_ranks_closer_lines_first_within_scope() {
        let (_tmp, index) = open().await;
        index
            .add(&split_lines(
                "/w/a.rs",
                "/w",
                "open index file\nclose the socket\nopen",
            ))
            .await
            .unwrap();
        index
            .add(&split_lines("/w/target/a.rs", "/w/target", "open index file"))
            .await
            .unwrap();

        let scope = MetadataFilter::DirIn(vec!["/w".to_string()]);
        let hits = index.query("open index file", Some(&scope), 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line.content, "open index file");
        assert!(hits[0].distance < 1e-6);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits.iter().all(|h| h.line.dir == "/w"));
    }

    #[tokio::test]
    async fn large_dir_sets_are_chunked() {
        let (_tmp, index) = open().await;
        let mut dirs = Vec::new();
        for i in 0..(MAX_BOUND_DIRS + 10) {
            dirs.push(format!("/w/d{}", i));
        }
        index
            .add(&split_lines("/w/d5/a", "/w/d5", "five"))
            .await
            .unwrap();
        index
            .add(&split_lines(
                &format!("/w/d{}/a", MAX_BOUND_DIRS + 5),
                &format!("/w/d{}", MAX_BOUND_DIRS + 5),
                "late",
            ))
            .await
            .unwrap();
        index.add(&split_lines("/x/a", "/x", "other")).await.unwrap();

        let filter = MetadataFilter::DirIn(dirs);
        assert_eq!(index.count(Some(&filter)).await.unwrap(), 2);
        assert_eq!(index.get("late", Some(&filter)).await.unwrap().len(), 1);
        assert_eq!(index.delete(&filter).await.unwrap(), 2);
        assert_eq!(index.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn large_scope_query_ignores_lines_outside_it() {
        let (_tmp, index) = open().await;
        let mut other = String::new();
        for _ in 0..600 {
            other.push_str("open socket\n");
        }
        index
            .add(&split_lines("/other/a.rs", "/other", &other))
            .await
            .unwrap();
        index
            .add(&split_lines("/w/d5/a.rs", "/w/d5", "open the socket here now"))
            .await
            .unwrap();

        let scope = MetadataFilter::DirIn((0..1000).map(|i| format!("/w/d{}", i)).collect());
        let hits = index.query("open socket", Some(&scope), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line.path, "/w/d5/a.rs");
        assert_eq!(index.get("socket", Some(&scope)).await.unwrap().len(), 1);
        assert_eq!(index.count(Some(&scope)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stats_count_distinct_files_and_dirs() {
        let (_tmp, index) = open().await;
        index
            .add(&split_lines("/w/a", "/w", "one\ntwo"))
            .await
            .unwrap();
        index.add(&split_lines("/w/s/b", "/w/s", "x")).await.unwrap();
        let stats = index.stats().await.unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 2);
    }
}
