//! Index statistics.
//!
//! Used by `pctx stats` to show how much is indexed and where: total lines,
//! files and directories, plus the directories holding the most lines.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::sqlite_index::SqliteIndex;

const TOP_DIRS: i64 = 10;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let index = SqliteIndex::new(pool.clone());
    let stats = index.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("pctx — Index Stats");
    println!("==================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Lines:        {}", stats.lines);
    println!("  Files:        {}", stats.files);
    println!("  Directories:  {}", stats.directories);

    let rows = sqlx::query(
        r#"
        SELECT dir, COUNT(*) AS line_count, COUNT(DISTINCT path) AS file_count
        FROM lines
        GROUP BY dir
        ORDER BY line_count DESC, dir
        LIMIT ?
        "#,
    )
    .bind(TOP_DIRS)
    .fetch_all(&pool)
    .await?;

    if !rows.is_empty() {
        println!();
        println!("  Largest directories:");
        println!("  {:>8} {:>6}   {}", "LINES", "FILES", "DIRECTORY");
        println!("  {}", "-".repeat(60));
        for row in &rows {
            let dir: String = row.get("dir");
            let lines: i64 = row.get("line_count");
            let files: i64 = row.get("file_count");
            println!("  {:>8} {:>6}   {}", lines, files, dir);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
