use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the index schema on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per indexed line
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lines (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            path TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            dir TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='lines_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE lines_fts USING fts5(
                line_id UNINDEXED,
                content
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lines_path ON lines(path, line_number)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lines_dir ON lines(dir)")
        .execute(pool)
        .await?;

    Ok(())
}
