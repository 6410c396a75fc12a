//! `pctx scan [DIR]`: bring the on-disk index in line with a directory tree.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::progress::{format_number, ProgressMode};
use crate::sqlite_index::SqliteIndex;
use crate::walker::{ScanReport, Walker};

pub async fn run_scan(config: &Config, dir: &Path, progress: ProgressMode) -> Result<ScanReport> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    let index = Arc::new(SqliteIndex::new(pool.clone()));

    let walker = Walker::new(index, &config.scan).with_progress(progress.reporter());
    let report = walker.scan(dir).await?;

    print_summary(&report);
    pool.close().await;
    Ok(report)
}

fn print_summary(report: &ScanReport) {
    println!("Scanned {}", report.root.display());
    println!(
        "  {} directories, {} files indexed, {} lines written",
        format_number(report.directories_scanned),
        format_number(report.files_indexed),
        format_number(report.lines_written)
    );
    if report.files_skipped() > 0 {
        let reasons: Vec<String> = report
            .skipped
            .iter()
            .map(|(reason, n)| format!("{} {}", format_number(*n), reason))
            .collect();
        println!(
            "  {} files skipped ({})",
            format_number(report.files_skipped()),
            reasons.join(", ")
        );
    }
    if report.failed_batches > 0 || report.failed_deletes > 0 {
        println!(
            "  {} failed batches, {} failed deletes (see log)",
            report.failed_batches, report.failed_deletes
        );
    }
    if report.unreadable_dirs > 0 {
        println!("  {} directories could not be read", report.unreadable_dirs);
    }
    for failure in &report.transient_failures {
        println!("  retry later: {} ({})", failure.path.display(), failure.error);
    }
}
