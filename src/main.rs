//! # pctx CLI
//!
//! Indexes the lines of a workspace and searches them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pctx init` | Create the SQLite index and its schema |
//! | `pctx scan [DIR]` | Index DIR (default: current directory) |
//! | `pctx find "<text>"` | Exact substring lookup |
//! | `pctx ask "<question>"` | Similarity lookup |
//! | `pctx stats` | Show what is indexed |
//!
//! ## Examples
//!
//! ```bash
//! pctx scan ~/src/project
//! pctx find "TODO(" --root ~/src/project
//! pctx ask "where is the socket opened" --threshold 0.6
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pctx::progress::ProgressMode;
use pctx::{config, logging, migrate, scan_cmd, search, stats};

/// pctx: line-level indexing and search for local workspaces.
#[derive(Parser)]
#[command(name = "pctx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `$HOME/.pctx/config.toml` when present, otherwise
    /// built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Progress output on stderr: `off`, `human` or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true, value_parser = parse_progress)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database. Safe to run repeatedly.
    Init,

    /// Scan a directory tree and bring the index in line with it.
    ///
    /// Respects `.gitignore` files at every level. Re-running on an
    /// unchanged tree leaves the index unchanged.
    Scan {
        /// Directory to scan.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Print every indexed line containing TEXT (case-sensitive).
    Find {
        text: String,

        /// Workspace root used to scope results.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Search the whole index instead of one workspace.
        #[arg(long)]
        all: bool,
    },

    /// Print the indexed lines closest to QUESTION.
    Ask {
        question: String,

        /// Workspace root used to scope results.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Maximum number of hits (default from `[retrieval].limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum distance of a hit (default from `[retrieval].max_distance`).
        #[arg(long)]
        threshold: Option<f64>,

        /// Search the whole index instead of one workspace.
        #[arg(long)]
        all: bool,
    },

    /// Show index statistics.
    Stats,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s)
        .ok_or_else(|| format!("invalid progress mode '{}': use off, human or json", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized at {}", cfg.db.path.display());
        }
        Commands::Scan { dir } => {
            let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            scan_cmd::run_scan(&cfg, &dir, progress).await?;
        }
        Commands::Find { text, root, all } => {
            search::run_find(&cfg, &text, &root, all).await?;
        }
        Commands::Ask {
            question,
            root,
            limit,
            threshold,
            all,
        } => {
            search::run_ask(&cfg, &question, &root, all, limit, threshold).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
