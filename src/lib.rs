//! # pctx
//!
//! Incremental, line-level indexing of a workspace into a searchable store.
//!
//! A scan walks a directory tree, merges nested `.gitignore` rules the way
//! git does, filters out binary and oversized files, and replaces each
//! directory's records in the index with the trimmed, non-empty lines of
//! its eligible files. Queries are then scoped to the non-ignored
//! directories of a workspace root.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────────┐   ┌───────────┐   ┌─────────────┐
//! │ Walker │──▶│ precheck +  │──▶│  extract  │──▶│ BatchWriter │──▶ ContentIndex
//! │        │   │ IgnoreSpec  │   │ (workers) │   │             │   (SQLite / memory)
//! └────────┘   └─────────────┘   └───────────┘   └─────────────┘
//!                                                       ▲
//!              scope::allowed_directories ──── find / ask
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ignore_rules`] | Hierarchical `.gitignore` resolution and cache |
//! | [`classify`] | File eligibility rules and skip reasons |
//! | [`extract`] | Per-file line extraction |
//! | [`writer`] | Scope-replacing batched writes |
//! | [`walker`] | Directory traversal driving a scan |
//! | [`scope`] | Query-time directory scope |
//! | [`search`] | `find` and `ask` |
//! | [`sqlite_index`] | SQLite content index |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`progress`] | Scan progress on stderr |
//! | [`logging`] | `tracing` subscriber setup |

pub mod classify;
pub mod config;
pub mod db;
pub mod extract;
pub mod ignore_rules;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod scan_cmd;
pub mod scope;
pub mod search;
pub mod sqlite_index;
pub mod stats;
pub mod walker;
pub mod writer;
