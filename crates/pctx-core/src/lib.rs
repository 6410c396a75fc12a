//! # pctx core
//!
//! Filesystem-free logic shared by the `pctx` application: line records,
//! line splitting, the content index abstraction, and an in-memory index.
//!
//! This crate performs no file or network I/O and has no tokio, sqlx, or
//! other runtime dependencies.

pub mod lines;
pub mod models;
pub mod similarity;
pub mod store;
