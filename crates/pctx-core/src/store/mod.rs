//! Content index abstraction.
//!
//! The [`ContentIndex`] trait is the only way the scanning pipeline touches
//! persistent state. It mirrors the operations of a document/vector store:
//! append records, delete by metadata predicate, similarity query, and
//! substring lookup. Backends decide how records are stored and how
//! similarity is computed.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexedLine, MetadataFilter, QueryHit};

/// Abstract storage backend for indexed lines.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](ContentIndex::add) | Append records |
/// | [`delete`](ContentIndex::delete) | Remove records matching a filter |
/// | [`query`](ContentIndex::query) | Similarity search, closest first |
/// | [`get`](ContentIndex::get) | Exact substring lookup, unranked |
/// | [`count`](ContentIndex::count) | Number of records matching a filter |
#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Append records. Callers are responsible for bounding the slice size.
    async fn add(&self, records: &[IndexedLine]) -> Result<()>;

    /// Remove every record matching `filter`. Returns the number removed.
    async fn delete(&self, filter: &MetadataFilter) -> Result<u64>;

    /// Similarity search restricted to `filter`, ordered by ascending
    /// distance and truncated to `limit`.
    async fn query(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<QueryHit>>;

    /// Records whose content contains `needle` (case-sensitive), ordered by
    /// path and line number.
    async fn get(&self, needle: &str, filter: Option<&MetadataFilter>)
        -> Result<Vec<IndexedLine>>;

    /// Number of records matching `filter` (all records when `None`).
    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64>;
}

/// Sort records by `(path, line_number)`, the order [`ContentIndex::get`]
/// returns.
pub fn sort_by_location(records: &mut [IndexedLine]) {
    records.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
}

/// Sort hits by ascending distance, breaking ties by location.
pub fn sort_hits(hits: &mut [QueryHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.line.path.cmp(&b.line.path))
            .then_with(|| a.line.line_number.cmp(&b.line.line_number))
    });
}
