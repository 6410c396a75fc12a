//! In-memory [`ContentIndex`] implementation for testing.
//!
//! Keeps every record in a `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force term-vector cosine distance over all matching records.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{IndexedLine, MetadataFilter, QueryHit};
use crate::similarity;

use super::{sort_by_location, sort_hits, ContentIndex};

/// In-memory index for tests and embedding.
pub struct InMemoryIndex {
    lines: RwLock<Vec<IndexedLine>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            lines: RwLock::new(Vec::new()),
        }
    }

    /// Copy of every stored record, ordered by location.
    pub fn snapshot(&self) -> Vec<IndexedLine> {
        let mut all = match self.lines.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        sort_by_location(&mut all);
        all
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn passes(filter: Option<&MetadataFilter>, line: &IndexedLine) -> bool {
    filter.map_or(true, |f| f.matches(line))
}

#[async_trait]
impl ContentIndex for InMemoryIndex {
    async fn add(&self, records: &[IndexedLine]) -> Result<()> {
        let mut lines = self
            .lines
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        lines.extend_from_slice(records);
        Ok(())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
        let mut lines = self
            .lines
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        let before = lines.len();
        lines.retain(|l| !filter.matches(l));
        Ok((before - lines.len()) as u64)
    }

    async fn query(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<QueryHit>> {
        let query_vec = similarity::term_vector(text);
        if query_vec.is_empty() {
            return Ok(Vec::new());
        }
        let lines = self
            .lines
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        let mut hits: Vec<QueryHit> = lines
            .iter()
            .filter(|l| passes(filter, l))
            .map(|l| QueryHit {
                line: l.clone(),
                distance: similarity::distance(&query_vec, &l.content),
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
        let lines = self
            .lines
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        let mut found: Vec<IndexedLine> = lines
            .iter()
            .filter(|l| passes(filter, l) && l.content.contains(needle))
            .cloned()
            .collect();
        sort_by_location(&mut found);
        Ok(found)
    }

    async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
        let lines = self
            .lines
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        Ok(lines.iter().filter(|l| passes(filter, l)).count() as u64)
    }
}
