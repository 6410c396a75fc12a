//! Scope-replacing batched writes.
//!
//! [`BatchWriter`] is the only code that writes to a [`ContentIndex`]
//! during a scan. Every write replaces a whole scope: delete everything the
//! scope covers, then insert the new records in bounded batches. Write
//! failures are logged and counted in [`WriteStats`]; they never abort the
//! caller.

use pctx_core::models::{IndexedLine, MetadataFilter, ScanScope};
use pctx_core::store::ContentIndex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one or more write calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub deleted: u64,
    pub written: u64,
    pub batches: u64,
    pub failed_batches: u64,
    pub failed_deletes: u64,
}

impl WriteStats {
    pub fn merge(&mut self, other: WriteStats) {
        self.deleted += other.deleted;
        self.written += other.written;
        self.batches += other.batches;
        self.failed_batches += other.failed_batches;
        self.failed_deletes += other.failed_deletes;
    }
}

pub struct BatchWriter {
    index: Arc<dyn ContentIndex>,
    batch_size: usize,
}

impl BatchWriter {
    /// `batch_size` of zero is treated as one.
    pub fn new(index: Arc<dyn ContentIndex>, batch_size: usize) -> Self {
        Self {
            index,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Round-trip a trivial count to confirm the index answers.
    pub async fn check_available(&self) -> anyhow::Result<()> {
        self.index
            .count(Some(&MetadataFilter::DirIn(Vec::new())))
            .await?;
        Ok(())
    }

    /// Replace everything indexed under `scope` with `records`.
    ///
    /// The delete runs even when `records` is empty. If it fails, no records
    /// are inserted for the scope.
    pub async fn replace_scope(&self, scope: &ScanScope, records: &[IndexedLine]) -> WriteStats {
        let mut stats = WriteStats::default();
        let filter = MetadataFilter::from(scope);

        match self.index.delete(&filter).await {
            Ok(n) => stats.deleted = n,
            Err(e) => {
                warn!(scope = ?scope, error = %e, "delete failed; skipping inserts for scope");
                stats.failed_deletes = 1;
                return stats;
            }
        }

        for batch in records.chunks(self.batch_size) {
            stats.batches += 1;
            match self.index.add(batch).await {
                Ok(()) => stats.written += batch.len() as u64,
                Err(e) => {
                    warn!(scope = ?scope, size = batch.len(), error = %e, "batch insert failed");
                    stats.failed_batches += 1;
                }
            }
        }

        debug!(
            scope = ?scope,
            deleted = stats.deleted,
            written = stats.written,
            "scope replaced"
        );
        stats
    }

    /// Delete every record whose `dir` is one of `dirs`, in chunks of the
    /// batch size.
    pub async fn purge_directories(&self, dirs: &[String]) -> WriteStats {
        let mut stats = WriteStats::default();
        for chunk in dirs.chunks(self.batch_size) {
            let filter = MetadataFilter::DirIn(chunk.to_vec());
            match self.index.delete(&filter).await {
                Ok(n) => stats.deleted += n,
                Err(e) => {
                    warn!(dirs = chunk.len(), error = %e, "purge failed");
                    stats.failed_deletes += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use pctx_core::lines::split_lines;
    use pctx_core::models::QueryHit;
    use pctx_core::store::memory::InMemoryIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every call; fails `add` on the listed call numbers and every
    /// `delete` when `fail_delete` is set.
    #[derive(Default)]
    struct FlakyIndex {
        inner: InMemoryIndex,
        add_calls: AtomicUsize,
        fail_adds: Vec<usize>,
        fail_delete: bool,
        batch_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ContentIndex for FlakyIndex {
        async fn add(&self, records: &[IndexedLine]) -> Result<()> {
            let call = self.add_calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(records.len());
            if self.fail_adds.contains(&call) {
                return Err(anyhow!("add failed"));
            }
            self.inner.add(records).await
        }
        async fn delete(&self, filter: &MetadataFilter) -> Result<u64> {
            if self.fail_delete {
                return Err(anyhow!("delete failed"));
            }
            self.inner.delete(filter).await
        }
        async fn query(
            &self,
            text: &str,
            filter: Option<&MetadataFilter>,
            limit: usize,
        ) -> Result<Vec<QueryHit>> {
            self.inner.query(text, filter, limit).await
        }
        async fn get(
            &self,
            needle: &str,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<IndexedLine>> {
            self.inner.get(needle, filter).await
        }
        async fn count(&self, filter: Option<&MetadataFilter>) -> Result<u64> {
            self.inner.count(filter).await
        }
    }

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("line {}\n", i)).collect()
    }

    #[tokio::test]
    async fn inserts_in_bounded_batches() {
        let index = Arc::new(FlakyIndex::default());
        let writer = BatchWriter::new(index.clone(), 3);
        let records = split_lines("/w/a", "/w", &numbered(7));

        let stats = writer
            .replace_scope(&ScanScope::Directory("/w".into()), &records)
            .await;
        assert_eq!(stats.written, 7);
        assert_eq!(stats.batches, 3);
        assert_eq!(*index.batch_sizes.lock().unwrap(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn zero_batch_size_writes_one_record_per_batch() {
        let index = Arc::new(FlakyIndex::default());
        let writer = BatchWriter::new(index.clone(), 0);
        assert_eq!(writer.batch_size(), 1);

        let stats = writer
            .replace_scope(
                &ScanScope::Directory("/w".into()),
                &split_lines("/w/a", "/w", &numbered(2)),
            )
            .await;
        assert_eq!(stats.batches, 2);
        assert_eq!(*index.batch_sizes.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn replacing_removes_previous_records() {
        let index = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(index.clone(), 100);
        let scope = ScanScope::Directory("/w".into());

        writer
            .replace_scope(&scope, &split_lines("/w/a", "/w", "old\nkept"))
            .await;
        let stats = writer
            .replace_scope(&scope, &split_lines("/w/a", "/w", "kept"))
            .await;
        assert_eq!(stats.deleted, 2);
        let contents: Vec<String> = index.snapshot().into_iter().map(|l| l.content).collect();
        assert_eq!(contents, vec!["kept".to_string()]);
    }

    #[tokio::test]
    async fn empty_records_still_clear_scope() {
        let index = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(index.clone(), 10);
        let scope = ScanScope::Path("/w/a".into());
        writer
            .replace_scope(&scope, &split_lines("/w/a", "/w", "x"))
            .await;

        let stats = writer.replace_scope(&scope, &[]).await;
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.batches, 0);
        assert_eq!(index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_and_counted() {
        let index = Arc::new(FlakyIndex {
            fail_adds: vec![1],
            ..FlakyIndex::default()
        });
        let writer = BatchWriter::new(index.clone(), 2);
        let records = split_lines("/w/a", "/w", &numbered(5));

        let stats = writer
            .replace_scope(&ScanScope::Directory("/w".into()), &records)
            .await;
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.written, 3);
        assert_eq!(index.count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_delete_skips_inserts() {
        let index = Arc::new(FlakyIndex {
            fail_delete: true,
            ..FlakyIndex::default()
        });
        let writer = BatchWriter::new(index.clone(), 10);
        let stats = writer
            .replace_scope(
                &ScanScope::Directory("/w".into()),
                &split_lines("/w/a", "/w", "x"),
            )
            .await;
        assert_eq!(stats.failed_deletes, 1);
        assert_eq!(stats.written, 0);
        assert_eq!(index.add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn purge_removes_only_listed_dirs() {
        let index = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(index.clone(), 1);
        index.add(&split_lines("/w/a", "/w", "keep")).await.unwrap();
        index
            .add(&split_lines("/w/x/a", "/w/x", "drop"))
            .await
            .unwrap();
        index
            .add(&split_lines("/w/x/y/a", "/w/x/y", "drop"))
            .await
            .unwrap();

        let stats = writer
            .purge_directories(&["/w/x".to_string(), "/w/x/y".to_string()])
            .await;
        assert_eq!(stats.deleted, 2);
        assert_eq!(index.snapshot()[0].content, "keep");
        assert_eq!(index.count(None).await.unwrap(), 1);
    }
}
