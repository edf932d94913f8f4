use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Running counters for queries served by one engine.
///
/// Cloning shares the underlying counters, so a clone handed to a worker
/// thread reports into the same totals.
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,

    // Index payoff
    shards_scanned: Arc<AtomicU64>,
    shards_skipped: Arc<AtomicU64>,

    // Row processing
    rows_scanned: Arc<AtomicU64>,
    rows_matched: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self {
            queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            shards_scanned: Arc::new(AtomicU64::new(0)),
            shards_skipped: Arc::new(AtomicU64::new(0)),
            rows_scanned: Arc::new(AtomicU64::new(0)),
            rows_matched: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how many shards a query planned to read and how many it skipped
    pub fn record_plan(&self, scanned: u64, skipped: u64) {
        self.shards_scanned.fetch_add(scanned, Ordering::Relaxed);
        self.shards_skipped.fetch_add(skipped, Ordering::Relaxed);
        debug!("Query plan: {} shards scanned, {} skipped", scanned, skipped);
    }

    /// Records one finished shard scan
    pub fn record_shard_scan(&self, rows: u64, matched: u64, bytes: u64) {
        self.rows_scanned.fetch_add(rows, Ordering::Relaxed);
        self.rows_matched.fetch_add(matched, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> QueryStats {
        QueryStats {
            queries: self.queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            shards_scanned: self.shards_scanned.load(Ordering::Relaxed),
            shards_skipped: self.shards_skipped.load(Ordering::Relaxed),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            rows_matched: self.rows_matched.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Query stats:\n\
             Queries (failed): {} ({})\n\
             Shards scanned/skipped: {}/{}\n\
             Rows scanned/matched: {}/{}\n\
             Bytes read: {}",
            stats.queries,
            stats.failed_queries,
            stats.shards_scanned,
            stats.shards_skipped,
            stats.rows_scanned,
            stats.rows_matched,
            stats.bytes_read
        );
    }
}

impl Default for QueryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub queries: u64,
    pub failed_queries: u64,
    pub shards_scanned: u64,
    pub shards_skipped: u64,
    pub rows_scanned: u64,
    pub rows_matched: u64,
    pub bytes_read: u64,
}
