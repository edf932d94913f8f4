use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{trace, warn};

use super::cancel::CancelToken;
use crate::config::EncodingMode;
use crate::errors::{QueryError, QueryResult};
use crate::filters::QueryFilter;
use crate::index::ShardEntry;
use crate::metrics::QueryMetrics;
use crate::record::RawRow;

const BUFFER_CAPACITY: usize = 65536;

/// Decodes one line according to the encoding mode
fn decode_line<'a>(
    bytes: &'a [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> QueryResult<Cow<'a, str>> {
    match encoding_mode {
        EncodingMode::FailFast => match std::str::from_utf8(bytes) {
            Ok(valid) => Ok(Cow::Borrowed(valid)),
            Err(_) => match String::from_utf8(bytes.to_vec()) {
                Ok(s) => Ok(Cow::Owned(s)),
                Err(e) => Err(QueryError::encoding_error(path, e)),
            },
        },
        EncodingMode::Lossy => Ok(String::from_utf8_lossy(bytes)),
    }
}

/// Streams the rows of a single shard through the filter predicates.
///
/// Each call opens its own file handle and drops it on return, whether the
/// scan completed, failed or was cancelled.
#[derive(Debug, Clone)]
pub struct ShardProcessor {
    encoding_mode: EncodingMode,
    metrics: QueryMetrics,
}

impl ShardProcessor {
    pub fn new(encoding_mode: EncodingMode, metrics: QueryMetrics) -> Self {
        Self {
            encoding_mode,
            metrics,
        }
    }

    /// Calls `on_match` for every row of `shard` that satisfies `filter`,
    /// in file order. Returns the number of matches.
    pub fn scan<F>(
        &self,
        shard: &ShardEntry,
        filter: &QueryFilter,
        cancel: &CancelToken,
        mut on_match: F,
    ) -> QueryResult<u64>
    where
        F: FnMut(&RawRow<'_>),
    {
        let path = shard.path();
        trace!("Scanning shard: {}", path.display());

        let file = File::open(path).map_err(|e| QueryError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut buf = Vec::with_capacity(256);

        let mut rows = 0u64;
        let mut matched = 0u64;
        let mut bytes = 0u64;
        let mut lossy_warned = false;

        // Header
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| QueryError::from_io(path, e))?;
        bytes += n as u64;

        loop {
            if cancel.is_cancelled() {
                trace!("Scan of {} cancelled after {} rows", path.display(), rows);
                self.metrics.record_shard_scan(rows, matched, bytes);
                return Err(QueryError::Cancelled);
            }

            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| QueryError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            bytes += n as u64;

            let line = decode_line(&buf, path, self.encoding_mode)?;
            if !lossy_warned && matches!(line, Cow::Owned(_)) {
                warn!("Invalid UTF-8 replaced in shard: {}", path.display());
                lossy_warned = true;
            }
            if line.trim().is_empty() {
                continue;
            }

            rows += 1;
            let row = RawRow::split(&line);
            if filter.matches_row(&row) {
                matched += 1;
                on_match(&row);
            }
        }

        self.metrics.record_shard_scan(rows, matched, bytes);
        trace!(
            "Shard {} done: {} rows, {} matches",
            path.display(),
            rows,
            matched
        );
        Ok(matched)
    }

    /// Number of rows in `shard` matching `filter`
    pub fn count(
        &self,
        shard: &ShardEntry,
        filter: &QueryFilter,
        cancel: &CancelToken,
    ) -> QueryResult<u64> {
        self.scan(shard, filter, cancel, |_| {})
    }
}
