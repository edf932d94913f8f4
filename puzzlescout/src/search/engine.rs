use dashmap::DashMap;
use rand::Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::cancel::CancelToken;
use super::processor::ShardProcessor;
use super::sampler::Reservoir;
use crate::config::EngineConfig;
use crate::errors::{QueryError, QueryResult};
use crate::filters::QueryFilter;
use crate::index::{build_index, ShardEntry, ShardIndex};
use crate::metrics::QueryMetrics;
use crate::record::PuzzleRecord;

/// Answers count and random-selection queries over an immutable shard index.
///
/// The engine holds no per-query state, so one instance serves any number of
/// concurrent callers. Each query streams its shards through its own file
/// handles.
pub struct QueryEngine {
    index: Arc<ShardIndex>,
    config: EngineConfig,
    processor: ShardProcessor,
    metrics: QueryMetrics,
    pool: ThreadPool,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("shards", &self.index.len())
            .field("config", &self.config)
            .finish()
    }
}

impl QueryEngine {
    /// Builds the shard index for `config.shard_dir` and wraps it in an engine
    pub fn open(config: EngineConfig) -> QueryResult<Self> {
        config.validate()?;
        let pool = build_pool(&config)?;
        let index = pool.install(|| build_index(&config.shard_dir, &config.shard_pattern))?;
        Ok(Self::with_pool(Arc::new(index), config, pool))
    }

    /// Wraps an already built index
    pub fn from_index(index: Arc<ShardIndex>, config: EngineConfig) -> QueryResult<Self> {
        let pool = build_pool(&config)?;
        Ok(Self::with_pool(index, config, pool))
    }

    fn with_pool(index: Arc<ShardIndex>, config: EngineConfig, pool: ThreadPool) -> Self {
        let metrics = QueryMetrics::new();
        let processor = ShardProcessor::new(config.encoding_mode, metrics.clone());
        Self {
            index,
            config,
            processor,
            metrics,
            pool,
        }
    }

    pub fn index(&self) -> &ShardIndex {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    /// Shards that can contain a match, in index order.
    ///
    /// With `use_index` off every shard is returned; the predicates still
    /// reject out-of-range rows, so results are identical.
    fn plan(&self, filter: &QueryFilter) -> Vec<&ShardEntry> {
        let shards: Vec<&ShardEntry> = if self.config.use_index {
            self.index
                .covering(filter.rating_min, filter.rating_max)
                .collect()
        } else {
            self.index.entries().iter().collect()
        };

        let skipped = self.index.len() - shards.len();
        self.metrics
            .record_plan(shards.len() as u64, skipped as u64);
        debug!(
            "Rating {}..={}: scanning {} of {} shards",
            filter.rating_min,
            filter.rating_max,
            shards.len(),
            self.index.len()
        );
        shards
    }

    /// Number of rows matching `filter` across all shards
    pub fn count(&self, filter: &QueryFilter) -> QueryResult<u64> {
        self.count_with(filter, &CancelToken::new())
    }

    /// Like [`count`](Self::count), abandoning the scan once `cancel` fires.
    ///
    /// Shards are counted in parallel on the engine's pool.
    pub fn count_with(&self, filter: &QueryFilter, cancel: &CancelToken) -> QueryResult<u64> {
        self.metrics.record_query();
        if filter.is_empty_range() {
            debug!("Empty rating range, nothing to count");
            return Ok(0);
        }

        let shards = self.plan(filter);
        let result = self.pool.install(|| {
            shards
                .par_iter()
                .map(|shard| self.processor.count(shard, filter, cancel))
                .try_reduce(|| 0, |a, b| Ok(a + b))
        });

        match result {
            Ok(total) => {
                info!("Count complete: {} matches", total);
                Ok(total)
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    /// One uniformly random row matching `filter`, or `None`
    pub fn select_random(&self, filter: &QueryFilter) -> QueryResult<Option<PuzzleRecord>> {
        let mut rng = rand::thread_rng();
        self.select_random_with(filter, &mut rng, &CancelToken::new())
    }

    /// Single-pass reservoir sampling over every matching row.
    ///
    /// Shards are read sequentially in index order and `rng` is the only
    /// random source for the whole scan, which keeps every match equally
    /// likely and makes seeded runs reproducible.
    pub fn select_random_with<R: Rng + ?Sized>(
        &self,
        filter: &QueryFilter,
        rng: &mut R,
        cancel: &CancelToken,
    ) -> QueryResult<Option<PuzzleRecord>> {
        self.metrics.record_query();
        if filter.is_empty_range() {
            debug!("Empty rating range, nothing to select");
            return Ok(None);
        }

        let mut reservoir = Reservoir::new();
        for shard in self.plan(filter) {
            let scanned = self.processor.scan(shard, filter, cancel, |row| {
                reservoir.offer_with(&mut *rng, || row.to_record());
            });
            if let Err(e) = scanned {
                self.metrics.record_failure();
                return Err(e);
            }
        }

        let seen = reservoir.seen();
        let picked = reservoir.into_inner();
        match &picked {
            Some(record) => info!("Selected puzzle {} out of {} matches", record.id, seen),
            None => info!("No puzzle matches the filter"),
        }
        Ok(picked)
    }

    /// Opening tag -> number of matching puzzles carrying it.
    ///
    /// Tags are split on whitespace; a puzzle with several tags counts once
    /// toward each of them.
    pub fn list_openings(&self, filter: &QueryFilter) -> QueryResult<BTreeMap<String, u64>> {
        self.metrics.record_query();
        if filter.is_empty_range() {
            return Ok(BTreeMap::new());
        }

        let tags: DashMap<String, u64> = DashMap::new();
        let cancel = CancelToken::new();
        let shards = self.plan(filter);

        let result = self.pool.install(|| {
            shards.par_iter().try_for_each(|shard| {
                self.processor
                    .scan(shard, filter, &cancel, |row| {
                        for tag in row.opening_tags().split_whitespace() {
                            *tags.entry(tag.to_string()).or_insert(0) += 1;
                        }
                    })
                    .map(|_| ())
            })
        });
        if let Err(e) = result {
            self.metrics.record_failure();
            return Err(e);
        }

        let openings: BTreeMap<String, u64> = tags.into_iter().collect();
        info!("Collected {} opening tags", openings.len());
        Ok(openings)
    }
}

fn build_pool(config: &EngineConfig) -> QueryResult<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(config.thread_count.get())
        .thread_name(|i| format!("puzzlescout-{}", i))
        .build()
        .map_err(|e| QueryError::config_error(format!("failed to build thread pool: {}", e)))
}
