pub mod config;
pub mod errors;
pub mod filters;
pub mod index;
pub mod metrics;
pub mod record;
pub mod search;

pub use config::{EncodingMode, EngineConfig};
pub use errors::{QueryError, QueryResult};
pub use filters::QueryFilter;
pub use index::{ShardEntry, ShardIndex};
pub use record::PuzzleRecord;
pub use search::{CancelToken, QueryEngine};

use once_cell::sync::OnceCell;

static ENGINE: OnceCell<QueryEngine> = OnceCell::new();

/// Builds the process-wide engine once. Later calls return the engine built
/// by the first successful call and ignore their `config`.
pub fn init(config: EngineConfig) -> QueryResult<&'static QueryEngine> {
    ENGINE.get_or_try_init(|| QueryEngine::open(config))
}

/// The process-wide engine, once [`init`] has succeeded
pub fn engine() -> QueryResult<&'static QueryEngine> {
    ENGINE.get().ok_or(QueryError::NotInitialized)
}
