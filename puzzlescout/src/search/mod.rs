//! Query execution over the shard index.
//!
//! A query asks the index which shards can intersect its rating range, then
//! streams those shards row by row through the filter predicates. Matches
//! either bump a counter or go through a size-one reservoir, so memory use is
//! independent of how many rows match.
pub mod cancel;
pub mod engine;
pub mod processor;
pub mod sampler;

pub use cancel::CancelToken;
pub use engine::QueryEngine;
pub use processor::ShardProcessor;
pub use sampler::Reservoir;
