//! Rating-range index over the shard files.
//!
//! Each shard is a CSV file whose rows are sorted by rating, so its first and
//! last data rows bound every rating it holds. The index records that
//! `[min_rating, max_rating]` pair per shard once at startup and lets a query
//! skip every shard whose range cannot intersect the requested one.
//!
//! The index is plain data. It is never mutated after [`build_index`]
//! returns, so it is shared across concurrent queries without locking.
mod builder;
mod tail;

pub use builder::{build_index, discover_shards, index_shard};
pub use tail::read_last_line;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Rating bounds of one shard file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardEntry {
    pub min_rating: i32,
    pub max_rating: i32,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ShardEntry {
    /// Creates an entry; the bounds are ordered so that `min <= max` holds
    pub fn new(path: PathBuf, a: i32, b: i32, size_bytes: u64) -> Self {
        Self {
            min_rating: a.min(b),
            max_rating: a.max(b),
            path,
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this shard can hold a rating in `[min, max]`
    pub fn intersects(&self, min: i32, max: i32) -> bool {
        min <= max && self.min_rating <= max && self.max_rating >= min
    }
}

/// Ordered shard entries, in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShardIndex {
    entries: Vec<ShardEntry>,
    #[serde(skip)]
    build_time: Duration,
}

impl ShardIndex {
    pub fn new(entries: Vec<ShardEntry>, build_time: Duration) -> Self {
        Self {
            entries,
            build_time,
        }
    }

    pub fn entries(&self) -> &[ShardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build_time(&self) -> Duration {
        self.build_time
    }

    /// Entries whose rating range intersects `[min, max]`, in index order
    pub fn covering(&self, min: i32, max: i32) -> impl Iterator<Item = &ShardEntry> {
        self.entries.iter().filter(move |e| e.intersects(min, max))
    }

    /// Lowest and highest rating across all shards
    pub fn rating_bounds(&self) -> Option<(i32, i32)> {
        let min = self.entries.iter().map(|e| e.min_rating).min()?;
        let max = self.entries.iter().map(|e| e.max_rating).max()?;
        Some((min, max))
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ShardIndex {
        ShardIndex::new(
            vec![
                ShardEntry::new(PathBuf::from("1.csv"), 800, 1200, 10),
                ShardEntry::new(PathBuf::from("2.csv"), 1200, 1600, 20),
                ShardEntry::new(PathBuf::from("3.csv"), 1600, 2000, 30),
            ],
            Duration::ZERO,
        )
    }

    #[test]
    fn test_entry_orders_bounds() {
        let entry = ShardEntry::new(PathBuf::from("x.csv"), 1500, 900, 0);
        assert_eq!(entry.min_rating, 900);
        assert_eq!(entry.max_rating, 1500);
    }

    #[test]
    fn test_covering_skips_disjoint_shards() {
        let index = index();
        let touched: Vec<_> = index
            .covering(1500, 1700)
            .map(|e| e.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(touched, vec!["2.csv", "3.csv"]);

        assert_eq!(index.covering(1200, 1200).count(), 2);
        assert_eq!(index.covering(2001, 3000).count(), 0);
        assert_eq!(index.covering(1700, 1500).count(), 0);
    }

    #[test]
    fn test_intersects_inclusive_edges() {
        let entry = ShardEntry::new(PathBuf::from("x.csv"), 1500, 1700, 0);
        assert!(!entry.intersects(800, 1200));
        assert!(entry.intersects(1200, 1500));
        assert!(entry.intersects(1700, 1700));
        assert!(!entry.intersects(1701, 2000));
        assert!(!entry.intersects(1800, 1200));
    }

    #[test]
    fn test_summary() {
        let index = index();
        assert_eq!(index.rating_bounds(), Some((800, 2000)));
        assert_eq!(index.total_bytes(), 60);
        assert_eq!(ShardIndex::default().rating_bounds(), None);
    }
}
