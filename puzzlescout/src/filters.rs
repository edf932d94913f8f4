//! Per-row filter predicates.
//!
//! A row matches a [`QueryFilter`] when all four predicates hold:
//!
//! 1. rating inside `[rating_min, rating_max]` (inclusive)
//! 2. id not in the exclusion set
//! 3. `opening` empty, or a substring of the row's opening tags
//! 4. every requested theme is a substring of the row's themes
//!
//! Theme and opening checks are plain substring containment, not token
//! equality, so `"pi"` matches a row tagged `"pin"`. The predicates are free
//! functions so the scan can run them on a borrowed [`RawRow`] before a
//! [`PuzzleRecord`] is ever allocated.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::record::{PuzzleRecord, RawRow};

pub const DEFAULT_RATING_MIN: i32 = 0;
pub const DEFAULT_RATING_MAX: i32 = 3500;

/// Criteria for one query. The engine only borrows it for the query's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default = "default_rating_min")]
    pub rating_min: i32,
    #[serde(default = "default_rating_max")]
    pub rating_max: i32,
    #[serde(default)]
    pub opening: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub exclude: HashSet<String>,
}

fn default_rating_min() -> i32 {
    DEFAULT_RATING_MIN
}

fn default_rating_max() -> i32 {
    DEFAULT_RATING_MAX
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            rating_min: DEFAULT_RATING_MIN,
            rating_max: DEFAULT_RATING_MAX,
            opening: String::new(),
            themes: Vec::new(),
            exclude: HashSet::new(),
        }
    }
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rating(mut self, min: i32, max: i32) -> Self {
        self.rating_min = min;
        self.rating_max = max;
        self
    }

    pub fn opening(mut self, opening: impl Into<String>) -> Self {
        self.opening = opening.into();
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.themes.push(theme.into());
        self
    }

    pub fn exclude(mut self, id: impl Into<String>) -> Self {
        self.exclude.insert(id.into());
        self
    }

    /// True when no row can ever match
    pub fn is_empty_range(&self) -> bool {
        self.rating_min > self.rating_max
    }

    /// Predicate set over a split row, cheapest checks first
    pub fn matches_row(&self, row: &RawRow<'_>) -> bool {
        in_rating_range(row.rating(), self.rating_min, self.rating_max)
            && !is_excluded(row.id(), &self.exclude)
            && matches_opening(row.opening_tags(), &self.opening)
            && contains_all_themes(row.themes(), &self.themes)
    }

    /// Predicate set over a parsed record
    pub fn matches(&self, record: &PuzzleRecord) -> bool {
        in_rating_range(record.rating, self.rating_min, self.rating_max)
            && !is_excluded(&record.id, &self.exclude)
            && matches_opening(&record.opening_tags, &self.opening)
            && contains_all_themes(&record.themes, &self.themes)
    }
}

/// `min <= rating <= max`
pub fn in_rating_range(rating: i32, min: i32, max: i32) -> bool {
    min <= rating && rating <= max
}

/// An empty opening filter matches everything
pub fn matches_opening(opening_tags: &str, opening: &str) -> bool {
    opening.is_empty() || opening_tags.contains(opening)
}

/// Every required theme must be a substring of the row's themes field
pub fn contains_all_themes(row_themes: &str, required: &[String]) -> bool {
    required.iter().all(|t| row_themes.contains(t.as_str()))
}

pub fn is_excluded(id: &str, exclude: &HashSet<String>) -> bool {
    !exclude.is_empty() && exclude.contains(id)
}
