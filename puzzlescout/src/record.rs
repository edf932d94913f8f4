//! Row model for the puzzle shards.
//!
//! Every shard is a headered CSV file with a fixed column order:
//!
//! ```text
//! PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl,OpeningTags
//! ```
//!
//! Parsing is lenient on purpose. A numeric field that does not parse becomes
//! `0` and a missing trailing column becomes an empty string, so one damaged
//! row never stops a scan.
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Column positions in a shard row
pub const COL_ID: usize = 0;
pub const COL_FEN: usize = 1;
pub const COL_MOVES: usize = 2;
pub const COL_RATING: usize = 3;
pub const COL_RATING_DEVIATION: usize = 4;
pub const COL_POPULARITY: usize = 5;
pub const COL_NB_PLAYS: usize = 6;
pub const COL_THEMES: usize = 7;
pub const COL_GAME_URL: usize = 8;
pub const COL_OPENING_TAGS: usize = 9;

/// Number of columns in a well-formed row
pub const COLUMN_COUNT: usize = 10;

/// One puzzle from the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleRecord {
    pub id: String,
    pub fen: String,
    pub moves: String,
    pub rating: i32,
    pub rating_deviation: i32,
    pub popularity: i32,
    pub nb_plays: i32,
    pub themes: String,
    pub game_url: String,
    pub opening_tags: String,
}

impl PuzzleRecord {
    /// Parses a single data line. Never fails; see the module docs for defaults.
    pub fn parse(line: &str) -> Self {
        RawRow::split(line).to_record()
    }
}

/// A row split into borrowed fields, before any allocation happens.
///
/// The query scan checks the cheap predicates (rating, excluded id) against a
/// `RawRow` and only materializes a [`PuzzleRecord`] for rows that survive.
#[derive(Debug)]
pub struct RawRow<'a> {
    fields: Vec<Cow<'a, str>>,
}

impl<'a> RawRow<'a> {
    /// Splits a line on commas, honouring double-quoted fields.
    ///
    /// Outer quotes are stripped and `""` inside a quoted field becomes `"`.
    /// Only fields that need unescaping are copied.
    pub fn split(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = Vec::with_capacity(COLUMN_COUNT);
        let mut start = 0;
        let mut in_quotes = false;

        for (i, b) in line.bytes().enumerate() {
            match b {
                b'"' => in_quotes = !in_quotes,
                b',' if !in_quotes => {
                    fields.push(unquote(&line[start..i]));
                    start = i + 1;
                }
                _ => {}
            }
        }
        fields.push(unquote(&line[start..]));

        Self { fields }
    }

    /// Returns the field at `index`, or an empty string when the row is short
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.as_ref()).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.field(COL_ID)
    }

    pub fn rating(&self) -> i32 {
        parse_int(self.field(COL_RATING))
    }

    /// Strict rating parse, `None` when blank or malformed
    pub fn try_rating(&self) -> Option<i32> {
        self.field(COL_RATING).trim().parse().ok()
    }

    pub fn themes(&self) -> &str {
        self.field(COL_THEMES)
    }

    pub fn opening_tags(&self) -> &str {
        self.field(COL_OPENING_TAGS)
    }

    /// Number of fields present on the line
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|f| f.is_empty())
    }

    pub fn to_record(&self) -> PuzzleRecord {
        PuzzleRecord {
            id: self.field(COL_ID).to_string(),
            fen: self.field(COL_FEN).to_string(),
            moves: self.field(COL_MOVES).to_string(),
            rating: self.rating(),
            rating_deviation: parse_int(self.field(COL_RATING_DEVIATION)),
            popularity: parse_int(self.field(COL_POPULARITY)),
            nb_plays: parse_int(self.field(COL_NB_PLAYS)),
            themes: self.field(COL_THEMES).to_string(),
            game_url: self.field(COL_GAME_URL).to_string(),
            opening_tags: self.field(COL_OPENING_TAGS).to_string(),
        }
    }
}

fn unquote(field: &str) -> Cow<'_, str> {
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) if inner.contains("\"\"") => Cow::Owned(inner.replace("\"\"", "\"")),
        Some(inner) => Cow::Borrowed(inner),
        None => Cow::Borrowed(field),
    }
}

/// Lenient integer parse: anything unparseable is `0`
pub fn parse_int(field: &str) -> i32 {
    field.trim().parse().unwrap_or(0)
}
