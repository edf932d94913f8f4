use glob::Pattern;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::tail::read_last_line;
use super::{ShardEntry, ShardIndex};
use crate::errors::{QueryError, QueryResult};
use crate::record::RawRow;

/// Small buffer; only the header and first data row are read here
const HEAD_BUFFER_CAPACITY: usize = 8192;

/// Lists shard files directly inside `dir` whose names match `pattern`,
/// in lexical file name order.
pub fn discover_shards(dir: &Path, pattern: &str) -> QueryResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(QueryError::directory_not_found(dir));
    }

    let pattern = Pattern::new(pattern)
        .map_err(|e| QueryError::config_error(format!("invalid shard pattern: {}", e)))?;

    let mut walker = WalkBuilder::new(dir);
    walker
        .max_depth(Some(1))
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let shards: Vec<PathBuf> = walker
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .map(|entry| entry.into_path())
        .collect();

    debug!("Discovered {} shard files in {}", shards.len(), dir.display());
    Ok(shards)
}

/// Builds the rating index over every shard in `dir`.
///
/// Shards are inspected in parallel on the current rayon pool; the entry
/// order still follows discovery order. Empty or unreadable shards are left
/// out.
pub fn build_index(dir: &Path, pattern: &str) -> QueryResult<ShardIndex> {
    let started = Instant::now();
    let paths = discover_shards(dir, pattern)?;

    let entries: Vec<ShardEntry> = paths
        .par_iter()
        .filter_map(|path| match index_shard(path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable shard {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    let elapsed = started.elapsed();
    info!(
        "Indexed {} of {} shards in {} in {}",
        entries.len(),
        paths.len(),
        dir.display(),
        humantime::format_duration(elapsed)
    );

    Ok(ShardIndex::new(entries, elapsed))
}

/// Computes the rating range of one shard.
///
/// Returns `Ok(None)` for a shard with no data rows. A blank or malformed
/// first rating becomes `0`; a malformed last row reuses the minimum.
pub fn index_shard(path: &Path) -> QueryResult<Option<ShardEntry>> {
    trace!("Indexing shard {}", path.display());

    let first = match read_first_data_row(path)? {
        Some(line) => line,
        None => {
            debug!("Shard {} has no data rows, excluding", path.display());
            return Ok(None);
        }
    };

    let min_rating = RawRow::split(&first).try_rating().unwrap_or_else(|| {
        warn!(
            "Unparseable first rating in {}, using 0 as minimum",
            path.display()
        );
        0
    });

    let last = read_last_line(path).map_err(|e| QueryError::from_io(path, e))?;
    let max_rating = last
        .as_deref()
        .and_then(|line| RawRow::split(line).try_rating())
        .unwrap_or_else(|| {
            warn!(
                "Unparseable last row in {}, reusing minimum {} as maximum",
                path.display(),
                min_rating
            );
            min_rating
        });

    let size_bytes = std::fs::metadata(path)
        .map_err(|e| QueryError::from_io(path, e))?
        .len();

    Ok(Some(ShardEntry::new(
        path.to_path_buf(),
        min_rating,
        max_rating,
        size_bytes,
    )))
}

/// Reads the first non-blank line after the header
fn read_first_data_row(path: &Path) -> QueryResult<Option<String>> {
    let file = File::open(path).map_err(|e| QueryError::from_io(path, e))?;
    let mut reader = BufReader::with_capacity(HEAD_BUFFER_CAPACITY, file);
    let mut buf = Vec::with_capacity(256);

    // Header
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str =
        "PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl,OpeningTags";

    fn row(id: &str, rating: &str) -> String {
        format!("{},fen,e2e4 e7e5,{},80,90,100,fork,,", id, rating)
    }

    fn write_shard(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut content = format!("{}\n", HEADER);
        for r in rows {
            content.push_str(r);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_single_row_shard() {
        let dir = tempdir().unwrap();
        let path = write_shard(dir.path(), "a.csv", &[row("p1", "1337")]);
        let entry = index_shard(&path).unwrap().unwrap();
        assert_eq!(entry.min_rating, 1337);
        assert_eq!(entry.max_rating, 1337);
    }

    #[test]
    fn test_header_only_shard_excluded() {
        let dir = tempdir().unwrap();
        let path = write_shard(dir.path(), "empty.csv", &[]);
        assert!(index_shard(&path).unwrap().is_none());

        let blank = dir.path().join("blank.csv");
        fs::write(&blank, "").unwrap();
        assert!(index_shard(&blank).unwrap().is_none());
    }

    #[test]
    fn test_min_and_max() {
        let dir = tempdir().unwrap();
        let rows: Vec<String> = (0..500)
            .map(|i| row(&format!("p{}", i), &(800 + i).to_string()))
            .collect();
        let path = write_shard(dir.path(), "a.csv", &rows);
        let entry = index_shard(&path).unwrap().unwrap();
        assert_eq!(entry.min_rating, 800);
        assert_eq!(entry.max_rating, 1299);
    }

    #[test]
    fn test_malformed_boundaries_degrade() {
        let dir = tempdir().unwrap();
        let path = write_shard(
            dir.path(),
            "bad_first.csv",
            &[row("p1", ""), row("p2", "1500")],
        );
        let entry = index_shard(&path).unwrap().unwrap();
        assert_eq!(entry.min_rating, 0);
        assert_eq!(entry.max_rating, 1500);

        let path = write_shard(
            dir.path(),
            "bad_last.csv",
            &[row("p1", "1200"), "garbage".to_string()],
        );
        let entry = index_shard(&path).unwrap().unwrap();
        assert_eq!(entry.min_rating, 1200);
        assert_eq!(entry.max_rating, 1200);
    }

    #[test]
    fn test_discovery_is_lexical_and_filtered() {
        let dir = tempdir().unwrap();
        write_shard(dir.path(), "shard.010.csv", &[row("c", "2000")]);
        write_shard(dir.path(), "shard.002.csv", &[row("b", "1500")]);
        write_shard(dir.path(), "shard.001.csv", &[row("a", "900")]);
        fs::write(dir.path().join("README.txt"), "not a shard").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let found = discover_shards(dir.path(), "*.csv").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["shard.001.csv", "shard.002.csv", "shard.010.csv"]);
    }

    #[test]
    fn test_build_index_skips_empty() {
        let dir = tempdir().unwrap();
        write_shard(dir.path(), "1.csv", &[row("a", "800"), row("b", "1200")]);
        write_shard(dir.path(), "2.csv", &[]);
        write_shard(dir.path(), "3.csv", &[row("c", "1600"), row("d", "2000")]);

        let index = build_index(dir.path(), "*.csv").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries()[0].min_rating, 800);
        assert_eq!(index.entries()[1].max_rating, 2000);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let result = build_index(&dir.path().join("nope"), "*.csv");
        assert!(matches!(result, Err(QueryError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tempdir().unwrap();
        let result = discover_shards(dir.path(), "[");
        assert!(matches!(result, Err(QueryError::ConfigError(_))));
    }
}
