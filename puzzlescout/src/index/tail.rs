use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// First trailing block read when looking for a shard's last row
pub(crate) const INITIAL_TAIL_BLOCK: u64 = 1024;

/// Reads the last non-empty line of a file without reading the whole file.
///
/// Reads a trailing block of [`INITIAL_TAIL_BLOCK`] bytes and doubles it
/// until the block holds at least two newlines and a complete last line, or
/// until the block covers the entire file. Returns `None` for a file with no
/// non-empty line.
pub fn read_last_line(path: &Path) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(None);
    }

    let mut block = INITIAL_TAIL_BLOCK;
    let mut buf = Vec::new();
    loop {
        let len = block.min(size);
        let whole_file = len == size;

        file.seek(SeekFrom::Start(size - len))?;
        buf.resize(len as usize, 0);
        file.read_exact(&mut buf)?;
        trace!("Read {} trailing bytes of {}", len, path.display());

        let newlines = buf.iter().filter(|&&b| b == b'\n').count();
        if newlines >= 2 || whole_file {
            if let Some(line) = last_complete_line(&buf, whole_file) {
                return Ok(Some(line));
            }
            if whole_file {
                return Ok(None);
            }
        }

        block = block.saturating_mul(2);
    }
}

/// Last non-empty line in `buf`. Unless `buf` is the whole file its first
/// segment may be cut mid-line, so it never counts.
fn last_complete_line(buf: &[u8], whole_file: bool) -> Option<String> {
    let text = String::from_utf8_lossy(buf);
    let mut segments: Vec<&str> = text.split('\n').collect();
    if !whole_file {
        segments.remove(0);
    }
    segments
        .into_iter()
        .rev()
        .map(|s| s.trim_end_matches('\r'))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_small_file_reads_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.csv");
        fs::write(&path, "header\nrow1\nrow2\n").unwrap();
        assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("row2"));
    }

    #[test]
    fn test_no_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noeol.csv");
        fs::write(&path, "header\nrow1\r\nrow2").unwrap();
        assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("row2"));
    }

    #[test]
    fn test_trailing_blank_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.csv");
        fs::write(&path, "header\nrow1\n\n\n").unwrap();
        assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("row1"));
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert_eq!(read_last_line(&path).unwrap(), None);
    }

    #[test]
    fn test_large_file_only_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("large.csv");
        let mut content = String::from("header\n");
        for i in 0..10_000 {
            content.push_str(&format!("row{},{}\n", i, "x".repeat(40)));
        }
        fs::write(&path, &content).unwrap();
        let last = read_last_line(&path).unwrap().unwrap();
        assert!(last.starts_with("row9999,"));
    }

    #[test]
    fn test_last_line_longer_than_initial_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        let long_row = format!("last,{}", "y".repeat(5000));
        fs::write(&path, format!("header\n{}\n{}\n", "z".repeat(3000), long_row)).unwrap();
        assert_eq!(read_last_line(&path).unwrap(), Some(long_row));
    }

    #[test]
    fn test_partial_first_segment_ignored() {
        let buf = b"tial_row\nfull_row\n";
        assert_eq!(last_complete_line(buf, false).as_deref(), Some("full_row"));
        let buf = b"tial_row\n\n";
        assert_eq!(last_complete_line(buf, false), None);
        assert_eq!(last_complete_line(buf, true).as_deref(), Some("tial_row"));
    }
}
