//! Incremental reader for append-only session logs
//!
//! A `LogReader` remembers how far into the file it has consumed, so
//! repeated [`LogReader::read_new`] calls only return records appended
//! since the previous successful read. Lines are read without a length
//! cap, so multi-megabyte records are returned intact.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::record::Record;
use super::HistoryError;

#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
    offset: u64,
}

impl LogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset just past the last consumed line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read every well-formed record, restarting from the beginning of the file.
    pub fn read_all(&mut self) -> Result<Vec<Record>, HistoryError> {
        self.offset = 0;
        self.read_new()
    }

    /// Read records appended since the last successful read.
    ///
    /// A missing file yields no records. The offset only moves when the
    /// whole read succeeds; an I/O error leaves it where it was.
    pub fn read_new(&mut self) -> Result<Vec<Record>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HistoryError::io(&self.path, e)),
        };

        let len = file
            .metadata()
            .map_err(|e| HistoryError::io(&self.path, e))?
            .len();
        if len < self.offset {
            // Truncated or replaced underneath us
            tracing::debug!(path = %self.path.display(), offset = self.offset, len, "Log shrank; rereading from start");
            self.offset = 0;
        }

        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.offset))
            .map_err(|e| HistoryError::io(&self.path, e))?;

        let (records, consumed) =
            parse_lines(&mut reader).map_err(|e| HistoryError::io(&self.path, e))?;
        self.offset += consumed;
        Ok(records)
    }
}

/// Parse newline-terminated records, returning them with the number of bytes consumed.
///
/// A trailing fragment without a newline is only consumed when it already
/// parses; otherwise it is assumed to be a record still being written and
/// is left for the next read.
fn parse_lines<R: BufRead>(reader: &mut R) -> io::Result<(Vec<Record>, u64)> {
    let mut records = Vec::new();
    let mut consumed = 0u64;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }

        let terminated = line.last() == Some(&b'\n');
        let parsed = parse_line(&line);
        if !terminated && parsed.is_none() {
            break;
        }

        consumed += n as u64;
        if let Some(record) = parsed {
            records.push(record);
        }
    }

    Ok((records, consumed))
}

fn parse_line(line: &[u8]) -> Option<Record> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Record>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::trace!(error = %e, "Skipping malformed log line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::RecordKind;
    use std::io::Write;

    fn user_line(id: &str, text: &str) -> String {
        format!(
            r#"{{"type":"user.message","id":"{id}","timestamp":"2025-01-01T00:00:00Z","data":{{"content":"{text}"}}}}"#
        )
    }

    fn append(path: &Path, contents: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = LogReader::new(dir.path().join("events.jsonl"));
        assert!(reader.read_all().unwrap().is_empty());
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_read_new_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        append(&path, &format!("{}\n{}\n", user_line("a", "one"), user_line("b", "two")));

        let mut reader = LogReader::new(&path);
        assert_eq!(reader.read_new().unwrap().len(), 2);
        assert!(reader.read_new().unwrap().is_empty());

        append(&path, &format!("{}\n", user_line("c", "three")));
        let fresh = reader.read_new().unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "c");

        let all = reader.read_all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(reader.read_new().unwrap().is_empty());
    }

    #[test]
    fn test_skips_bad_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let contents = format!(
            "{}\n\n{{not json\n{}\n{}\n",
            user_line("1", "a"),
            user_line("2", "b"),
            user_line("3", "c")
        );
        append(&path, &contents);

        let records = LogReader::new(&path).read_all().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(records.iter().all(|r| r.kind == RecordKind::UserMessage));
    }

    #[test]
    fn test_partial_trailing_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let full = user_line("x", "split");
        let (head, tail) = full.split_at(20);

        append(&path, &format!("{}\n{}", user_line("w", "ok"), head));
        let mut reader = LogReader::new(&path);
        assert_eq!(reader.read_new().unwrap().len(), 1);

        append(&path, &format!("{tail}\n"));
        let rest = reader.read_new().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "x");
    }

    #[test]
    fn test_large_line_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let big = "x".repeat(3 * 1024 * 1024);
        append(&path, &format!("{}\n", user_line("big", &big)));

        let records = LogReader::new(&path).read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data["content"].as_str().unwrap().len(), big.len());
    }
}
