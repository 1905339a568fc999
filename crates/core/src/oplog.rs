// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable, append-only operation log.
//!
//! Operations are stored as JSONL in segment files named
//! `data-<first_seq>.log`. Each append is written and fsynced before the
//! sequence number is published, so a crash right after `append` returns
//! never loses the operation.
//!
//! The log has one writer ([`OpLog`]) and one reader ([`OpLogReader`]).
//! The reader snapshots the published tail when a read starts and never
//! looks past it, so it can run concurrently with appends without seeing a
//! half-written line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::op::{Operation, PendingOperation, Seq};

const SEGMENT_PREFIX: &str = "data-";
const SEGMENT_SUFFIX: &str = ".log";

/// Default size after which a new segment is started (64 MiB).
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Returns the path of the segment starting at `first_seq`.
pub fn segment_path(dir: &Path, first_seq: Seq) -> PathBuf {
    dir.join(format!("{SEGMENT_PREFIX}{first_seq}{SEGMENT_SUFFIX}"))
}

/// Lists the first sequence numbers of all segments in `dir`, ascending.
pub fn list_segments(dir: &Path) -> Result<Vec<Seq>> {
    let mut segments = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(segments),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(seq) = name
            .strip_prefix(SEGMENT_PREFIX)
            .and_then(|rest| rest.strip_suffix(SEGMENT_SUFFIX))
            .and_then(|num| num.parse::<Seq>().ok())
        {
            segments.push(seq);
        }
    }

    segments.sort_unstable();
    Ok(segments)
}

/// Returns the highest sequence number stored in `dir` (0 if none).
///
/// Only reads: a torn final record is ignored rather than truncated, so
/// this is safe while another process owns the log.
pub fn peek_tail(dir: &Path) -> Result<Seq> {
    let Some(&first_seq) = list_segments(dir)?.last() else {
        return Ok(0);
    };
    let path = segment_path(dir, first_seq);
    let last = scan_segment(&path, first_seq, true, false)?;
    Ok(last.unwrap_or(first_seq.saturating_sub(1)))
}

/// The segment currently being appended to.
struct ActiveSegment {
    path: PathBuf,
    file: File,
    bytes: u64,
}

/// Writer half of the operation log.
pub struct OpLog {
    dir: PathBuf,
    max_segment_bytes: u64,
    active: ActiveSegment,
    tail: Arc<AtomicU64>,
    first_available: Seq,
    /// Set when a partial record could not be removed; reopening recovers.
    poisoned: bool,
}

impl OpLog {
    /// Opens or creates a log in `dir`, recovering its tail from disk.
    ///
    /// A torn final line in the last segment (an append that crashed before
    /// returning) is truncated. Any other damage is reported as
    /// [`Error::CorruptState`].
    pub fn open(dir: impl AsRef<Path>, max_segment_bytes: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::persistence(&dir, e))?;

        let segments = list_segments(&dir)?;
        let mut tail: Seq = 0;
        let mut first_available: Seq = 1;

        for (idx, &first_seq) in segments.iter().enumerate() {
            let is_last = idx + 1 == segments.len();
            let path = segment_path(&dir, first_seq);
            if idx == 0 {
                first_available = first_seq;
            } else if first_seq != tail + 1 {
                return Err(Error::corrupt(
                    &path,
                    format!("segment starts at {first_seq}, expected {}", tail + 1),
                ));
            }
            match scan_segment(&path, first_seq, is_last, is_last)? {
                Some(last) => tail = last,
                None if is_last => tail = first_seq.saturating_sub(1),
                None => {
                    return Err(Error::corrupt(&path, "empty segment in the middle of the log"));
                }
            }
        }

        let active_first = segments.last().copied().unwrap_or(1);
        let path = segment_path(&dir, active_first);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::persistence(&path, e))?;
        let bytes = file
            .metadata()
            .map_err(|e| Error::persistence(&path, e))?
            .len();

        if segments.is_empty() {
            sync_dir(&dir)?;
        }

        tracing::debug!(
            dir = %dir.display(),
            tail,
            segments = segments.len(),
            "opened operation log"
        );

        Ok(OpLog {
            dir,
            max_segment_bytes: max_segment_bytes.max(1),
            active: ActiveSegment { path, file, bytes },
            tail: Arc::new(AtomicU64::new(tail)),
            first_available,
            poisoned: false,
        })
    }

    /// Appends an operation and returns its sequence number.
    ///
    /// Returns only once the record has been flushed to stable storage.
    pub fn append(&mut self, pending: PendingOperation) -> Result<Seq> {
        if self.poisoned {
            return Err(Error::persistence(
                &self.active.path,
                std::io::Error::other("a failed append left a partial record; reopen the log"),
            ));
        }
        let seq = self.tail() + 1;
        let op = pending.into_operation(seq, Utc::now());
        let mut line = serde_json::to_string(&op)?;
        line.push('\n');

        if self.active.bytes > 0 && self.active.bytes + line.len() as u64 > self.max_segment_bytes
        {
            self.rotate(seq)?;
        }

        if let Err(e) = self
            .active
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.active.file.sync_data())
        {
            // Drop whatever part of the line made it to disk so the next
            // append does not land behind a torn record.
            let rollback = self.active.file.set_len(self.active.bytes);
            return Err(self.failed_append(e, rollback));
        }

        self.active.bytes += line.len() as u64;
        self.tail.store(seq, Ordering::Release);
        Ok(seq)
    }

    /// Builds the error of a failed append, poisoning the log when the
    /// partial record could not be removed.
    fn failed_append(&mut self, error: std::io::Error, rollback: std::io::Result<()>) -> Error {
        if let Err(rollback_error) = rollback {
            tracing::error!(
                segment = %self.active.path.display(),
                error = %rollback_error,
                "cannot remove a partially written record, refusing further appends"
            );
            self.poisoned = true;
        }
        Error::persistence(&self.active.path, error)
    }

    fn rotate(&mut self, first_seq: Seq) -> Result<()> {
        let path = segment_path(&self.dir, first_seq);
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::persistence(&path, e))?;
        sync_dir(&self.dir)?;
        tracing::debug!(segment = %path.display(), "started new log segment");
        self.active = ActiveSegment {
            path,
            file,
            bytes: 0,
        };
        Ok(())
    }

    /// Returns the highest appended sequence number (0 if empty).
    pub fn tail(&self) -> Seq {
        self.tail.load(Ordering::Acquire)
    }

    /// Returns the lowest sequence number still stored when the log was opened.
    pub fn first_available(&self) -> Seq {
        self.first_available
    }

    /// Returns the directory holding the segments.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the reader half of the log.
    ///
    /// The log supports a single reader; create one per consumer.
    pub fn reader(&self) -> OpLogReader {
        OpLogReader {
            dir: self.dir.clone(),
            tail: Arc::clone(&self.tail),
            cursor: None,
        }
    }
}

/// Position of the reader within one segment file.
struct Cursor {
    segment: Seq,
    reader: BufReader<File>,
    next_seq: Seq,
    peeked: Option<(Operation, usize)>,
}

impl Cursor {
    fn open(dir: &Path, segment: Seq) -> Result<Self> {
        let file = File::open(segment_path(dir, segment))?;
        Ok(Cursor {
            segment,
            reader: BufReader::new(file),
            next_seq: segment,
            peeked: None,
        })
    }

    /// Reads the next raw line; `None` at end of file.
    fn read_line(&mut self, dir: &Path) -> Result<Option<(Operation, usize)>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            let op: Operation = serde_json::from_str(line.trim_end()).map_err(|e| {
                Error::corrupt(
                    segment_path(dir, self.segment),
                    format!("malformed operation after seq {}: {e}", self.next_seq.saturating_sub(1)),
                )
            })?;
            return Ok(Some((op, n)));
        }
    }
}

/// Reader half of the operation log.
pub struct OpLogReader {
    dir: PathBuf,
    tail: Arc<AtomicU64>,
    cursor: Option<Cursor>,
}

impl OpLogReader {
    /// Returns the highest appended sequence number.
    pub fn current_tail(&self) -> Seq {
        self.tail.load(Ordering::Acquire)
    }

    /// Returns the directory holding the segments.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads operations starting at `from`, bounded by item count and bytes.
    ///
    /// Returns an empty batch when nothing at or after `from` has been
    /// appended. A non-empty result always holds at least one operation,
    /// even if that single operation exceeds `max_bytes`.
    pub fn read_batch(&mut self, from: Seq, max_items: usize, max_bytes: usize) -> Result<Batch> {
        let tail = self.current_tail();
        let mut batch = Batch::default();
        if from > tail || max_items == 0 {
            return Ok(batch);
        }

        self.position(from)?;
        while batch.len() < max_items {
            let Some((op, size)) = self.next_record(tail)? else {
                break;
            };
            if !batch.is_empty() && batch.bytes() + size > max_bytes {
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.next_seq = op.seq;
                    cursor.peeked = Some((op, size));
                }
                break;
            }
            batch.push(op, size);
        }
        Ok(batch)
    }

    /// Returns a lazy iterator over operations from `from` up to the tail
    /// observed now. Calling it again restarts from any position.
    pub fn iter_from(&mut self, from: Seq) -> LogIter<'_> {
        let tail = self.current_tail();
        let start = if from > tail {
            Ok(())
        } else {
            self.position(from)
        };
        LogIter {
            reader: self,
            tail,
            from,
            pending_error: start.err(),
        }
    }

    /// Removes segments whose operations are all acknowledged.
    ///
    /// The last segment is never removed. Returns the number removed;
    /// failures to delete are logged and skipped.
    pub fn trim(&mut self, acked: Seq) -> Result<usize> {
        let segments = list_segments(&self.dir)?;
        let mut removed = 0;
        for pair in segments.windows(2) {
            if pair[1] > acked + 1 {
                break;
            }
            let path = segment_path(&self.dir, pair[0]);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(segment = %path.display(), error = %e, "cannot remove log segment");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, acked, "trimmed acknowledged log segments");
        }
        Ok(removed)
    }

    /// Moves the cursor so the next record returned has seq >= `from`.
    fn position(&mut self, from: Seq) -> Result<()> {
        if let Some(cursor) = &self.cursor {
            if cursor.next_seq == from {
                return Ok(());
            }
        }

        let segments = list_segments(&self.dir)?;
        let start = segments
            .iter()
            .rev()
            .find(|&&first| first <= from)
            .or(segments.first())
            .copied();
        let Some(start) = start else {
            return Err(Error::corrupt(&self.dir, "operation log has no segments"));
        };

        let mut cursor = Cursor::open(&self.dir, start)?;
        while cursor.next_seq < from {
            match cursor.read_line(&self.dir)? {
                Some((op, size)) => {
                    if op.seq >= from {
                        cursor.next_seq = op.seq;
                        cursor.peeked = Some((op, size));
                        break;
                    }
                    cursor.next_seq = op.seq + 1;
                }
                None => break,
            }
        }
        self.cursor = Some(cursor);
        Ok(())
    }

    /// Returns the next record not beyond `tail`, crossing segments.
    fn next_record(&mut self, tail: Seq) -> Result<Option<(Operation, usize)>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        if let Some((op, size)) = cursor.peeked.take() {
            if op.seq > tail {
                cursor.peeked = Some((op, size));
                return Ok(None);
            }
            cursor.next_seq = op.seq + 1;
            return Ok(Some((op, size)));
        }
        if cursor.next_seq > tail {
            return Ok(None);
        }

        loop {
            let Some(cursor) = self.cursor.as_mut() else {
                return Ok(None);
            };
            match cursor.read_line(&self.dir)? {
                Some((op, size)) => {
                    if op.seq != cursor.next_seq {
                        return Err(Error::corrupt(
                            segment_path(&self.dir, cursor.segment),
                            format!("expected seq {}, found {}", cursor.next_seq, op.seq),
                        ));
                    }
                    cursor.next_seq = op.seq + 1;
                    return Ok(Some((op, size)));
                }
                None => {
                    let current = cursor.segment;
                    let expected = cursor.next_seq;
                    let next = list_segments(&self.dir)?
                        .into_iter()
                        .find(|&first| first > current);
                    let Some(next) = next else {
                        return Ok(None);
                    };
                    if next != expected {
                        return Err(Error::corrupt(
                            segment_path(&self.dir, next),
                            format!("segment starts at {next}, expected {expected}"),
                        ));
                    }
                    self.cursor = Some(Cursor::open(&self.dir, next)?);
                }
            }
        }
    }
}

/// Lazy iterator returned by [`OpLogReader::iter_from`].
pub struct LogIter<'a> {
    reader: &'a mut OpLogReader,
    tail: Seq,
    from: Seq,
    pending_error: Option<Error>,
}

impl Iterator for LogIter<'_> {
    type Item = Result<Operation>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            self.from = Seq::MAX;
            return Some(Err(e));
        }
        if self.from > self.tail {
            return None;
        }
        match self.reader.next_record(self.tail) {
            Ok(Some((op, _))) => Some(Ok(op)),
            Ok(None) => None,
            Err(e) => {
                self.from = Seq::MAX;
                Some(Err(e))
            }
        }
    }
}

enum Line {
    Op(Operation),
    Blank,
    Torn,
    Malformed,
}

/// Validates one segment and returns its last sequence number.
///
/// For the last segment a torn trailing record is skipped, and truncated
/// away when `repair` is set.
fn scan_segment(path: &Path, first_seq: Seq, is_last: bool, repair: bool) -> Result<Option<Seq>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(repair)
        .open(path)
        .map_err(|e| Error::corrupt(path, format!("cannot open segment: {e}")))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::corrupt(path, format!("cannot read segment: {e}")))?;

    let mut last: Option<Seq> = None;
    let mut offset = 0usize;
    while offset < content.len() {
        let end = content[offset..].iter().position(|&b| b == b'\n');
        let (line, next_offset, terminated) = match end {
            Some(pos) => (&content[offset..offset + pos], offset + pos + 1, true),
            None => (&content[offset..], content.len(), false),
        };

        let record = if !terminated {
            Line::Torn
        } else {
            match std::str::from_utf8(line) {
                Ok(l) if l.trim().is_empty() => Line::Blank,
                Ok(l) => serde_json::from_str::<Operation>(l).map_or(Line::Malformed, Line::Op),
                Err(_) => Line::Malformed,
            }
        };

        match record {
            Line::Op(op) => {
                let expected = last.map_or(first_seq, |l| l + 1);
                if op.seq != expected {
                    return Err(Error::corrupt(
                        path,
                        format!("expected seq {expected}, found {}", op.seq),
                    ));
                }
                last = Some(op.seq);
            }
            Line::Blank => {}
            Line::Torn | Line::Malformed => {
                let is_tail_record = next_offset >= content.len();
                if !(is_last && is_tail_record) {
                    return Err(Error::corrupt(
                        path,
                        format!("malformed record at byte {offset}"),
                    ));
                }
                if !repair {
                    break;
                }
                tracing::warn!(
                    segment = %path.display(),
                    offset,
                    "truncating torn record left by an interrupted append"
                );
                file.set_len(offset as u64)
                    .and_then(|()| file.sync_data())
                    .map_err(|e| Error::persistence(path, e))?;
                break;
            }
        }
        offset = next_offset;
    }
    Ok(last)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::persistence(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "oplog_tests.rs"]
mod tests;
