// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Durable message log.
//!
//! # Format Overview
//!
//! ```text
//! +---------------------------------------------------------+
//! |              File Header: Magic (8) | Version (4)       |
//! +---------------------------------------------------------+
//! |                    Record 0                             |
//! |  ts_utc_ns (8) | topic_len (2) | type_len (2) |         |
//! |  payload_len (4) | topic (var) | type (var) | payload   |
//! +---------------------------------------------------------+
//! |                    Record 1                             |
//! |  ...                                                    |
//! +---------------------------------------------------------+
//! ```
//!
//! Records are append-only and the header is fixed, so a crashed recording is
//! readable up to its last complete record. All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Magic bytes: "TETHRLOG"
pub const MAGIC: [u8; 8] = *b"TETHRLOG";

/// Current log format version.
pub const FORMAT_VERSION: u32 = 1;

/// Log errors.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid log file: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("{field} too large for a log record ({len} bytes)")]
    RecordTooLarge { field: &'static str, len: usize },
}

/// How [`LogFile::open`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate, then write a fresh header.
    Write,
    /// Open an existing log, validate its header, and append.
    Append,
}

/// Append sink for recorded messages.
pub trait Log: Send {
    /// Durably append one message. Timestamps are UTC nanoseconds.
    fn insert_message(
        &mut self,
        ts_utc_ns: i64,
        topic: &str,
        type_name: &str,
        payload: &[u8],
    ) -> Result<(), LogError>;
}

/// File-backed [`Log`] writer.
pub struct LogFile {
    writer: BufWriter<File>,
    path: PathBuf,
    message_count: u64,
}

impl LogFile {
    /// Open `path` for recording.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let (file, message_count) = match mode {
            OpenMode::Write => {
                let mut file = File::create(&path)?;
                file.write_all(&MAGIC)?;
                file.write_u32::<LittleEndian>(FORMAT_VERSION)?;
                (file, 0)
            }
            OpenMode::Append => {
                // Validate the header before blindly appending to it.
                let count = LogReader::open(&path)?.count_records()?;
                let mut file = OpenOptions::new().write(true).open(&path)?;
                file.seek(SeekFrom::End(0))?;
                (file, count)
            }
        };

        debug!(path = %path.display(), ?mode, "opened message log");

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            message_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Messages appended so far (including pre-existing ones in append mode).
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Log for LogFile {
    fn insert_message(
        &mut self,
        ts_utc_ns: i64,
        topic: &str,
        type_name: &str,
        payload: &[u8],
    ) -> Result<(), LogError> {
        if topic.len() > u16::MAX as usize {
            return Err(LogError::RecordTooLarge {
                field: "topic",
                len: topic.len(),
            });
        }
        if type_name.len() > u16::MAX as usize {
            return Err(LogError::RecordTooLarge {
                field: "type name",
                len: type_name.len(),
            });
        }
        if payload.len() > u32::MAX as usize {
            return Err(LogError::RecordTooLarge {
                field: "payload",
                len: payload.len(),
            });
        }

        self.writer.write_i64::<LittleEndian>(ts_utc_ns)?;
        self.writer.write_u16::<LittleEndian>(topic.len() as u16)?;
        self.writer
            .write_u16::<LittleEndian>(type_name.len() as u16)?;
        self.writer.write_u32::<LittleEndian>(payload.len() as u32)?;
        self.writer.write_all(topic.as_bytes())?;
        self.writer.write_all(type_name.as_bytes())?;
        self.writer.write_all(payload)?;

        self.message_count += 1;
        Ok(())
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(path = %self.path.display(), %err, "failed to flush message log");
        }
    }
}

/// One recorded message read back from a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ts_utc_ns: i64,
    pub topic: String,
    pub type_name: String,
    pub payload: Vec<u8>,
}

/// Sequential reader for a log file.
pub struct LogReader {
    reader: BufReader<File>,
}

impl LogReader {
    /// Open `path` and validate its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(LogError::InvalidFormat("bad magic".into()));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(LogError::VersionMismatch {
                expected: FORMAT_VERSION,
                got: version,
            });
        }

        Ok(Self { reader })
    }

    /// Read the next record, or `None` at a clean end of file.
    pub fn read_record(&mut self) -> Result<Option<Record>, LogError> {
        let ts_utc_ns = match self.reader.read_i64::<LittleEndian>() {
            Ok(ts) => ts,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let topic_len = self.reader.read_u16::<LittleEndian>()? as usize;
        let type_len = self.reader.read_u16::<LittleEndian>()? as usize;
        let payload_len = self.reader.read_u32::<LittleEndian>()? as usize;

        let mut topic = vec![0u8; topic_len];
        self.reader.read_exact(&mut topic)?;
        let topic = String::from_utf8(topic)
            .map_err(|_| LogError::InvalidFormat("topic is not UTF-8".into()))?;

        let mut type_name = vec![0u8; type_len];
        self.reader.read_exact(&mut type_name)?;
        let type_name = String::from_utf8(type_name)
            .map_err(|_| LogError::InvalidFormat("type name is not UTF-8".into()))?;

        let mut payload = vec![0u8; payload_len];
        self.reader.read_exact(&mut payload)?;

        Ok(Some(Record {
            ts_utc_ns,
            topic,
            type_name,
            payload,
        }))
    }

    fn count_records(mut self) -> Result<u64, LogError> {
        let mut count = 0;
        while self.read_record()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Iterate over all remaining records.
    pub fn records(self) -> RecordIterator {
        RecordIterator { reader: self }
    }
}

/// Iterator over the records of a log file.
pub struct RecordIterator {
    reader: LogReader,
}

impl Iterator for RecordIterator {
    type Item = Result<Record, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("capture.tlog");

        {
            let mut log = LogFile::open(&path, OpenMode::Write).expect("open");
            for i in 0..25i64 {
                log.insert_message(i * 1_000, "scan", "sensor.LaserScan", &[i as u8; 4])
                    .expect("insert");
            }
            assert_eq!(log.message_count(), 25);
        }

        let records: Vec<_> = LogReader::open(&path)
            .expect("open reader")
            .records()
            .collect::<Result<_, _>>()
            .expect("read records");

        assert_eq!(records.len(), 25);
        assert_eq!(records[0].ts_utc_ns, 0);
        assert_eq!(records[24].ts_utc_ns, 24_000);
        assert_eq!(records[7].topic, "scan");
        assert_eq!(records[7].type_name, "sensor.LaserScan");
        assert_eq!(records[7].payload, vec![7u8; 4]);
    }

    #[test]
    fn test_empty_log_reads_no_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.tlog");
        drop(LogFile::open(&path, OpenMode::Write).expect("open"));

        let mut reader = LogReader::open(&path).expect("open reader");
        assert!(reader.read_record().expect("read").is_none());
    }

    #[test]
    fn test_append_continues_existing_log() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("capture.tlog");

        {
            let mut log = LogFile::open(&path, OpenMode::Write).expect("open write");
            log.insert_message(1, "a", "T", b"one").expect("insert");
        }
        {
            let mut log = LogFile::open(&path, OpenMode::Append).expect("open append");
            assert_eq!(log.message_count(), 1);
            log.insert_message(2, "b", "T", b"two").expect("insert");
            assert_eq!(log.message_count(), 2);
        }

        let records: Vec<_> = LogReader::open(&path)
            .expect("open reader")
            .records()
            .collect::<Result<_, _>>()
            .expect("read");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].topic, "b");
        assert_eq!(records[1].payload, b"two");
    }

    #[test]
    fn test_reader_rejects_bad_magic() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("not-a-log");
        std::fs::write(&path, b"definitely not a log file").expect("write");

        assert!(matches!(
            LogReader::open(&path),
            Err(LogError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_reader_rejects_version_mismatch() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("future.tlog");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&99u32.to_le_bytes());
        std::fs::write(&path, bytes).expect("write");

        assert!(matches!(
            LogReader::open(&path),
            Err(LogError::VersionMismatch { expected: 1, got: 99 })
        ));
    }

    #[test]
    fn test_negative_timestamps_survive() {
        // A wall clock behind the monotonic epoch yields negative offsets.
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("neg.tlog");

        {
            let mut log = LogFile::open(&path, OpenMode::Write).expect("open");
            log.insert_message(-42, "t", "T", b"").expect("insert");
        }

        let mut reader = LogReader::open(&path).expect("open reader");
        let record = reader.read_record().expect("read").expect("record");
        assert_eq!(record.ts_utc_ns, -42);
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_oversized_topic_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("big.tlog");
        let mut log = LogFile::open(&path, OpenMode::Write).expect("open");

        let huge = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            log.insert_message(0, &huge, "T", b""),
            Err(LogError::RecordTooLarge { field: "topic", .. })
        ));
        assert_eq!(log.message_count(), 0);
    }
}
