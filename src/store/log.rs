//! Entry log
//!
//! Append-only record log for accepted writes, and the journal's physical
//! sync target. Records are buffered in user space until [`EntryLog::sync`],
//! which is exactly the durability point the journal worker amortizes across
//! a batch.
//!
//! ## Record Format
//! ```text
//! ┌─────────┬─────────┬──────────┬─────────┐
//! │ CRC (4) │ Len (4) │ Key (16) │ Payload │
//! └─────────┴─────────┴──────────┴─────────┘
//! ```
//! CRC32 covers key + payload. A torn or corrupt record terminates replay;
//! everything before it is recovered.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::MAX_FRAME_SIZE;

use super::{EntryKey, KEY_SIZE};

/// Record header: CRC (4) + payload length (4)
const RECORD_HEADER_SIZE: usize = 8;

/// Appends entry records to the log file
pub struct EntryLog {
    writer: BufWriter<File>,
    path: PathBuf,
    appended: u64,
}

impl EntryLog {
    /// Open or create the entry log, positioned for appending
    pub fn open(path: &Path, write_buffer_size: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            writer: BufWriter::with_capacity(write_buffer_size, file),
            path: path.to_path_buf(),
            appended: 0,
        })
    }

    /// Append one record. Buffered; not durable until [`EntryLog::sync`].
    pub fn append(&mut self, key: &EntryKey, payload: &[u8]) -> Result<()> {
        let key_bytes = key.encode();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key_bytes);
        hasher.update(payload);
        let crc = hasher.finalize();

        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(&key_bytes)?;
        self.writer.write_all(payload)?;

        self.appended += 1;
        Ok(())
    }

    /// Flush buffered records and sync file data to the storage medium.
    ///
    /// This is the single physical durability operation the journal worker
    /// performs per batch.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Drop all records (called after the memtable they cover was flushed
    /// to a durable sstable)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        self.appended = 0;
        Ok(())
    }

    /// Number of records appended since open/truncate
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of an entry log replay
#[derive(Debug)]
pub struct ReplayStats {
    /// Number of records successfully recovered
    pub records_recovered: u64,

    /// True when replay stopped at a torn or corrupt tail
    pub tail_truncated: bool,
}

/// Replay all valid records from an entry log file.
///
/// Stops cleanly at the first torn or CRC-failing record: a crash mid-append
/// legitimately leaves a partial record at the tail, and nothing after it can
/// be trusted.
pub fn replay(path: &Path) -> Result<(Vec<(EntryKey, Bytes)>, ReplayStats)> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut stats = ReplayStats {
        records_recovered: 0,
        tail_truncated: false,
    };

    loop {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        match read_fully(&mut reader, &mut header) {
            ReadOutcome::Complete => {}
            ReadOutcome::Eof => break,
            ReadOutcome::Partial => {
                stats.tail_truncated = true;
                break;
            }
            ReadOutcome::Err(e) => return Err(e.into()),
        }

        let crc = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let payload_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        // A length beyond the frame cap cannot have been written by us
        if payload_len > MAX_FRAME_SIZE {
            tracing::warn!(
                "entry log replay: implausible record length {} at record {}, truncating tail",
                payload_len,
                stats.records_recovered
            );
            stats.tail_truncated = true;
            break;
        }

        let mut body = vec![0u8; KEY_SIZE + payload_len];
        match read_fully(&mut reader, &mut body) {
            ReadOutcome::Complete => {}
            ReadOutcome::Eof | ReadOutcome::Partial => {
                stats.tail_truncated = true;
                break;
            }
            ReadOutcome::Err(e) => return Err(e.into()),
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        if hasher.finalize() != crc {
            tracing::warn!(
                "entry log replay: CRC mismatch at record {}, truncating tail",
                stats.records_recovered
            );
            stats.tail_truncated = true;
            break;
        }

        let key_bytes: [u8; KEY_SIZE] = body[..KEY_SIZE].try_into().unwrap();
        let key = EntryKey::decode(&key_bytes);
        let payload = Bytes::from(body.split_off(KEY_SIZE));

        entries.push((key, payload));
        stats.records_recovered += 1;
    }

    Ok((entries, stats))
}

enum ReadOutcome {
    Complete,
    Eof,
    Partial,
    Err(std::io::Error),
}

/// Fill `buf` from the reader, distinguishing clean EOF from a torn record
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> ReadOutcome {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Partial
                };
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return ReadOutcome::Err(e),
        }
    }
    ReadOutcome::Complete
}
