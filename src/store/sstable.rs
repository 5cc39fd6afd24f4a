//! Sstable - immutable on-disk sorted entry storage
//!
//! Entry keys are always exactly 16 bytes, so neither the data block nor the
//! index block carries key lengths.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "BVLT" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [Key (16)][PayloadLen: u32 (4)][Payload]              │
//! │   ... repeated for each entry, sorted by key ...        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [Key (16)][Offset: u64 (8)]                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Result, VaultError};

use super::{EntryKey, KEY_SIZE};

/// Magic bytes identifying a bookvault sstable file
const MAGIC: &[u8; 4] = b"BVLT";

/// Current sstable format version
const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8)
const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4)
const FOOTER_SIZE: u64 = 16;

/// Size of one index record: Key (16) + Offset (8)
const INDEX_RECORD_SIZE: usize = KEY_SIZE + 8;

// =============================================================================
// Metadata
// =============================================================================

/// Lightweight metadata describing a finished sstable
#[derive(Debug, Clone)]
pub struct SstableMeta {
    pub path: PathBuf,
    pub entry_count: u64,
    pub min_key: EntryKey,
    pub max_key: EntryKey,
    pub file_size: u64,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for creating new sstables from sorted entries
pub struct SstableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    current_offset: u64,
    index: Vec<(EntryKey, u64)>,
    min_key: Option<EntryKey>,
    max_key: Option<EntryKey>,
    data_hasher: crc32fast::Hasher,
}

impl SstableBuilder {
    /// Create a new sstable builder
    ///
    /// Writes the header immediately; call `add()` in sorted key order, then
    /// `finish()` to write the index and footer.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // Placeholder for entry count

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            min_key: None,
            max_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add an entry (must be called in sorted key order)
    pub fn add(&mut self, key: EntryKey, payload: &[u8]) -> Result<()> {
        self.index.push((key, self.current_offset));

        if self.min_key.is_none() {
            self.min_key = Some(key);
        }
        self.max_key = Some(key);

        let key_bytes = key.encode();
        let len_bytes = (payload.len() as u32).to_le_bytes();

        self.writer.write_all(&key_bytes)?;
        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(payload)?;

        self.data_hasher.update(&key_bytes);
        self.data_hasher.update(&len_bytes);
        self.data_hasher.update(payload);

        self.current_offset += (KEY_SIZE + 4 + payload.len()) as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: write index block, footer, and return metadata
    pub fn finish(mut self) -> Result<SstableMeta> {
        let index_offset = self.current_offset;

        for (key, offset) in &self.index {
            self.writer.write_all(&key.encode())?;
            self.writer.write_all(&offset.to_le_bytes())?;
        }

        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?; // Padding for alignment

        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self.writer.into_inner().map_err(|e| {
            VaultError::Storage(format!("failed to flush sstable: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        let min_key = self
            .min_key
            .ok_or_else(|| VaultError::Storage("empty sstable".to_string()))?;
        let max_key = self
            .max_key
            .ok_or_else(|| VaultError::Storage("empty sstable".to_string()))?;

        Ok(SstableMeta {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reader for sstable files with an in-memory index for O(log n) lookups
pub struct SstableReader {
    file: BufReader<File>,
    index: BTreeMap<EntryKey, u64>,
    entry_count: u64,
}

impl SstableReader {
    /// Open an sstable for reading
    ///
    /// Loads the entire index into memory for fast lookups.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(VaultError::Storage(format!(
                "invalid sstable magic: expected BVLT, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(VaultError::Storage(format!(
                "unsupported sstable version: {}",
                version
            )));
        }

        let entry_count = u64::from_le_bytes(header[6..14].try_into().unwrap());

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let _data_crc = u32::from_le_bytes(footer[8..12].try_into().unwrap());

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(VaultError::Storage(format!(
                "invalid sstable index offset: {}",
                index_offset
            )));
        }

        // Load index into memory
        let mut index = BTreeMap::new();
        file.seek(SeekFrom::Start(index_offset))?;

        let index_block_size = (file_size - FOOTER_SIZE - index_offset) as usize;
        let mut index_data = vec![0u8; index_block_size];
        file.read_exact(&mut index_data)?;

        let mut pos = 0;
        while pos + INDEX_RECORD_SIZE <= index_data.len() {
            let key_bytes: [u8; KEY_SIZE] =
                index_data[pos..pos + KEY_SIZE].try_into().unwrap();
            let offset = u64::from_le_bytes(
                index_data[pos + KEY_SIZE..pos + INDEX_RECORD_SIZE]
                    .try_into()
                    .unwrap(),
            );
            index.insert(EntryKey::decode(&key_bytes), offset);
            pos += INDEX_RECORD_SIZE;
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            file: BufReader::new(file),
            index,
            entry_count,
        })
    }

    /// Get a payload by key — O(log n) via the in-memory index.
    ///
    /// Returns `Ok(None)` when the key is not in this sstable.
    pub fn get(&mut self, key: &EntryKey) -> Result<Option<Bytes>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; KEY_SIZE + 4];
        self.file.read_exact(&mut header)?;

        let stored: [u8; KEY_SIZE] = header[..KEY_SIZE].try_into().unwrap();
        if EntryKey::decode(&stored) != *key {
            return Err(VaultError::Storage(format!(
                "sstable index mismatch at offset {}: expected key {}",
                offset, key
            )));
        }

        let payload_len =
            u32::from_le_bytes(header[KEY_SIZE..KEY_SIZE + 4].try_into().unwrap()) as usize;

        let mut payload = vec![0u8; payload_len];
        self.file.read_exact(&mut payload)?;

        Ok(Some(Bytes::from(payload)))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Smallest key in this sstable
    pub fn min_key(&self) -> Option<EntryKey> {
        self.index.keys().next().copied()
    }

    /// Largest key in this sstable
    pub fn max_key(&self) -> Option<EntryKey> {
        self.index.keys().next_back().copied()
    }

    /// Quick check if a key might be in this sstable (range check)
    pub fn might_contain(&self, key: &EntryKey) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => *key >= min && *key <= max,
            _ => false, // Empty sstable
        }
    }
}
