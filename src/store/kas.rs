//! Keyed append store: write-once `string → bytes` with a trailing key table.
//!
//! Layout:
//!
//! ```text
//! [u64 table offset (patched at finish)]
//! [records: u32 key len, key bytes, u32 value len, value bytes]*
//! [table: u64 count, (u32 key len, key bytes, u64 value offset, u32 value len)*]
//! ```
//!
//! The compile phase appends records through [`KasWriter`]; `finish()`
//! writes the table, patches the header and fsyncs. The query phase
//! memory-maps the file through [`KasReader`] and loads the table into a
//! hash map for O(1) average lookups. Duplicate keys are appended as-is;
//! the last occurrence wins at read time (callers aggregate in memory and
//! never insert duplicates).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::codec::{self, ByteReader};
use crate::error::{StoreError, StoreResult};

const HEADER_SIZE: u64 = 8;

fn io_err(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source: e,
    }
}

/// Append-only write handle for a keyed store.
pub struct KasWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: Vec<(String, u64, u32)>,
    pos: u64,
}

impl KasWriter {
    /// Create (truncate) the store file and enter the compile phase.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let file = File::create(path).map_err(|e| io_err(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&[0u8; HEADER_SIZE as usize])
            .map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entries: Vec::new(),
            pos: HEADER_SIZE,
        })
    }

    /// Append one key/value record.
    pub fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut rec = Vec::with_capacity(8 + key.len() + value.len());
        codec::put_str(&mut rec, key);
        codec::put_u32(&mut rec, value.len() as u32);
        let value_offset = self.pos + rec.len() as u64;
        rec.extend_from_slice(value);

        self.writer
            .write_all(&rec)
            .map_err(|e| io_err(&self.path, e))?;
        self.pos += rec.len() as u64;
        self.entries
            .push((key.to_string(), value_offset, value.len() as u32));
        Ok(())
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the key table, patch the header offset and fsync.
    pub fn finish(mut self) -> StoreResult<()> {
        let table_offset = self.pos;
        let mut table = Vec::new();
        codec::put_u64(&mut table, self.entries.len() as u64);
        for (key, offset, len) in &self.entries {
            codec::put_str(&mut table, key);
            codec::put_u64(&mut table, *offset);
            codec::put_u32(&mut table, *len);
        }
        self.writer
            .write_all(&table)
            .map_err(|e| io_err(&self.path, e))?;
        self.writer.flush().map_err(|e| io_err(&self.path, e))?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| io_err(&self.path, e.into_error()))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| io_err(&self.path, e))?;
        file.write_all(&table_offset.to_le_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        file.sync_all().map_err(|e| io_err(&self.path, e))
    }
}

impl std::fmt::Debug for KasWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KasWriter")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Memory-mapped read handle for a finished keyed store.
pub struct KasReader {
    path: PathBuf,
    mmap: Mmap,
    index: HashMap<String, (usize, usize)>,
}

impl KasReader {
    /// Map the store file and load its key table.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        // Safety: the file was sealed by `KasWriter::finish` and is opened
        // read-only; no writer exists in query state.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| StoreError::Mmap {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };

        let malformed = |message: String| StoreError::Malformed {
            path: path.display().to_string(),
            message,
        };

        if mmap.len() < HEADER_SIZE as usize {
            return Err(malformed(format!("file is only {} byte(s)", mmap.len())));
        }
        let table_offset =
            u64::from_le_bytes(mmap[..8].try_into().expect("8 bytes")) as usize;
        if table_offset < HEADER_SIZE as usize || table_offset > mmap.len() {
            return Err(malformed(format!(
                "table offset {table_offset} out of bounds for {} byte file",
                mmap.len()
            )));
        }

        let mut index = HashMap::new();
        let mut r = ByteReader::new(&mmap[table_offset..]);
        let count = r.u64().map_err(|e| malformed(e.to_string()))?;
        for _ in 0..count {
            let key = r.string().map_err(|e| malformed(e.to_string()))?;
            let offset = r.u64().map_err(|e| malformed(e.to_string()))? as usize;
            let len = r.u32().map_err(|e| malformed(e.to_string()))? as usize;
            if offset + len > table_offset {
                return Err(malformed(format!(
                    "value for key \"{key}\" overruns the blob region"
                )));
            }
            index.insert(key, (offset, len));
        }

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            index,
        })
    }

    /// Look up a value. `None` if the key was never written.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let &(offset, len) = self.index.get(key)?;
        Some(self.mmap[offset..offset + len].to_vec())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for KasReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KasReader")
            .field("path", &self.path)
            .field("keys", &self.index.len())
            .finish()
    }
}
