//! Positional blob store: append-only blobs addressed through an offset table.
//!
//! Two flavors share the append-then-index discipline:
//!
//! - [`PbsWriter`] / [`PbsReader`] — sparse `u64` keys, single file. An
//!   8-byte header slot holds the trailer offset, patched at `finish()`;
//!   the trailer is `count: u64` then `count × (key: u64, offset: u64)`.
//!   Used for the reachable matrix (`.rm.dat`), where the key is an
//!   arity id.
//! - [`IndexedBlobWriter`] / [`IndexedBlobReader`] — dense 0-based keys,
//!   a `.dat` file of raw records plus a `.idx` file of
//!   `count: u64` then `count × (offset: u64, len: u32)`. Used for the
//!   axiom bodies, where the key is the axiom id.
//!
//! Blobs are opaque here; callers own the record layout. A `PbsReader`
//! hands back the slice from the blob's offset to the end of the blob
//! region, and the caller's record format is expected to be
//! self-delimiting.

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

fn map_readonly(path: &Path) -> StoreResult<Mmap> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    // Safety: the file was sealed by its writer's finish() and is opened
    // read-only; no writer exists in query state.
    unsafe {
        Mmap::map(&file).map_err(|e| StoreError::Mmap {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Sparse-key store (single file, patched trailer)
// ---------------------------------------------------------------------------

/// Append-only write handle for a sparse-key positional store.
pub struct PbsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    offsets: Vec<(u64, u64)>,
    pos: u64,
}

impl PbsWriter {
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
            offsets: Vec::new(),
            pos: HEADER_SIZE,
        })
    }

    /// Append one blob under `key`, recording its offset in the trailer.
    pub fn put(&mut self, key: u64, blob: &[u8]) -> StoreResult<()> {
        self.writer
            .write_all(blob)
            .map_err(|e| io_err(&self.path, e))?;
        self.offsets.push((key, self.pos));
        self.pos += blob.len() as u64;
        Ok(())
    }

    /// Number of blobs appended so far.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Write the trailer, patch the header offset and fsync.
    pub fn finish(mut self) -> StoreResult<()> {
        let trailer_offset = self.pos;
        let mut trailer = Vec::with_capacity(8 + self.offsets.len() * 16);
        codec::put_u64(&mut trailer, self.offsets.len() as u64);
        for (key, offset) in &self.offsets {
            codec::put_u64(&mut trailer, *key);
            codec::put_u64(&mut trailer, *offset);
        }
        self.writer
            .write_all(&trailer)
            .map_err(|e| io_err(&self.path, e))?;
        self.writer.flush().map_err(|e| io_err(&self.path, e))?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| io_err(&self.path, e.into_error()))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| io_err(&self.path, e))?;
        file.write_all(&trailer_offset.to_le_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        file.sync_all().map_err(|e| io_err(&self.path, e))
    }
}

impl std::fmt::Debug for PbsWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbsWriter")
            .field("path", &self.path)
            .field("blobs", &self.offsets.len())
            .finish()
    }
}

/// Memory-mapped read handle for a finished sparse-key store.
pub struct PbsReader {
    path: PathBuf,
    mmap: Mmap,
    index: HashMap<u64, usize>,
    blob_region_end: usize,
}

impl PbsReader {
    /// Map the store file and load its trailer.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mmap = map_readonly(path)?;
        let malformed = |message: String| StoreError::Malformed {
            path: path.display().to_string(),
            message,
        };

        if mmap.len() < HEADER_SIZE as usize {
            return Err(malformed(format!("file is only {} byte(s)", mmap.len())));
        }
        let trailer_offset =
            u64::from_le_bytes(mmap[..8].try_into().expect("8 bytes")) as usize;
        if trailer_offset < HEADER_SIZE as usize || trailer_offset > mmap.len() {
            return Err(malformed(format!(
                "trailer offset {trailer_offset} out of bounds for {} byte file",
                mmap.len()
            )));
        }

        let mut index = HashMap::new();
        let mut r = ByteReader::new(&mmap[trailer_offset..]);
        let count = r.u64().map_err(|e| malformed(e.to_string()))?;
        for _ in 0..count {
            let key = r.u64().map_err(|e| malformed(e.to_string()))?;
            let offset = r.u64().map_err(|e| malformed(e.to_string()))? as usize;
            if offset > trailer_offset {
                return Err(malformed(format!(
                    "blob offset {offset} for key {key} overruns the blob region"
                )));
            }
            index.insert(key, offset);
        }

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            index,
            blob_region_end: trailer_offset,
        })
    }

    /// The bytes from `key`'s blob offset to the end of the blob region.
    ///
    /// The caller's record format is self-delimiting; trailing bytes
    /// belong to later blobs.
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        let &offset = self.index.get(&key)?;
        Some(&self.mmap[offset..self.blob_region_end])
    }

    pub fn contains(&self, key: u64) -> bool {
        self.index.contains_key(&key)
    }

    /// Number of stored blobs.
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

impl std::fmt::Debug for PbsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbsReader")
            .field("path", &self.path)
            .field("blobs", &self.index.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Dense-key store (.dat + .idx pair)
// ---------------------------------------------------------------------------

/// Append-only write handle for a dense-key blob store.
///
/// The n-th `append` is addressed by key n at read time.
pub struct IndexedBlobWriter {
    dat_path: PathBuf,
    idx_path: PathBuf,
    writer: BufWriter<File>,
    entries: Vec<(u64, u32)>,
    pos: u64,
}

impl IndexedBlobWriter {
    pub fn create(idx_path: &Path, dat_path: &Path) -> StoreResult<Self> {
        let file = File::create(dat_path).map_err(|e| io_err(dat_path, e))?;
        Ok(Self {
            dat_path: dat_path.to_path_buf(),
            idx_path: idx_path.to_path_buf(),
            writer: BufWriter::new(file),
            entries: Vec::new(),
            pos: 0,
        })
    }

    /// Append a record, returning its dense key.
    pub fn append(&mut self, record: &[u8]) -> StoreResult<u32> {
        self.writer
            .write_all(record)
            .map_err(|e| io_err(&self.dat_path, e))?;
        let key = self.entries.len() as u32;
        self.entries.push((self.pos, record.len() as u32));
        self.pos += record.len() as u64;
        Ok(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flush the data file and write the companion index file.
    pub fn finish(self) -> StoreResult<()> {
        let mut writer = self.writer;
        writer.flush().map_err(|e| io_err(&self.dat_path, e))?;
        writer
            .into_inner()
            .map_err(|e| io_err(&self.dat_path, e.into_error()))?
            .sync_all()
            .map_err(|e| io_err(&self.dat_path, e))?;

        let mut idx = Vec::with_capacity(8 + self.entries.len() * 12);
        codec::put_u64(&mut idx, self.entries.len() as u64);
        for (offset, len) in &self.entries {
            codec::put_u64(&mut idx, *offset);
            codec::put_u32(&mut idx, *len);
        }
        let idx_file = File::create(&self.idx_path).map_err(|e| io_err(&self.idx_path, e))?;
        let mut w = BufWriter::new(idx_file);
        w.write_all(&idx).map_err(|e| io_err(&self.idx_path, e))?;
        w.flush().map_err(|e| io_err(&self.idx_path, e))?;
        w.into_inner()
            .map_err(|e| io_err(&self.idx_path, e.into_error()))?
            .sync_all()
            .map_err(|e| io_err(&self.idx_path, e))
    }
}

impl std::fmt::Debug for IndexedBlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedBlobWriter")
            .field("dat", &self.dat_path)
            .field("records", &self.entries.len())
            .finish()
    }
}

/// Memory-mapped read handle for a finished dense-key store.
pub struct IndexedBlobReader {
    dat_path: PathBuf,
    /// `None` when the data file is empty (zero-length files cannot be mapped).
    mmap: Option<Mmap>,
    entries: Vec<(u64, u32)>,
}

impl IndexedBlobReader {
    pub fn open(idx_path: &Path, dat_path: &Path) -> StoreResult<Self> {
        let idx_bytes = std::fs::read(idx_path).map_err(|e| io_err(idx_path, e))?;
        let malformed = |path: &Path, message: String| StoreError::Malformed {
            path: path.display().to_string(),
            message,
        };

        let mut r = ByteReader::new(&idx_bytes);
        let count = r
            .u64()
            .map_err(|e| malformed(idx_path, e.to_string()))?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = r.u64().map_err(|e| malformed(idx_path, e.to_string()))?;
            let len = r.u32().map_err(|e| malformed(idx_path, e.to_string()))?;
            entries.push((offset, len));
        }

        let dat_len = std::fs::metadata(dat_path)
            .map_err(|e| io_err(dat_path, e))?
            .len();
        let mmap = if dat_len == 0 {
            None
        } else {
            Some(map_readonly(dat_path)?)
        };
        if let Some(&(offset, len)) = entries.last() {
            if offset + len as u64 > dat_len {
                return Err(malformed(
                    dat_path,
                    format!(
                        "index addresses {} byte(s) but data file has {dat_len}",
                        offset + len as u64
                    ),
                ));
            }
        }

        Ok(Self {
            dat_path: dat_path.to_path_buf(),
            mmap,
            entries,
        })
    }

    /// The record stored under a dense key.
    pub fn get(&self, key: u32) -> Option<&[u8]> {
        let &(offset, len) = self.entries.get(key as usize)?;
        if len == 0 {
            return Some(&[]);
        }
        let mmap = self.mmap.as_ref()?;
        Some(&mmap[offset as usize..offset as usize + len as usize])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.dat_path
    }
}

impl std::fmt::Debug for IndexedBlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedBlobReader")
            .field("dat", &self.dat_path)
            .field("records", &self.entries.len())
            .finish()
    }
}
