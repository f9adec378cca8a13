//! On-disk store of decoded grids.
//!
//! Purely a warm-start optimization: entries can be deleted at any time.
//!
//! File layout, one file per source path:
//!
//! ```text
//! magic "FGRD" | header length (u32 LE) | JSON header
//! values: rows*cols f32 LE | lats: rows*cols f64 LE | lons: rows*cols f64 LE
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use forecast_common::{DecodedGrid, GridMetadata};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const MAGIC: &[u8; 4] = b"FGRD";
const ENTRY_EXTENSION: &str = "grid";

#[derive(Debug, Error)]
pub enum DiskCacheError {
    #[error("disk cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid disk cache header: {0}")]
    Header(#[from] serde_json::Error),

    #[error("corrupt disk cache entry {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    source: PathBuf,
    source_size: u64,
    source_mtime_ms: u64,
    rows: usize,
    cols: usize,
    metadata: GridMetadata,
}

/// Identity of a source file's current contents.
fn source_stamp(source: &Path) -> io::Result<(u64, u64)> {
    let meta = fs::metadata(source)?;
    let mtime_ms = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok((meta.len(), mtime_ms))
}

/// Directory of serialized raw (not yet normalized) grids.
#[derive(Debug, Clone)]
pub struct DiskGridStore {
    dir: PathBuf,
}

impl DiskGridStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DiskCacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry file for a source path, named by the CRC32 of the path.
    pub fn entry_path(&self, source: &Path) -> PathBuf {
        let checksum = crc32fast::hash(source.as_os_str().as_encoded_bytes());
        self.dir.join(format!("{:08x}.{}", checksum, ENTRY_EXTENSION))
    }

    /// Load the stored grid for `source`.
    ///
    /// `Ok(None)` when there is no entry or the source changed since it was
    /// written (size or mtime differ, or another path shares the checksum).
    pub fn load(&self, source: &Path) -> Result<Option<DecodedGrid>, DiskCacheError> {
        let entry = self.entry_path(source);
        let data = match fs::read(&entry) {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: &str| DiskCacheError::Corrupt {
            path: entry.clone(),
            reason: reason.to_string(),
        };

        let mut buf = data;
        if buf.remaining() < 8 || &buf[..4] != MAGIC {
            return Err(corrupt("bad magic"));
        }
        buf.advance(4);
        let header_len = buf.get_u32_le() as usize;
        if buf.remaining() < header_len {
            return Err(corrupt("truncated header"));
        }
        let header: EntryHeader = serde_json::from_slice(&buf[..header_len])?;
        buf.advance(header_len);

        let (size, mtime_ms) = match source_stamp(source) {
            Ok(stamp) => stamp,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if header.source != source || header.source_size != size || header.source_mtime_ms != mtime_ms
        {
            debug!(source = %source.display(), "Disk cache entry is stale");
            return Ok(None);
        }

        let n = header.rows * header.cols;
        if buf.remaining() != n * (4 + 8 + 8) {
            return Err(corrupt("payload length does not match grid shape"));
        }

        let values = (0..n).map(|_| buf.get_f32_le()).collect();
        let lats = (0..n).map(|_| buf.get_f64_le()).collect();
        let lons = (0..n).map(|_| buf.get_f64_le()).collect();

        DecodedGrid::new(header.metadata, header.rows, header.cols, values, lats, lons)
            .map(Some)
            .map_err(|e| corrupt(&e.to_string()))
    }

    /// Write `grid` as the entry for `source`.
    ///
    /// Written to a temporary file and renamed, so readers never see a
    /// partial entry.
    pub fn store(&self, source: &Path, grid: &DecodedGrid) -> Result<(), DiskCacheError> {
        let (source_size, source_mtime_ms) = source_stamp(source)?;
        let header = serde_json::to_vec(&EntryHeader {
            source: source.to_path_buf(),
            source_size,
            source_mtime_ms,
            rows: grid.rows(),
            cols: grid.cols(),
            metadata: grid.metadata().clone(),
        })?;

        let mut buf = BytesMut::with_capacity(8 + header.len() + grid.len() * 20);
        buf.put_slice(MAGIC);
        buf.put_u32_le(header.len() as u32);
        buf.put_slice(&header);
        grid.values().iter().for_each(|v| buf.put_f32_le(*v));
        grid.lats().iter().for_each(|v| buf.put_f64_le(*v));
        grid.lons().iter().for_each(|v| buf.put_f64_le(*v));

        let entry = self.entry_path(source);
        let tmp = entry.with_extension("tmp");
        fs::write(&tmp, &buf)?;
        fs::rename(&tmp, &entry)?;
        Ok(())
    }

    /// Remove every entry; returns how many were deleted.
    pub fn clear(&self) -> Result<usize, DiskCacheError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_entry = path
                .extension()
                .map(|ext| ext == ENTRY_EXTENSION || ext == "tmp")
                .unwrap_or(false);
            if is_entry {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
