//! Size-bounded shard writer.
//!
//! [`ShardWriter`] turns a stream of records into a numbered sequence of tar
//! archives. Each record is serialized up front so its exact archive length
//! is known, then appended to the open shard unless that would push the shard
//! past its budget, in which case the shard is finalized and the next index is
//! opened first.
//!
//! A shard that is still empty always accepts the next record, so a record
//! larger than the whole budget ends up alone in its own shard rather than
//! stalling the writer.
//!
//! ```no_run
//! use shardpack::record::Record;
//! use shardpack::shard::{ShardLimits, ShardPattern, ShardWriter};
//! # fn main() -> shardpack::Result<()> {
//! let pattern = ShardPattern::new("./data", "shard", "train", "tar");
//! let mut writer = ShardWriter::new(pattern, ShardLimits::default());
//! writer.write(&Record {
//!     key: "n01440764_10026".into(),
//!     payload: std::fs::read("n01440764_10026.JPEG").unwrap_or_default(),
//!     label: 0,
//!     extension: "jpg".into(),
//! })?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, ShardError};
use crate::io::archive::{END_OF_ARCHIVE, RecordEncoder};
use crate::io::compression::{FinishWrite, auto_detect_writer};
use crate::record::Record;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default per-shard byte budget (1 GB).
pub const DEFAULT_MAX_SHARD_BYTES: u64 = 1_000_000_000;

/// Default per-shard record cap.
pub const DEFAULT_MAX_SHARD_RECORDS: u64 = 100_000;

/// Naming scheme `{output_dir}/{prefix}-{split}-{index:06}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPattern {
    pub output_dir: PathBuf,
    pub prefix: String,
    pub split: String,
    pub extension: String,
}

impl ShardPattern {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        split: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            split: split.into(),
            extension: extension.into(),
        }
    }

    /// Path of shard number `index`.
    #[must_use]
    pub fn path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{}-{index:06}.{}",
            self.prefix, self.split, self.extension
        ))
    }
}

/// When to rotate to a new shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLimits {
    /// Budget of serialized (uncompressed) record bytes per shard.
    pub max_bytes: u64,
    /// Cap on records per shard; `None` means unlimited.
    pub max_records: Option<u64>,
}

impl ShardLimits {
    /// Byte budget only, no record cap.
    #[must_use]
    pub fn bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            max_records: None,
        }
    }
}

impl Default for ShardLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SHARD_BYTES,
            max_records: Some(DEFAULT_MAX_SHARD_RECORDS),
        }
    }
}

/// A finalized shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub index: usize,
    pub path: PathBuf,
    pub records: u64,
    /// Serialized record bytes, excluding the archive trailer.
    pub bytes: u64,
    /// SHA-256 of the finished file.
    #[cfg(feature = "checksums")]
    pub sha256: String,
}

struct OpenShard {
    path: PathBuf,
    sink: Box<dyn FinishWrite>,
    records: u64,
    bytes: u64,
}

impl OpenShard {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| ShardError::shard_io(&path, e))?;
        let sink = auto_detect_writer(file, &path)
            .map_err(|e| ShardError::shard_io(&path, io::Error::other(e)))?;
        Ok(Self {
            path,
            sink,
            records: 0,
            bytes: 0,
        })
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink
            .write_all(bytes)
            .map_err(|e| ShardError::shard_io(&self.path, e))?;
        self.records += 1;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    fn finish(mut self, index: usize) -> Result<ShardInfo> {
        self.sink
            .write_all(&END_OF_ARCHIVE)
            .map_err(|e| ShardError::shard_io(&self.path, e))?;
        self.sink
            .finish_stream()
            .map_err(|e| ShardError::shard_io(&self.path, e))?;
        Ok(ShardInfo {
            index,
            #[cfg(feature = "checksums")]
            sha256: file_sha256(&self.path)?,
            path: self.path,
            records: self.records,
            bytes: self.bytes,
        })
    }
}

/// Writes records into a rotating sequence of shards for one split.
///
/// Shards are opened lazily, so a writer that never receives a record creates
/// no files. Call [`close`](Self::close) when done; dropping an unclosed
/// writer finalizes the open shard as well but can only log a failure.
pub struct ShardWriter {
    pattern: ShardPattern,
    limits: ShardLimits,
    encoder: RecordEncoder,
    index: usize,
    current: Option<OpenShard>,
    finished: Vec<ShardInfo>,
}

impl ShardWriter {
    #[must_use]
    pub fn new(pattern: ShardPattern, limits: ShardLimits) -> Self {
        Self::with_encoder(pattern, limits, RecordEncoder::new())
    }

    /// Writer using a caller-supplied encoder (e.g. one with a fixed mtime).
    #[must_use]
    pub fn with_encoder(
        pattern: ShardPattern,
        limits: ShardLimits,
        encoder: RecordEncoder,
    ) -> Self {
        Self {
            pattern,
            limits,
            encoder,
            index: 0,
            current: None,
            finished: Vec::new(),
        }
    }

    /// Append one record, rotating first if it does not fit the open shard.
    ///
    /// # Errors
    /// [`ShardError::ShardIo`] if a shard cannot be created, written or
    /// finalized.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let bytes = self
            .encoder
            .encode(record)
            .map_err(|e| ShardError::shard_io(self.pattern.path(self.index), e))?;
        let len = bytes.len() as u64;

        if self.current.as_ref().is_some_and(|open| self.must_rotate(open, len)) {
            self.finish_current()?;
            self.index += 1;
        }

        let open = match self.current.take() {
            Some(open) => open,
            None => {
                let path = self.pattern.path(self.index);
                debug!("opening shard {}", path.display());
                OpenShard::create(path)?
            }
        };
        self.current.insert(open).append(&bytes)
    }

    fn must_rotate(&self, open: &OpenShard, len: u64) -> bool {
        if open.records == 0 {
            return false;
        }
        open.bytes + len > self.limits.max_bytes
            || self.limits.max_records.is_some_and(|cap| open.records >= cap)
    }

    fn finish_current(&mut self) -> Result<()> {
        if let Some(open) = self.current.take() {
            let info = open.finish(self.index)?;
            info!(
                "finished shard {} ({} records, {} bytes)",
                info.path.display(),
                info.records,
                info.bytes
            );
            self.finished.push(info);
        }
        Ok(())
    }

    /// Finalize the open shard, if any. Calling it again is a no-op.
    ///
    /// # Errors
    /// [`ShardError::ShardIo`] if the trailer cannot be written or the stream
    /// cannot be flushed.
    pub fn close(&mut self) -> Result<()> {
        self.finish_current()
    }

    /// Close the writer and return every finalized shard in index order.
    ///
    /// # Errors
    /// [`ShardError::ShardIo`] if the open shard cannot be finalized; shards
    /// closed earlier stay on disk.
    pub fn finish(mut self) -> Result<Vec<ShardInfo>> {
        self.close()?;
        Ok(std::mem::take(&mut self.finished))
    }

    /// Shards finalized so far.
    #[must_use]
    pub fn shards(&self) -> &[ShardInfo] {
        &self.finished
    }

    /// Whether a shard is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn pattern(&self) -> &ShardPattern {
        &self.pattern
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to finalize shard on drop: {e}");
        }
    }
}

#[cfg(feature = "checksums")]
fn file_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use std::io::Read;
    let mut file = File::open(path).map_err(|e| ShardError::shard_io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf).map_err(|e| ShardError::shard_io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::archive::member_size;
    use tempfile::TempDir;

    fn record(key: &str, size: usize) -> Record {
        Record {
            key: key.to_string(),
            payload: vec![b'x'; size],
            label: 1,
            extension: "jpg".to_string(),
        }
    }

    fn encoded(size: usize) -> u64 {
        member_size(size as u64) + member_size(1)
    }

    #[test]
    fn names_are_zero_padded() {
        let p = ShardPattern::new("/out", "shard", "train", "tar");
        assert_eq!(p.path(7), PathBuf::from("/out/shard-train-000007.tar"));
        assert_eq!(p.path(1_234_567), PathBuf::from("/out/shard-train-1234567.tar"));
    }

    #[test]
    fn no_writes_no_shards() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let pattern = ShardPattern::new(dir.path(), "shard", "val", "tar");
        let mut w = ShardWriter::new(pattern, ShardLimits::bytes(1024));
        w.close()?;
        w.close()?;
        assert!(w.shards().is_empty());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn rotates_when_budget_would_be_exceeded() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let pattern = ShardPattern::new(dir.path(), "shard", "train", "tar");
        // Room for exactly three 300-byte records.
        let mut w = ShardWriter::new(pattern, ShardLimits::bytes(3 * encoded(300)));
        for i in 0..4 {
            w.write(&record(&format!("r{i}"), 300))?;
        }
        let shards = w.finish()?;
        assert_eq!(
            shards.iter().map(|s| s.records).collect::<Vec<_>>(),
            vec![3, 1]
        );
        assert_eq!(shards[0].bytes, 3 * encoded(300));
        Ok(())
    }

    #[test]
    fn oversized_record_gets_its_own_shard() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let pattern = ShardPattern::new(dir.path(), "shard", "train", "tar");
        let mut w = ShardWriter::new(pattern, ShardLimits::bytes(1000));
        w.write(&record("small", 10))?;
        w.write(&record("huge", 5000))?;
        w.write(&record("small2", 10))?;
        let shards = w.finish()?;
        assert_eq!(
            shards.iter().map(|s| s.records).collect::<Vec<_>>(),
            vec![1, 1, 1]
        );
        assert!(shards[1].bytes > 1000);
        Ok(())
    }

    #[test]
    fn record_cap_forces_rotation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let pattern = ShardPattern::new(dir.path(), "shard", "train", "tar");
        let limits = ShardLimits {
            max_bytes: u64::MAX,
            max_records: Some(2),
        };
        let mut w = ShardWriter::new(pattern, limits);
        for i in 0..5 {
            w.write(&record(&format!("r{i}"), 1))?;
        }
        let shards = w.finish()?;
        assert_eq!(
            shards.iter().map(|s| s.records).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        Ok(())
    }

    #[test]
    fn drop_finalizes_open_shard() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let pattern = ShardPattern::new(dir.path(), "shard", "train", "tar");
        let path = pattern.path(0);
        {
            let mut w = ShardWriter::new(pattern, ShardLimits::bytes(1 << 20));
            w.write(&record("a", 100))?;
        }
        let len = std::fs::metadata(&path)?.len();
        assert_eq!(len, encoded(100) + END_OF_ARCHIVE.len() as u64);
        Ok(())
    }

    #[test]
    fn unwritable_directory_is_a_shard_error() {
        let pattern = ShardPattern::new("/definitely/not/here", "shard", "train", "tar");
        let mut w = ShardWriter::new(pattern, ShardLimits::default());
        let err = w.write(&record("a", 1)).unwrap_err();
        assert!(matches!(err, ShardError::ShardIo { .. }));
    }
}
