//! Pluggable compression for shard streams.
//!
//! Shards are plain tar archives unless the configured extension ends in a
//! codec suffix (`shard-train-000000.tar.gz`), in which case the whole
//! archive stream passes through that codec. Budgets are always counted
//! against the uncompressed archive bytes.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! ## Finishing writers
//!
//! Compressed streams must be finalized explicitly; relying on `Drop` would
//! swallow the error of the last block write. Writers are therefore handed out
//! as [`FinishWrite`] trait objects, and the shard writer calls
//! [`FinishWrite::finish_stream`] when it closes a shard.
//!
//! ```no_run
//! use shardpack::io::compression::{auto_detect_reader, auto_detect_writer};
//! use std::fs::File;
//! use std::io::Write;
//! # fn main() -> anyhow::Result<()> {
//! let path = "shard-train-000000.tar.zst";
//! let mut writer = auto_detect_writer(File::create(path)?, path)?;
//! writer.write_all(b"...")?;
//! writer.finish_stream()?;
//!
//! let reader = auto_detect_reader(File::open(path)?, path)?;
//! # drop(reader);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Global codec registry for pluggable compression support.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn get_registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom compression codec globally.
///
/// Registered codecs are consulted after the built-in ones.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).push(codec);
}

/// A writer that must be explicitly finalized.
pub trait FinishWrite: Write {
    /// Flush all buffered data, write any codec footer, and release the
    /// underlying writer.
    fn finish_stream(self: Box<Self>) -> io::Result<()>;
}

impl<W: Write> FinishWrite for BufWriter<W> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        let mut inner = (*self)
            .into_inner()
            .map_err(io::IntoInnerError::into_error)?;
        inner.flush()
    }
}

/// Pluggable compression codec.
///
/// Codecs are detected via file extensions on write and via extensions or
/// magic bytes on read.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &str;

    /// File extensions associated with this codec, lowercase with leading dot.
    fn extensions(&self) -> &[&str];

    /// Optional magic byte signature for content-based detection.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>>;

    /// Wrap a writer with compression.
    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn FinishWrite>>;
}

/// Find the codec whose extension the path ends with, if any.
///
/// Matching is case-insensitive, so `shard-000000.TAR.GZ` resolves to gzip.
#[must_use]
pub fn codec_for_path(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    get_registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    get_registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.starts_with(magic))
    })
}

/// Wrap a reader with decompression if the path or leading bytes call for it.
///
/// Extension detection runs first; magic bytes are the fallback.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    if let Some(codec) = codec_for_path(&path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(BufReader::new(reader)))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        return codec
            .wrap_reader_dyn(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buf_reader))
}

/// Wrap a writer with buffering and, if the path names a codec, compression.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn FinishWrite>> {
    let buffered = BufWriter::new(writer);
    if let Some(codec) = codec_for_path(&path_hint) {
        return codec
            .wrap_writer_dyn(Box::new(buffered))
            .with_context(|| format!("wrap writer with {} codec", codec.name()));
    }
    Ok(Box::new(buffered))
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl FinishWrite for flate2::write::GzEncoder<Box<dyn Write>> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish()?.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use flate2::read::GzDecoder;
        Ok(Box::new(GzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn FinishWrite>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl FinishWrite for zstd::stream::write::Encoder<'static, Box<dyn Write>> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish()?.flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn FinishWrite>> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e) as Box<dyn FinishWrite>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl FinishWrite for bzip2::write::BzEncoder<Box<dyn Write>> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish()?.flush()
    }
}

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x42, 0x5a, 0x68])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use bzip2::read::BzDecoder;
        Ok(Box::new(BzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn FinishWrite>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl FinishWrite for xz2::write::XzEncoder<Box<dyn Write>> {
    fn finish_stream(self: Box<Self>) -> io::Result<()> {
        (*self).finish()?.flush()
    }
}

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn FinishWrite>> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tar_has_no_codec() {
        assert!(codec_for_path("out/shard-train-000000.tar").is_none());
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_suffix_is_case_insensitive() {
        let codec = codec_for_path("out/shard-train-000000.TAR.GZ").map(|c| c.name().to_string());
        assert_eq!(codec.as_deref(), Some("gzip"));
    }

    #[test]
    fn buffered_writer_flushes_on_finish() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("plain.tar");
        let mut w = auto_detect_writer(std::fs::File::create(&path)?, &path)?;
        w.write_all(b"hello")?;
        w.finish_stream()?;
        assert_eq!(std::fs::read(&path)?, b"hello");
        Ok(())
    }
}
