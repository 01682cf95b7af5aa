//! Throwaway image-folder datasets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Bytes shaped like a JPEG: SOI marker, filler derived from `seed`, EOI marker.
///
/// Nothing decodes these; they only need to be distinct and of a known size.
///
/// # Example
///
/// ```
/// use shardpack::testing::fake_jpeg;
///
/// let bytes = fake_jpeg(64, 3);
/// assert_eq!(bytes.len(), 64);
/// assert_eq!(&bytes[..2], &[0xff, 0xd8]);
/// ```
#[must_use]
pub fn fake_jpeg(len: usize, seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len.max(4));
    out.extend_from_slice(&[0xff, 0xd8]);
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(12345);
    while out.len() + 2 < len {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        out.push((state >> 16) as u8);
    }
    out.extend_from_slice(&[0xff, 0xd9]);
    out.truncate(len);
    out
}

/// A dataset root in a temporary directory, laid out as
/// `source/<split>/<class>/<file>`, with room for an output directory next
/// to it. Everything is deleted when the fixture is dropped.
pub struct ImageFolderFixture {
    dir: TempDir,
}

impl ImageFolderFixture {
    /// Create an empty dataset root.
    ///
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Add one image file.
    ///
    /// # Errors
    /// Returns an error if the file or its directories cannot be written.
    pub fn image(
        self,
        split: &str,
        class: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> io::Result<Self> {
        let class_dir = self.source_root().join(split).join(class);
        fs::create_dir_all(&class_dir)?;
        fs::write(class_dir.join(file_name), bytes)?;
        Ok(self)
    }

    /// Add `per_class` images of `len` bytes to each class, named
    /// `<class>_<n>.JPEG`.
    ///
    /// # Errors
    /// Returns an error if any file cannot be written.
    pub fn classes(
        mut self,
        split: &str,
        classes: &[&str],
        per_class: usize,
        len: usize,
    ) -> io::Result<Self> {
        for (c, class) in classes.iter().enumerate() {
            for n in 0..per_class {
                let seed = u32::try_from(c * per_class + n).unwrap_or(u32::MAX);
                let name = format!("{class}_{n:05}.JPEG");
                self = self.image(split, class, &name, &fake_jpeg(len, seed))?;
            }
        }
        Ok(self)
    }

    /// Create a split directory with no classes in it.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn empty_split(self, split: &str) -> io::Result<Self> {
        fs::create_dir_all(self.source_root().join(split))?;
        Ok(self)
    }

    /// The temporary directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory to pass as the dataset root.
    #[must_use]
    pub fn source_root(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    /// A not-yet-existing output directory inside the fixture.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("shards")
    }
}
