//! Dataset metadata: which files belong to a split and their class labels.
//!
//! The converter only needs positional access to `(path, label)` pairs, so the
//! contract is the small [`DatasetIndex`] trait. [`ImageFolderIndex`] implements
//! it for the common layout of one directory per class:
//!
//! ```text
//! root/
//!   train/
//!     n01440764/  n01440764_10026.JPEG  n01440764_10027.JPEG ...
//!     n01443537/  ...
//!   val/
//!     ...
//! ```

use crate::error::{Result, ShardError};
use crate::io::glob::image_files;
use std::fs;
use std::path::{Path, PathBuf};

/// One source example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub class_label: u32,
}

/// Positional access to the examples of one split.
pub trait DatasetIndex {
    /// Number of entries.
    fn len(&self) -> usize;

    /// Entry at position `i`, for `i < len()`.
    fn entry(&self, i: usize) -> IndexEntry;

    /// The index's own label column for position `i`.
    ///
    /// Indexes that keep labels in a separate table should override this so
    /// the converter can check both agree.
    fn target(&self, i: usize) -> u32 {
        self.entry(i).class_label
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index over `root/<split>/<class>/<image>`.
///
/// Class labels are positions in the sorted list of class directory names.
/// Every subdirectory of the split is a class, including symlinked and
/// dot-named ones. Images are collected from the whole tree below each class
/// directory.
#[derive(Debug, Clone)]
pub struct ImageFolderIndex {
    split_dir: PathBuf,
    classes: Vec<String>,
    samples: Vec<IndexEntry>,
    targets: Vec<u32>,
}

impl ImageFolderIndex {
    /// Scan `root/split`.
    ///
    /// # Errors
    /// [`ShardError::SourceRead`] if the split directory or one of its class
    /// directories cannot be listed, [`ShardError::Config`] if there are more
    /// classes than fit a `u32` label.
    pub fn open(root: &Path, split: &str) -> Result<Self> {
        let split_dir = root.join(split);
        let classes = class_names(&split_dir)?;

        let mut samples = Vec::new();
        let mut targets = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let label = u32::try_from(label)
                .map_err(|_| ShardError::config("too many classes for a u32 label"))?;
            for path in image_files(&split_dir.join(class))? {
                samples.push(IndexEntry {
                    path,
                    class_label: label,
                });
                targets.push(label);
            }
        }

        Ok(Self {
            split_dir,
            classes,
            samples,
            targets,
        })
    }

    /// Sorted class names; a label is an index into this list.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn split_dir(&self) -> &Path {
        &self.split_dir
    }
}

impl DatasetIndex for ImageFolderIndex {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn entry(&self, i: usize) -> IndexEntry {
        self.samples[i].clone()
    }

    fn target(&self, i: usize) -> u32 {
        self.targets[i]
    }
}

/// Entries held in memory, for callers that already have the listing.
impl DatasetIndex for Vec<IndexEntry> {
    fn len(&self) -> usize {
        <[IndexEntry]>::len(self)
    }

    fn entry(&self, i: usize) -> IndexEntry {
        self[i].clone()
    }
}

fn class_names(split_dir: &Path) -> Result<Vec<String>> {
    let read = fs::read_dir(split_dir).map_err(|e| ShardError::source_read(split_dir, e))?;
    let mut classes = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| ShardError::source_read(split_dir, e))?;
        // Follows symlinks: linked class directories count as classes.
        if entry.path().is_dir() {
            classes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    classes.sort();
    Ok(classes)
}
