//! Split-by-split conversion driver.
//!
//! For every requested split the driver lists the split's examples, shuffles
//! their order, and streams them through a fresh [`ShardWriter`]. Splits run
//! one after another; a failure aborts the run, leaving shards of earlier
//! splits on disk.

use crate::error::{Result, ShardError};
use crate::index::{DatasetIndex, ImageFolderIndex};
use crate::record::{KeyRegistry, KeyScope, assemble, check_key, derive_key, read_payload};
use crate::shard::{ShardInfo, ShardLimits, ShardPattern, ShardWriter};
use crate::shuffle::Shuffler;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything a conversion run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Dataset root holding one directory per split.
    pub source_root: PathBuf,
    /// Directory receiving the shards; created if absent.
    pub output_dir: PathBuf,
    /// Leading component of every shard file name.
    pub prefix: String,
    pub splits: Vec<String>,
    pub limits: ShardLimits,
    /// Shard file extension, e.g. `tar` or `tar.gz`.
    pub extension: String,
    /// Fixes the shuffle order when set.
    pub seed: Option<u64>,
    pub key_scope: KeyScope,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("/imagenet"),
            output_dir: PathBuf::from("./data"),
            prefix: "shard".to_string(),
            splits: vec!["train".to_string(), "val".to_string()],
            limits: ShardLimits::default(),
            extension: "tar".to_string(),
            seed: None,
            key_scope: KeyScope::Run,
        }
    }
}

impl ConvertOptions {
    /// Reject option sets that cannot produce a well-formed run.
    ///
    /// # Errors
    /// [`ShardError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.splits.is_empty() {
            return Err(ShardError::config("no splits requested"));
        }
        let mut seen = HashSet::new();
        for split in &self.splits {
            if split.is_empty() {
                return Err(ShardError::config("empty split name"));
            }
            if split.contains(['/', '\\']) || split == "." || split == ".." {
                return Err(ShardError::config(format!(
                    "split name {split:?} must be a single path component"
                )));
            }
            if !seen.insert(split.as_str()) {
                return Err(ShardError::config(format!("split {split:?} requested twice")));
            }
        }
        if self.prefix.is_empty() || self.prefix.contains(['/', '\\']) {
            return Err(ShardError::config(format!(
                "shard prefix {:?} must be a non-empty file name",
                self.prefix
            )));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ShardError::config(format!(
                "shard extension {:?} must be non-empty and given without a leading dot",
                self.extension
            )));
        }
        if self.limits.max_bytes == 0 {
            return Err(ShardError::config("max shard bytes must be positive"));
        }
        if self.limits.max_records == Some(0) {
            return Err(ShardError::config("max shard records must be positive"));
        }
        Ok(())
    }

    /// Shard naming for one split.
    #[must_use]
    pub fn pattern(&self, split: &str) -> ShardPattern {
        ShardPattern::new(&self.output_dir, &self.prefix, split, &self.extension)
    }
}

/// Outcome of one split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub split: String,
    pub records: u64,
    pub bytes: u64,
    pub shards: Vec<ShardInfo>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub splits: Vec<SplitSummary>,
}

impl ConversionSummary {
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.splits.iter().map(|s| s.records).sum()
    }

    #[must_use]
    pub fn total_shards(&self) -> usize {
        self.splits.iter().map(|s| s.shards.len()).sum()
    }

    /// Write the summary as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        use anyhow::Context;
        let path = path.as_ref();
        let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer_pretty(&mut f, self)
            .with_context(|| format!("serialize summary to {}", path.display()))?;
        f.write_all(b"\n")?;
        Ok(())
    }
}

/// Convert every split named in `options` using the image-folder layout.
///
/// # Errors
/// Any [`ShardError`]; the run stops at the first one.
pub fn convert(options: &ConvertOptions) -> Result<ConversionSummary> {
    options.validate()?;
    create_dir_all(&options.output_dir)
        .map_err(|e| ShardError::shard_io(&options.output_dir, e))?;

    let mut shuffler = Shuffler::new(options.seed);
    let mut registry = KeyRegistry::new(options.key_scope);
    let mut summary = ConversionSummary::default();

    for split in &options.splits {
        let index = ImageFolderIndex::open(&options.source_root, split)?;
        info!(
            "split {split}: {} examples in {} classes",
            index.len(),
            index.classes().len()
        );
        let split_summary = write_split(
            &index,
            split,
            &mut shuffler,
            &mut registry,
            options.pattern(split),
            options.limits,
        )?;
        info!(
            "split {split}: wrote {} records into {} shard(s)",
            split_summary.records,
            split_summary.shards.len()
        );
        summary.splits.push(split_summary);
    }
    Ok(summary)
}

/// Shuffle one split's entries and stream them into shards.
///
/// The writer is finalized on every exit path; on error the shard being
/// written is closed with whatever it held and the error is returned.
///
/// # Errors
/// [`ShardError::SourceRead`], [`ShardError::KeyCollision`],
/// [`ShardError::LabelMismatch`], [`ShardError::ShardIo`], or
/// [`ShardError::Config`] for a file whose name yields an unusable key.
pub fn write_split<I: DatasetIndex + ?Sized>(
    index: &I,
    split: &str,
    shuffler: &mut Shuffler,
    registry: &mut KeyRegistry,
    pattern: ShardPattern,
    limits: ShardLimits,
) -> Result<SplitSummary> {
    registry.begin_split();
    let order = shuffler.permute(index.len());
    let mut writer = ShardWriter::new(pattern, limits);

    for i in order {
        let entry = index.entry(i);
        let target = index.target(i);
        if entry.class_label != target {
            return Err(ShardError::LabelMismatch {
                path: entry.path,
                label: entry.class_label,
                target,
            });
        }

        let payload = read_payload(&entry.path)?;
        let key = derive_key(&entry.path);
        check_key(&key, &entry.path)?;
        registry.claim(&key, &entry.path)?;
        let record = assemble(&entry.path, entry.class_label, key, payload);
        writer.write(&record)?;
    }

    let shards = writer.finish()?;
    Ok(SplitSummary {
        split: split.to_string(),
        records: shards.iter().map(|s| s.records).sum(),
        bytes: shards.iter().map(|s| s.bytes).sum(),
        shards,
    })
}
