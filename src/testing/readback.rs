//! Decode shards back into records.
//!
//! This is a whole-file verification helper, not a data loader: it reads a
//! shard eagerly and rebuilds records by grouping consecutive members that
//! share a key.

use crate::io::archive::{LABEL_SUFFIX, split_member_name};
use crate::io::compression::auto_detect_reader;
use crate::record::Record;
use crate::shard::ShardPattern;
use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Default)]
struct Partial {
    key: String,
    payload: Option<(String, Vec<u8>)>,
    label: Option<u32>,
}

impl Partial {
    fn into_record(self, shard: &Path) -> Result<Record> {
        let Some((extension, payload)) = self.payload else {
            bail!("record {:?} in {} has no payload member", self.key, shard.display());
        };
        let Some(label) = self.label else {
            bail!("record {:?} in {} has no label member", self.key, shard.display());
        };
        Ok(Record {
            key: self.key,
            payload,
            label,
            extension,
        })
    }
}

/// Read every record of one shard, in archive order.
///
/// Compressed shards are detected from the file extension or magic bytes.
///
/// # Errors
/// Returns an error if the file cannot be read, is not a tar archive, or
/// holds a member group missing its payload or label.
pub fn read_shard(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = auto_detect_reader(file, path)?;
    let mut archive = tar::Archive::new(reader);

    let mut records = Vec::new();
    let mut current: Option<Partial> = None;
    for entry in archive
        .entries()
        .with_context(|| format!("read archive {}", path.display()))?
    {
        let mut entry = entry.with_context(|| format!("read member in {}", path.display()))?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let (key, suffix) = split_member_name(&name);
        let (key, suffix) = (key.to_string(), suffix.to_string());

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("read member {name} in {}", path.display()))?;

        if current.as_ref().is_some_and(|p| p.key != key) {
            if let Some(done) = current.take() {
                records.push(done.into_record(path)?);
            }
        }
        let partial = current.get_or_insert_with(|| Partial {
            key: key.clone(),
            ..Partial::default()
        });
        if suffix == LABEL_SUFFIX {
            let text = String::from_utf8(data)
                .with_context(|| format!("label of {key} is not UTF-8"))?;
            let label = text
                .trim()
                .parse::<u32>()
                .with_context(|| format!("label of {key} is not an integer: {text:?}"))?;
            partial.label = Some(label);
        } else {
            partial.payload = Some((suffix, data));
        }
    }
    if let Some(done) = current {
        records.push(done.into_record(path)?);
    }
    Ok(records)
}

/// Read every shard a pattern produced, stopping at the first missing index.
///
/// Each inner vector holds one shard's records.
///
/// # Errors
/// Propagates any [`read_shard`] failure.
pub fn read_split(pattern: &ShardPattern) -> Result<Vec<Vec<Record>>> {
    let mut shards = Vec::new();
    loop {
        let path = pattern.path(shards.len());
        if !path.exists() {
            return Ok(shards);
        }
        shards.push(read_shard(&path)?);
    }
}
