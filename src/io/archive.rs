//! Tar member encoding for records.
//!
//! A record becomes two consecutive members that share the record key as
//! their basename: `<key>.<ext>` carrying the raw payload and `<key>.cls`
//! carrying the label as decimal text. Readers group members back into
//! records by splitting the member name at the first dot of its basename.

use crate::record::Record;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, Header};

/// Tar block size; every member occupies a whole number of blocks.
pub const BLOCK_SIZE: u64 = 512;

/// Zero blocks that terminate an archive.
pub const END_OF_ARCHIVE: [u8; 2 * BLOCK_SIZE as usize] = [0; 2 * BLOCK_SIZE as usize];

/// Member suffix carrying the class label.
pub const LABEL_SUFFIX: &str = "cls";

/// Serializes records into tar member bytes.
///
/// The encoder owns a scratch archive builder over an in-memory buffer so the
/// exact serialized length of each record is known before it is committed to
/// a shard.
pub struct RecordEncoder {
    scratch: Builder<Vec<u8>>,
    mtime: u64,
}

impl RecordEncoder {
    /// Encoder stamping every member with the current time.
    #[must_use]
    pub fn new() -> Self {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::with_mtime(mtime)
    }

    /// Encoder stamping every member with a fixed modification time.
    #[must_use]
    pub fn with_mtime(mtime: u64) -> Self {
        Self {
            scratch: Builder::new(Vec::new()),
            mtime,
        }
    }

    /// Serialize `record` into the bytes it will occupy inside an archive.
    ///
    /// # Errors
    /// Fails only if the key cannot be represented as a tar member name.
    pub fn encode(&mut self, record: &Record) -> io::Result<Vec<u8>> {
        let label = record.label.to_string();
        self.append_member(&record.payload_name(), &record.payload)?;
        self.append_member(&format!("{}.{LABEL_SUFFIX}", record.key), label.as_bytes())?;
        Ok(std::mem::take(self.scratch.get_mut()))
    }

    fn append_member(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o444);
        header.set_mtime(self.mtime);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_username("bigdata")?;
        header.set_groupname("bigdata")?;
        self.scratch.append_data(&mut header, name, data)
    }
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of archive bytes a member with `len` data bytes occupies, excluding
/// any long-name extension header.
#[must_use]
pub fn member_size(len: u64) -> u64 {
    BLOCK_SIZE + len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Split a member path into `(key, suffix)` at the first dot of its basename.
///
/// `train/n0144.jpg` yields `("train/n0144", "jpg")`; a basename without a dot
/// yields an empty suffix.
#[must_use]
pub fn split_member_name(name: &str) -> (&str, &str) {
    let base_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[base_start..].find('.') {
        Some(dot) => {
            let at = base_start + dot;
            (&name[..at], &name[at + 1..])
        }
        None => (name, ""),
    }
}
