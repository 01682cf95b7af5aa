//! Records and the steps that build them from source files.
//!
//! A record is assembled from one index entry in three steps: read the raw
//! payload bytes ([`read_payload`]), derive the key from the file name
//! ([`derive_key`], vetted by [`check_key`]), and claim that key in the run's
//! [`KeyRegistry`].

use crate::error::{Result, ShardError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Extension used for payloads whose source file has none.
pub const DEFAULT_PAYLOAD_EXTENSION: &str = "jpg";

/// The unit written into a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier unique within the key registry's scope.
    pub key: String,
    /// Raw encoded image bytes, exactly as stored on disk.
    pub payload: Vec<u8>,
    /// Integer class id.
    pub label: u32,
    /// Member suffix for the payload (`jpg`, `png`, ...).
    pub extension: String,
}

impl Record {
    /// Archive member name of the payload.
    #[must_use]
    pub fn payload_name(&self) -> String {
        format!("{}.{}", self.key, self.extension)
    }
}

/// Read a file's full contents.
///
/// The file handle is released on every path out of this function.
///
/// # Errors
/// [`ShardError::SourceRead`] if the file is missing or unreadable.
pub fn read_payload(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| ShardError::source_read(path, e))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| ShardError::source_read(path, e))?;
    Ok(buf)
}

/// The file name of `path` without its final extension.
///
/// `train/n01440764/n01440764_10026.JPEG` yields `n01440764_10026`. No
/// collision handling happens here.
#[must_use]
pub fn derive_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ensure `key` can name archive members unambiguously.
///
/// Sample readers split member names at the first dot, so a key holding a
/// dot would be read back as a different record.
///
/// # Errors
/// [`ShardError::Config`] naming the offending source file.
pub fn check_key(key: &str, path: &Path) -> Result<()> {
    if key.is_empty() || key.contains('.') {
        return Err(ShardError::config(format!(
            "cannot derive a record key from {}: {key:?} is empty or contains '.'",
            path.display()
        )));
    }
    Ok(())
}

/// Payload member suffix for a source path: the lowercased extension, with
/// `jpeg` folded into `jpg`.
#[must_use]
pub fn payload_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("jpeg") => DEFAULT_PAYLOAD_EXTENSION.to_string(),
        Some(ext) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => DEFAULT_PAYLOAD_EXTENSION.to_string(),
    }
}

/// Build a record. Pure construction; no I/O.
#[must_use]
pub fn assemble(path: &Path, label: u32, key: String, payload: Vec<u8>) -> Record {
    Record {
        key,
        payload,
        label,
        extension: payload_extension(path),
    }
}

/// How far key uniqueness reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// Keys must be unique across every split converted in one run.
    #[default]
    Run,
    /// Each split starts with an empty registry.
    Split,
}

impl std::str::FromStr for KeyScope {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "run" => Ok(Self::Run),
            "split" => Ok(Self::Split),
            other => Err(ShardError::config(format!(
                "unknown key scope {other:?} (expected \"run\" or \"split\")"
            ))),
        }
    }
}

/// Set of keys already written.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    scope: KeyScope,
    seen: HashSet<String>,
}

impl KeyRegistry {
    #[must_use]
    pub fn new(scope: KeyScope) -> Self {
        Self {
            scope,
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    /// Record `key` as used.
    ///
    /// # Errors
    /// [`ShardError::KeyCollision`] if the key was claimed before; the registry
    /// is left unchanged in that case.
    pub fn claim(&mut self, key: &str, path: &Path) -> Result<()> {
        if self.seen.contains(key) {
            return Err(ShardError::KeyCollision {
                key: key.to_string(),
                path: path.to_path_buf(),
            });
        }
        self.seen.insert(key.to_string());
        Ok(())
    }

    /// Called before each split; forgets every key when scoped per split.
    pub fn begin_split(&mut self) {
        if self.scope == KeyScope::Split {
            self.seen.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn key_strips_directory_and_extension() {
        let p = PathBuf::from("/imagenet/train/n01440764/n01440764_10026.JPEG");
        assert_eq!(derive_key(&p), "n01440764_10026");
        assert_eq!(derive_key(Path::new("archive.tar.gz")), "archive.tar");
        assert_eq!(derive_key(Path::new("noext")), "noext");
    }

    #[test]
    fn dotted_keys_are_rejected() {
        let path = Path::new("train/a/img.v2.jpg");
        let err = check_key(&derive_key(path), path).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("img.v2"));
        assert!(check_key("n01440764_10026", path).is_ok());
    }

    #[test]
    fn payload_extension_normalises_jpeg() {
        assert_eq!(payload_extension(Path::new("a.JPEG")), "jpg");
        assert_eq!(payload_extension(Path::new("a.jpeg")), "jpg");
        assert_eq!(payload_extension(Path::new("a.PNG")), "png");
        assert_eq!(payload_extension(Path::new("a")), "jpg");
    }

    #[test]
    fn read_payload_returns_exact_bytes() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("x.jpg");
        std::fs::write(&path, [0xff, 0xd8, 0xff, 0xe0])?;
        assert_eq!(read_payload(&path)?, vec![0xff, 0xd8, 0xff, 0xe0]);
        Ok(())
    }

    #[test]
    fn missing_source_is_a_source_read_error() {
        let err = read_payload(Path::new("/definitely/not/here.jpg")).unwrap_err();
        assert!(matches!(err, ShardError::SourceRead { .. }));
    }

    #[test]
    fn duplicate_claim_fails_and_leaves_registry_unchanged() {
        let mut reg = KeyRegistry::new(KeyScope::Run);
        reg.claim("a", Path::new("x/a.jpg")).unwrap();
        let err = reg.claim("a", Path::new("y/a.jpg")).unwrap_err();
        assert!(matches!(err, ShardError::KeyCollision { ref key, .. } if key == "a"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn split_scope_resets_between_splits() {
        let mut run = KeyRegistry::new(KeyScope::Run);
        let mut split = KeyRegistry::new(KeyScope::Split);
        for reg in [&mut run, &mut split] {
            reg.begin_split();
            reg.claim("a", Path::new("a.jpg")).unwrap();
            reg.begin_split();
        }
        assert!(run.claim("a", Path::new("a.jpg")).is_err());
        assert!(split.claim("a", Path::new("a.jpg")).is_ok());
    }

    #[test]
    fn key_scope_parses() {
        assert_eq!("run".parse::<KeyScope>().unwrap(), KeyScope::Run);
        assert_eq!("split".parse::<KeyScope>().unwrap(), KeyScope::Split);
        assert!("global".parse::<KeyScope>().is_err());
    }
}
