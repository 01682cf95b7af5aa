//! Error taxonomy for dataset conversion.
//!
//! Every failure is fatal for the run: nothing here is retried or recovered
//! locally. The variants exist so callers (and tests) can tell the failure
//! classes apart instead of matching on message text.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ShardError>;

/// A conversion failure.
#[derive(Debug)]
pub enum ShardError {
    /// Invalid or missing configuration input.
    Config(String),
    /// A source file or directory is missing or unreadable.
    SourceRead { path: PathBuf, source: io::Error },
    /// Two source files resolve to the same record key.
    KeyCollision { key: String, path: PathBuf },
    /// The index reports a different label for an entry than its target column.
    LabelMismatch {
        path: PathBuf,
        label: u32,
        target: u32,
    },
    /// Opening, writing or finalizing a shard archive failed.
    ShardIo { path: PathBuf, source: io::Error },
}

impl ShardError {
    pub(crate) fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn source_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shard_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ShardIo {
            path: path.into(),
            source,
        }
    }

    /// Short, stable name of the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::SourceRead { .. } => "source-read",
            Self::KeyCollision { .. } => "key-collision",
            Self::LabelMismatch { .. } => "label-mismatch",
            Self::ShardIo { .. } => "shard-io",
        }
    }
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(message) => write!(f, "invalid configuration: {message}"),
            Self::SourceRead { path, source } => {
                write!(f, "cannot read source {}: {source}", path.display())
            }
            Self::KeyCollision { key, path } => write!(
                f,
                "duplicate record key {key:?} derived from {}",
                path.display()
            ),
            Self::LabelMismatch {
                path,
                label,
                target,
            } => write!(
                f,
                "label {label} for {} disagrees with index target {target}",
                path.display()
            ),
            Self::ShardIo { path, source } => {
                write!(f, "shard I/O failed for {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ShardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceRead { source, .. } | Self::ShardIo { source, .. } => Some(source),
            _ => None,
        }
    }
}
