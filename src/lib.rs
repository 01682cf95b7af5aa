//! # Shardpack
//!
//! An **offline dataset converter** that packs an image classification
//! dataset, stored as one directory of encoded images per class, into a
//! sequence of size-bounded tar shards suited to fast sequential reads during
//! training.
//!
//! ## Key Features
//!
//! - **No re-encoding** - image bytes are copied into the shards verbatim
//! - **Shuffled order** - each split is written in a uniformly random order,
//!   optionally fixed by a seed
//! - **Bounded shards** - shards rotate on a byte budget and a record cap
//! - **Self-describing records** - every record is a `<key>.<ext>` payload
//!   member plus a `<key>.cls` label member, readable by any tar tool
//! - **Optional compression** - name the extension `tar.gz`, `tar.zst`, ...
//!   (each codec behind a feature flag)
//!
//! ## Quick Start
//!
//! ```no_run
//! use shardpack::convert::{convert, ConvertOptions};
//! # fn main() -> shardpack::Result<()> {
//!
//! let options = ConvertOptions {
//!     source_root: "/imagenet".into(),
//!     output_dir: "./data".into(),
//!     splits: vec!["train".into(), "val".into()],
//!     ..ConvertOptions::default()
//! };
//! let summary = convert(&options)?;
//! println!("{} records in {} shards", summary.total_records(), summary.total_shards());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Dataset index
//!
//! A [`DatasetIndex`] gives positional access to `(path, label)` pairs of one
//! split. [`ImageFolderIndex`] reads the `root/<split>/<class>/<image>` layout
//! and labels classes by their sorted position.
//!
//! ### Records and keys
//!
//! A [`Record`] is `(key, payload, label)`. The key is the source file name
//! without its extension and must be unique within the [`KeyRegistry`]'s
//! [`KeyScope`]: across the whole run by default, or per split.
//!
//! ### Shards
//!
//! A [`ShardWriter`] owns the currently open shard and rotates to the next
//! index once appending a record would exceed [`ShardLimits::max_bytes`]. An
//! empty shard always accepts a record, so oversized records never block
//! progress; a split with no records produces no shards.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` - shard stream codecs
//! - `checksums` - SHA-256 digest of each finished shard in the run summary

pub mod convert;
pub mod error;
pub mod index;
pub mod io;
pub mod record;
pub mod shard;
pub mod shuffle;
pub mod testing;

pub use convert::{ConversionSummary, ConvertOptions, SplitSummary, convert, write_split};
pub use error::{Result, ShardError};
pub use index::{DatasetIndex, ImageFolderIndex, IndexEntry};
pub use record::{KeyRegistry, KeyScope, Record};
pub use shard::{ShardInfo, ShardLimits, ShardPattern, ShardWriter};
pub use shuffle::Shuffler;
