//! Testing utilities for shard conversion.
//!
//! This module lets downstream tests exercise the converter without a real
//! dataset on disk and verify its output without extra tooling:
//!
//! - **Fixtures**: build throwaway image-folder trees ([`ImageFolderFixture`])
//!   and fake encoded payloads ([`fake_jpeg`])
//! - **Read-back**: decode shards into records again ([`read_shard`],
//!   [`read_split`])
//! - **Assertions**: check the shard invariants ([`assert_shards_within_limits`],
//!   [`assert_same_records`])
//!
//! # Quick Start
//!
//! ```no_run
//! use shardpack::convert::{convert, ConvertOptions};
//! use shardpack::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = ImageFolderFixture::new()?
//!     .image("train", "cat", "cat_001.jpg", &fake_jpeg(2048, 1))?
//!     .image("train", "dog", "dog_001.jpg", &fake_jpeg(4096, 2))?;
//!
//! let options = ConvertOptions {
//!     source_root: fixture.source_root(),
//!     output_dir: fixture.output_dir(),
//!     splits: vec!["train".into()],
//!     seed: Some(7),
//!     ..ConvertOptions::default()
//! };
//! let summary = convert(&options)?;
//!
//! let shards = read_split(&options.pattern("train"))?;
//! assert_eq!(shards.concat().len() as u64, summary.total_records());
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod readback;

pub use assertions::*;
pub use fixtures::*;
pub use readback::*;
