pub mod archive;
pub mod compression;
pub mod glob;
