//! File globbing used to enumerate source images.
//!
//! Results are always sorted so that index construction is deterministic,
//! independent of the order the filesystem hands out directory entries.

use crate::error::{Result, ShardError};
use glob::{MatchOptions, Pattern, glob_with};
use std::path::{Path, PathBuf};

/// File extensions accepted as image payloads (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// Expand a glob pattern into a sorted vector of matching regular files.
///
/// Directories that match are skipped.
///
/// # Errors
/// Returns [`ShardError::Config`] for an invalid pattern and
/// [`ShardError::SourceRead`] when a matched entry cannot be inspected.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let paths = glob_with(pattern, options)
        .map_err(|e| ShardError::config(format!("invalid glob pattern {pattern:?}: {e}")))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            ShardError::source_read(path, e.into_error())
        })?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// List the image files anywhere below `dir`, sorted.
///
/// Subdirectories are walked recursively, following symlinks. Hidden files
/// and hidden subdirectories are ignored, as are files whose extension is not
/// in [`IMAGE_EXTENSIONS`].
///
/// # Errors
/// [`ShardError::SourceRead`] if part of the tree cannot be read.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let files = expand_glob(&format!("{escaped}/**/*"))?;
    Ok(files
        .into_iter()
        .filter(|p| is_image_file(p) && !is_hidden_below(dir, p))
        .collect())
}

fn is_hidden_below(dir: &Path, path: &Path) -> bool {
    path.strip_prefix(dir).is_ok_and(|rel| {
        rel.components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    })
}

/// Whether the path carries one of the accepted image extensions.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
