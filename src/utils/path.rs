//! Workspace file naming

use std::path::{Path, PathBuf};

/// Name of the fetched source inside a workspace.
pub fn source_file_name(extension: &str) -> String {
    format!("source.{}", extension)
}

/// Name of a produced clip; `number` is one-based and padded to three digits.
pub fn clip_file_name(number: usize, extension: &str) -> String {
    format!("clip_{:03}.{}", number, extension)
}

/// Path of a clip inside `dir`.
pub fn clip_path(dir: &Path, number: usize, extension: &str) -> PathBuf {
    dir.join(clip_file_name(number, extension))
}
