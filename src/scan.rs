//! Finding the images a batch command works on.
//!
//! Walks the root recursively with `walkdir`, in file-name order so runs are
//! reproducible, and keeps regular files whose extension (case-insensitive)
//! is in the requested set. Output trees this tool writes itself
//! (`converted/`, `thumbnails/`) are pruned by name, and PNG sidecar
//! thumbnails (`*.thumb.jpg`) are never treated as photos.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extensions with a thumbnail processor.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "png"];

/// Extensions accepted as conversion sources and gallery entries.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

const SIDECAR_SUFFIX: &str = ".thumb.jpg";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    extensions.contains(&ext.as_str())
}

fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(SIDECAR_SUFFIX))
        .unwrap_or(false)
}

fn is_pruned(entry: &DirEntry, exclude_dirs: &[&str]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && exclude_dirs
            .iter()
            .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
}

/// Every file below `root` with one of `extensions`, skipping directories
/// named in `exclude_dirs` at any depth.
pub fn find_images(
    root: &Path,
    extensions: &[&str],
    exclude_dirs: &[&str],
) -> Result<Vec<PathBuf>, ScanError> {
    let mut images = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_pruned(e, exclude_dirs));

    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && has_extension(path, extensions) && !is_sidecar(path) {
            images.push(path.to_path_buf());
        }
    }
    Ok(images)
}
