//! Per-format thumbnail processors.
//!
//! One capability interface, [`ThumbnailProcessor`], three independent
//! implementations chosen by file extension:
//!
//! | Extensions | Processor | Thumbnail lives in | Provenance record |
//! |---|---|---|---|
//! | `.jpg` `.jpeg` | [`ExifProcessor`] | EXIF IFD1 JPEG slot | EXIF `ImageDescription` |
//! | `.tif` `.tiff` | [`TiffProcessor`] | reduced-resolution sub-image via `SubIFDs` | page 0 `ImageDescription` |
//! | `.png` | [`PngSidecarProcessor`] | sibling `<name>.thumb.jpg` | not embedded |
//!
//! ## Contract
//!
//! Processor methods never fail: every absence or I/O problem comes back as
//! `false` (and is logged). Mutating methods write to a temporary file in the
//! same directory, stamp the original's `(atime, mtime)` and permissions onto
//! it, and atomically rename it over the original. The original is either
//! fully replaced, times included, or untouched.
//!
//! The module-level functions ([`add_thumbnail`] etc.) dispatch by extension.
//! Asking them to mutate a file with no registered processor is a usage error
//! and returns [`ProcessorError::UnsupportedFormat`]; [`has_thumbnail`] just
//! answers `false`.

mod exif;
mod png;
mod tiff;

pub use self::exif::ExifProcessor;
pub use self::png::PngSidecarProcessor;
pub use self::tiff::TiffProcessor;

use crate::provenance::ProvenanceSource;
use crate::timestamps::FileTimestamps;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("unsupported image format for thumbnail operations: {0:?}")]
    UnsupportedFormat(String),
}

/// Thumbnail capability surface shared by every container family.
pub trait ThumbnailProcessor: Sync {
    /// Whether the file carries a thumbnail. False on any read failure.
    fn has_thumbnail(&self, path: &Path) -> bool;

    /// Embed a fresh 256×256 thumbnail (and the provenance record, where the
    /// format carries one). False if the file is missing, already has a
    /// thumbnail, or the rewrite fails.
    fn add_thumbnail(&self, path: &Path, source: &dyn ProvenanceSource) -> bool;

    /// Write the thumbnail as `<file name>.jpg` under `dest_dir`.
    fn extract_thumbnail(&self, path: &Path, dest_dir: &Path) -> bool;

    /// Drop the thumbnail. False if there is none.
    fn remove_thumbnail(&self, path: &Path) -> bool;
}

static EXIF: ExifProcessor = ExifProcessor;
static TIFF: TiffProcessor = TiffProcessor;
static PNG: PngSidecarProcessor = PngSidecarProcessor;

/// Extension → processor registry. Lowercase, without the dot.
static PROCESSORS: &[(&str, &dyn ThumbnailProcessor)] = &[
    ("jpg", &EXIF),
    ("jpeg", &EXIF),
    ("tif", &TIFF),
    ("tiff", &TIFF),
    ("png", &PNG),
];

/// Extensions with a registered processor.
pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
    PROCESSORS.iter().map(|(ext, _)| *ext)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// The processor registered for a file's extension (case-insensitive).
pub fn processor_for(path: &Path) -> Option<&'static dyn ThumbnailProcessor> {
    let ext = extension_of(path);
    PROCESSORS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, processor)| *processor)
}

fn require(path: &Path) -> Result<&'static dyn ThumbnailProcessor, ProcessorError> {
    processor_for(path).ok_or_else(|| ProcessorError::UnsupportedFormat(extension_of(path)))
}

pub fn has_thumbnail(path: &Path) -> bool {
    processor_for(path).is_some_and(|p| p.has_thumbnail(path))
}

pub fn add_thumbnail(path: &Path, source: &dyn ProvenanceSource) -> Result<bool, ProcessorError> {
    Ok(require(path)?.add_thumbnail(path, source))
}

pub fn extract_thumbnail(path: &Path, dest_dir: &Path) -> Result<bool, ProcessorError> {
    Ok(require(path)?.extract_thumbnail(path, dest_dir))
}

pub fn remove_thumbnail(path: &Path) -> Result<bool, ProcessorError> {
    Ok(require(path)?.remove_thumbnail(path))
}

/// `<dest_dir>/<file name>.jpg`, e.g. `thumbnails/photo.tif.jpg`.
pub fn extracted_path(path: &Path, dest_dir: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(dest_dir.join(format!("{name}.jpg")))
}

/// Write `bytes` to a temporary sibling of `path`, then rename it over
/// `path`. The temporary is removed if anything fails before the rename.
pub(crate) fn replace_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    stage_and_persist(path, bytes, None)
}

/// [`replace_atomically`] with the original's timestamps carried over.
///
/// The times go onto the staged file before the rename, so a read-only
/// original never has to be reopened for writing.
pub(crate) fn rewrite_preserving_times(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let times = FileTimestamps::capture(path)?;
    stage_and_persist(path, bytes, Some(&times))
}

fn stage_and_persist(path: &Path, bytes: &[u8], times: Option<&FileTimestamps>) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    if let Some(times) = times {
        times.apply_to(staged.as_file())?;
    }
    // Permissions last: a read-only mode must not block the steps above
    if let Ok(meta) = std::fs::metadata(path) {
        staged.as_file().set_permissions(meta.permissions())?;
    }
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Log a failed operation and collapse it to `false`.
pub(crate) fn report<E: std::fmt::Display>(op: &str, path: &Path, result: Result<bool, E>) -> bool {
    match result {
        Ok(done) => done,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "{op} failed");
            false
        }
    }
}
