//! Sequential batch drivers behind the CLI commands.
//!
//! Each driver scans the root once, applies the single-file operation to
//! every match in order, and returns one [`FileReport`] per file. A failure
//! on one file is recorded and the run moves on; nothing is retried.

use crate::config::OutputConfig;
use crate::processors;
use crate::provenance::ProvenanceSource;
use crate::scan::{self, ScanError};
use crate::transform::{self, Converter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran. Carries the file it produced, if any.
    Done(Option<PathBuf>),
    /// Nothing to do, with the reason.
    Skipped(&'static str),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl FileReport {
    fn new(path: PathBuf, outcome: Outcome) -> Self {
        Self { path, outcome }
    }
}

/// `Ok(true)` → done, `Ok(false)` → failed (already logged by the processor).
fn from_processor(
    result: Result<bool, processors::ProcessorError>,
    produced: Option<PathBuf>,
    verb: &str,
) -> Outcome {
    match result {
        Ok(true) => Outcome::Done(produced),
        Ok(false) => Outcome::Failed(format!("could not {verb} thumbnail")),
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

pub fn add_thumbnails(
    root: &Path,
    output: &OutputConfig,
    source: &dyn ProvenanceSource,
) -> Result<Vec<FileReport>, ScanError> {
    let images = scan::find_images(root, scan::THUMBNAIL_EXTENSIONS, &[output.thumbnails_dir.as_str()])?;
    Ok(images
        .into_iter()
        .map(|path| {
            let outcome = if processors::has_thumbnail(&path) {
                Outcome::Skipped("already has a thumbnail")
            } else {
                from_processor(processors::add_thumbnail(&path, source), None, "add")
            };
            FileReport::new(path, outcome)
        })
        .collect())
}

pub fn extract_thumbnails(root: &Path, output: &OutputConfig) -> Result<Vec<FileReport>, ScanError> {
    let dest = root.join(&output.thumbnails_dir);
    let images = scan::find_images(root, scan::THUMBNAIL_EXTENSIONS, &[output.thumbnails_dir.as_str()])?;
    Ok(images
        .into_iter()
        .map(|path| {
            let outcome = if !processors::has_thumbnail(&path) {
                Outcome::Skipped("no thumbnail")
            } else {
                let produced = processors::extracted_path(&path, &dest);
                from_processor(processors::extract_thumbnail(&path, &dest), produced, "extract")
            };
            FileReport::new(path, outcome)
        })
        .collect())
}

pub fn remove_thumbnails(root: &Path, output: &OutputConfig) -> Result<Vec<FileReport>, ScanError> {
    let images = scan::find_images(root, scan::THUMBNAIL_EXTENSIONS, &[output.thumbnails_dir.as_str()])?;
    Ok(images
        .into_iter()
        .map(|path| {
            let outcome = if !processors::has_thumbnail(&path) {
                Outcome::Skipped("no thumbnail")
            } else {
                from_processor(processors::remove_thumbnail(&path), None, "remove")
            };
            FileReport::new(path, outcome)
        })
        .collect())
}

pub fn convert_all(
    root: &Path,
    target_format: &str,
    output: &OutputConfig,
    converter: &dyn Converter,
    source: &dyn ProvenanceSource,
) -> Result<Vec<FileReport>, ScanError> {
    let images = scan::find_images(
        root,
        scan::IMAGE_EXTENSIONS,
        &[output.converted_dir.as_str(), output.thumbnails_dir.as_str()],
    )?;
    Ok(images
        .into_iter()
        .map(|path| {
            let result = transform::convert_to_format(
                &path,
                target_format,
                root,
                &output.converted_dir,
                converter,
                source,
            );
            let outcome = match result {
                Ok(Some(written)) => Outcome::Done(Some(written)),
                Ok(None) => Outcome::Skipped("conversion output"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "conversion failed");
                    Outcome::Failed(e.to_string())
                }
            };
            FileReport::new(path, outcome)
        })
        .collect())
}

pub fn compress_tiffs(
    root: &Path,
    output: &OutputConfig,
    source: &dyn ProvenanceSource,
) -> Result<Vec<FileReport>, ScanError> {
    let images = scan::find_images(root, scan::TIFF_EXTENSIONS, &[output.thumbnails_dir.as_str()])?;
    Ok(images
        .into_iter()
        .map(|path| {
            let outcome = match transform::compress_tiff(&path, source) {
                Ok(()) => Outcome::Done(None),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "compression failed");
                    Outcome::Failed(e.to_string())
                }
            };
            FileReport::new(path, outcome)
        })
        .collect())
}
