//! EXIF family: JPEG files with the thumbnail in the IFD1 slot.

use super::{ThumbnailProcessor, extracted_path, report, rewrite_preserving_times};
use crate::imaging::jpeg::{self, JpegError};
use crate::imaging::{Quality, thumbnail};
use crate::provenance::{self, ProvenanceSource};
use std::path::Path;
use thiserror::Error;

/// Qualities tried in turn until the EXIF block fits in one APP1 segment.
const QUALITY_STEPS: &[u8] = &[90, 75, 60, 40];

#[derive(Error, Debug)]
enum ExifFailure {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Jpeg(#[from] JpegError),
    #[error("decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("provenance record could not be serialized: {0}")]
    Record(#[from] serde_json::Error),
}

pub struct ExifProcessor;

fn load(path: &Path) -> Result<(Vec<u8>, img_parts::jpeg::Jpeg), ExifFailure> {
    let data = std::fs::read(path)?;
    let parsed = jpeg::parse(data.clone())?;
    Ok((data, parsed))
}

/// Build the EXIF payload, stepping quality down if the thumbnail is too
/// large for a single segment.
fn exif_with_thumbnail(
    image: &image::DynamicImage,
    existing: Option<&::exif::Exif>,
    description: &str,
) -> Result<Vec<u8>, ExifFailure> {
    let raster = thumbnail::render(image);
    let mut last_error = None;
    for &step in QUALITY_STEPS {
        let thumb = thumbnail::encode_jpeg(&raster, Quality::new(step))?;
        match jpeg::build_exif(existing, Some(description), Some(&thumb)) {
            Ok(payload) => return Ok(payload),
            Err(e @ JpegError::ExifTooLarge(_)) => last_error = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(last_error.unwrap_or(JpegError::ExifTooLarge(0)).into())
}

impl ExifProcessor {
    fn add(&self, path: &Path, source: &dyn ProvenanceSource) -> Result<bool, ExifFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let (data, mut parsed) = load(path)?;
        let existing = jpeg::read_exif(&parsed);
        if existing.as_ref().and_then(jpeg::exif_thumbnail).is_some() {
            tracing::debug!(path = %path.display(), "thumbnail already present");
            return Ok(false);
        }

        let record = provenance::resolve_for_file(path, source)?;
        let image = image::load_from_memory(&data)?;
        let payload = exif_with_thumbnail(&image, existing.as_ref(), &record.to_comment()?)?;

        jpeg::set_exif(&mut parsed, Some(payload));
        rewrite_preserving_times(path, &jpeg::to_bytes(parsed))?;
        tracing::info!(path = %path.display(), "added EXIF thumbnail");
        Ok(true)
    }

    fn extract(&self, path: &Path, dest_dir: &Path) -> Result<bool, ExifFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let (_, parsed) = load(path)?;
        let Some(exif) = jpeg::read_exif(&parsed) else {
            return Ok(false);
        };
        let Some(thumb) = jpeg::exif_thumbnail(&exif) else {
            tracing::debug!(path = %path.display(), "no thumbnail found");
            return Ok(false);
        };
        let Some(target) = extracted_path(path, dest_dir) else {
            return Ok(false);
        };
        std::fs::create_dir_all(dest_dir)?;
        std::fs::write(&target, thumb)?;
        tracing::info!(path = %path.display(), thumbnail = %target.display(), "extracted thumbnail");
        Ok(true)
    }

    fn remove(&self, path: &Path) -> Result<bool, ExifFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let (_, mut parsed) = load(path)?;
        let Some(exif) = jpeg::read_exif(&parsed) else {
            return Ok(false);
        };
        if jpeg::exif_thumbnail(&exif).is_none() {
            tracing::debug!(path = %path.display(), "no thumbnail to remove");
            return Ok(false);
        }

        let payload = jpeg::build_exif(Some(&exif), None, None)?;
        jpeg::set_exif(&mut parsed, Some(payload));
        rewrite_preserving_times(path, &jpeg::to_bytes(parsed))?;
        tracing::info!(path = %path.display(), "removed EXIF thumbnail");
        Ok(true)
    }
}

impl ThumbnailProcessor for ExifProcessor {
    fn has_thumbnail(&self, path: &Path) -> bool {
        load(path)
            .ok()
            .and_then(|(_, parsed)| jpeg::read_exif(&parsed))
            .is_some_and(|exif| jpeg::exif_thumbnail(&exif).is_some())
    }

    fn add_thumbnail(&self, path: &Path, source: &dyn ProvenanceSource) -> bool {
        report("add thumbnail", path, self.add(path, source))
    }

    fn extract_thumbnail(&self, path: &Path, dest_dir: &Path) -> bool {
        report("extract thumbnail", path, self.extract(path, dest_dir))
    }

    fn remove_thumbnail(&self, path: &Path) -> bool {
        report("remove thumbnail", path, self.remove(path))
    }
}
