//! Structural-TIFF family: the thumbnail is a reduced-resolution sub-image
//! referenced from page 0's `SubIFDs` tag.
//!
//! Detection looks only at that pointer. A plain multi-page TIFF is *not*
//! treated as thumbnailed, and neither is an old-style file that stored the
//! thumbnail as a second top-level page.
//!
//! Every mutation is a single-pass rewrite of the whole file: the primary
//! raster, its resolution, its description (carrying the provenance record)
//! and, for add, the new sub-image.

use super::{ThumbnailProcessor, extracted_path, report, rewrite_preserving_times};
use crate::imaging::tiff::{self, Compression, Page, TiffError, TiffFile};
use crate::imaging::{Quality, thumbnail};
use crate::provenance::{self, ProvenanceSource};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
enum TiffFailure {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tiff(#[from] TiffError),
    #[error("thumbnail encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("provenance record could not be serialized: {0}")]
    Record(#[from] serde_json::Error),
}

pub struct TiffProcessor;

/// Compression for a rewritten primary page: kept when it is one this crate
/// writes, otherwise stored uncompressed.
fn rewrite_compression(code: u16) -> Compression {
    Compression::from_code(code).unwrap_or(Compression::None)
}

/// The 256×256 raster stored as the sub-image.
fn thumbnail_raster(primary: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageRgb8(thumbnail::render(primary).to_rgb8())
}

impl TiffProcessor {
    fn add(&self, path: &Path, source: &dyn ProvenanceSource) -> Result<bool, TiffFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let data = std::fs::read(path)?;
        let file = TiffFile::parse(&data)?;
        let ifd0 = file.ifd0()?;
        if !ifd0.sub_ifds().is_empty() {
            tracing::debug!(path = %path.display(), "thumbnail already present");
            return Ok(false);
        }

        let record = provenance::resolve_for_file(path, source)?;
        let comment = record.to_comment()?;
        let primary = tiff::load_page0(&data)?;
        let thumb = thumbnail_raster(&primary);
        let compression = rewrite_compression(ifd0.compression_code());

        let page = Page {
            description: Some(comment.as_str()),
            resolution: ifd0.resolution(),
            ..Page::new(&primary, compression)
        };
        let encoded = tiff::encode(&page, Some(&Page::new(&thumb, compression)))?;
        rewrite_preserving_times(path, &encoded)?;
        tracing::info!(path = %path.display(), "added TIFF sub-image thumbnail");
        Ok(true)
    }

    fn extract(&self, path: &Path, dest_dir: &Path) -> Result<bool, TiffFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let data = std::fs::read(path)?;
        let file = TiffFile::parse(&data)?;
        let Some(&offset) = file.ifd0()?.sub_ifds().first() else {
            tracing::debug!(path = %path.display(), "no thumbnail found");
            return Ok(false);
        };
        let Some(target) = extracted_path(path, dest_dir) else {
            return Ok(false);
        };

        let raster = file.decode_page(&file.read_ifd(offset)?)?;
        let jpeg = thumbnail::encode_jpeg(&raster, Quality::default())?;
        std::fs::create_dir_all(dest_dir)?;
        std::fs::write(&target, jpeg)?;
        tracing::info!(path = %path.display(), thumbnail = %target.display(), "extracted thumbnail");
        Ok(true)
    }

    fn remove(&self, path: &Path) -> Result<bool, TiffFailure> {
        if !path.is_file() {
            return Ok(false);
        }
        let data = std::fs::read(path)?;
        let file = TiffFile::parse(&data)?;
        let ifd0 = file.ifd0()?;
        if ifd0.sub_ifds().is_empty() {
            tracing::debug!(path = %path.display(), "no thumbnail to remove");
            return Ok(false);
        }

        let primary = tiff::load_page0(&data)?;
        let description = ifd0.description();
        let page = Page {
            description: description.as_deref(),
            resolution: ifd0.resolution(),
            ..Page::new(&primary, rewrite_compression(ifd0.compression_code()))
        };
        rewrite_preserving_times(path, &tiff::encode(&page, None)?)?;
        tracing::info!(path = %path.display(), "removed TIFF sub-image thumbnail");
        Ok(true)
    }
}

impl ThumbnailProcessor for TiffProcessor {
    fn has_thumbnail(&self, path: &Path) -> bool {
        let Ok(data) = std::fs::read(path) else {
            return false;
        };
        TiffFile::parse(&data)
            .and_then(|file| file.ifd0())
            .is_ok_and(|ifd0| !ifd0.sub_ifds().is_empty())
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
