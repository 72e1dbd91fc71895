//! PNG family: the thumbnail is a sibling `<name>.thumb.jpg` file.
//!
//! The PNG itself is never rewritten, so no provenance record is embedded
//! here. PNGs only gain a record when produced as a conversion target.

use super::{ThumbnailProcessor, extracted_path, report};
use crate::imaging::{self, Quality, thumbnail};
use crate::provenance::ProvenanceSource;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
enum SidecarFailure {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] imaging::LoadError),
    #[error("thumbnail encode failed: {0}")]
    Image(#[from] image::ImageError),
}

pub struct PngSidecarProcessor;

/// `photo.png` → `photo.png.thumb.jpg`.
pub fn sidecar_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!("{name}.thumb.jpg")))
}

impl PngSidecarProcessor {
    fn add(&self, path: &Path) -> Result<bool, SidecarFailure> {
        if !path.is_file() || self.has_thumbnail(path) {
            return Ok(false);
        }
        let Some(sidecar) = sidecar_path(path) else {
            return Ok(false);
        };
        let jpeg = thumbnail::jpeg_thumbnail(&imaging::load(path)?, Quality::default())?;
        super::replace_atomically(&sidecar, &jpeg)?;
        tracing::info!(path = %path.display(), sidecar = %sidecar.display(), "added sidecar thumbnail");
        Ok(true)
    }

    fn extract(&self, path: &Path, dest_dir: &Path) -> Result<bool, SidecarFailure> {
        let (Some(sidecar), Some(target)) = (sidecar_path(path), extracted_path(path, dest_dir))
        else {
            return Ok(false);
        };
        if !sidecar.is_file() {
            tracing::debug!(path = %path.display(), "no thumbnail found");
            return Ok(false);
        }
        std::fs::create_dir_all(dest_dir)?;
        std::fs::copy(&sidecar, &target)?;
        crate::timestamps::FileTimestamps::capture(&sidecar)?.apply(&target)?;
        tracing::info!(path = %path.display(), thumbnail = %target.display(), "extracted thumbnail");
        Ok(true)
    }

    fn remove(&self, path: &Path) -> Result<bool, SidecarFailure> {
        let Some(sidecar) = sidecar_path(path).filter(|s| s.is_file()) else {
            tracing::debug!(path = %path.display(), "no thumbnail to remove");
            return Ok(false);
        };
        std::fs::remove_file(&sidecar)?;
        tracing::info!(path = %path.display(), "removed sidecar thumbnail");
        Ok(true)
    }
}

impl ThumbnailProcessor for PngSidecarProcessor {
    fn has_thumbnail(&self, path: &Path) -> bool {
        sidecar_path(path).is_some_and(|s| s.is_file())
    }

    fn add_thumbnail(&self, path: &Path, _source: &dyn ProvenanceSource) -> bool {
        report("add thumbnail", path, self.add(path))
    }

    fn extract_thumbnail(&self, path: &Path, dest_dir: &Path) -> bool {
        report("extract thumbnail", path, self.extract(path, dest_dir))
    }

    fn remove_thumbnail(&self, path: &Path) -> bool {
        report("remove thumbnail", path, self.remove(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataReader;
    use crate::test_helpers::png_bytes;
    use tempfile::TempDir;

    fn picture(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("pic.png");
        std::fs::write(&path, png_bytes(120, 80)).unwrap();
        path
    }

    #[test]
    fn sidecar_sits_next_to_original() {
        assert_eq!(
            sidecar_path(Path::new("/a/b/pic.png")),
            Some(PathBuf::from("/a/b/pic.png.thumb.jpg"))
        );
    }

    #[test]
    fn lifecycle() {
        let tmp = TempDir::new().unwrap();
        let path = picture(&tmp);
        let original = std::fs::read(&path).unwrap();
        let dest = tmp.path().join("thumbnails");

        assert!(!PngSidecarProcessor.has_thumbnail(&path));
        assert!(PngSidecarProcessor.add_thumbnail(&path, &MetadataReader::native()));
        assert!(PngSidecarProcessor.has_thumbnail(&path));
        assert!(!PngSidecarProcessor.add_thumbnail(&path, &MetadataReader::native()));
        // PNG bytes are never touched
        assert_eq!(std::fs::read(&path).unwrap(), original);

        let sidecar = image::open(tmp.path().join("pic.png.thumb.jpg")).unwrap();
        assert_eq!((sidecar.width(), sidecar.height()), (256, 256));

        assert!(PngSidecarProcessor.extract_thumbnail(&path, &dest));
        assert!(std::fs::metadata(dest.join("pic.png.jpg")).unwrap().len() > 0);

        assert!(PngSidecarProcessor.remove_thumbnail(&path));
        assert!(!PngSidecarProcessor.has_thumbnail(&path));
        assert!(!PngSidecarProcessor.remove_thumbnail(&path));
        assert!(!PngSidecarProcessor.extract_thumbnail(&path, &dest));
    }

    #[test]
    fn undecodable_png_gets_no_sidecar() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\ngarbage").unwrap();

        assert!(!PngSidecarProcessor.add_thumbnail(&path, &MetadataReader::native()));
        assert!(!tmp.path().join("bad.png.thumb.jpg").exists());
    }
}
