//! Lossless LZW recompression of a TIFF in place.

use super::TransformError;
use crate::imaging::tiff::{self, Compression, Page, TiffFile};
use crate::processors::rewrite_preserving_times;
use crate::provenance::{self, ProvenanceSource};
use std::path::Path;

/// Rewrite `path` with LZW strips on the primary page and, if present, the
/// thumbnail sub-image. The provenance record goes into the primary page's
/// description; resolution tags are kept.
///
/// The new file is staged beside the original and renamed over it, so on
/// any error the original is left exactly as it was.
pub fn compress_tiff(path: &Path, source: &dyn ProvenanceSource) -> Result<(), TransformError> {
    let data = std::fs::read(path)?;
    let file = TiffFile::parse(&data)?;
    let ifd0 = file.ifd0()?;

    let thumbnail = match ifd0.sub_ifds().first() {
        Some(&offset) => Some(file.decode_page(&file.read_ifd(offset)?)?),
        None => None,
    };
    let primary = tiff::load_page0(&data)?;
    let record = provenance::resolve_for_file(path, source)?;
    let comment = record.to_comment()?;

    let page = Page {
        description: Some(comment.as_str()),
        resolution: ifd0.resolution(),
        ..Page::new(&primary, Compression::Lzw)
    };
    let thumb_page = thumbnail
        .as_ref()
        .map(|image| Page::new(image, Compression::Lzw));
    let encoded = tiff::encode(&page, thumb_page.as_ref())?;

    rewrite_preserving_times(path, &encoded)?;
    tracing::info!(
        path = %path.display(),
        thumbnail = thumbnail.is_some(),
        before = data.len(),
        after = encoded.len(),
        "compressed TIFF"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataReader;
    use crate::processors::{ThumbnailProcessor, TiffProcessor};
    use crate::provenance::ProvenanceRecord;
    use crate::test_helpers::{mtime_secs, set_mtime, tiff_bytes};
    use tempfile::TempDir;

    fn page0(path: &Path) -> tiff::Ifd {
        let data = std::fs::read(path).unwrap();
        TiffFile::parse(&data).unwrap().ifd0().unwrap()
    }

    #[test]
    fn plain_tiff_becomes_lzw_with_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.tif");
        std::fs::write(&path, tiff_bytes(200, 150)).unwrap();
        let before = image::open(&path).unwrap().to_rgb8();
        let sha = crate::hash::digest(&path).unwrap();

        compress_tiff(&path, &MetadataReader::native()).unwrap();

        let ifd0 = page0(&path);
        assert_eq!(ifd0.compression_code(), Compression::Lzw.code());
        assert!(ifd0.sub_ifds().is_empty());
        let record = ProvenanceRecord::from_comment(&ifd0.description().unwrap()).unwrap();
        assert_eq!(record.sha1, sha);
        assert_eq!(image::open(&path).unwrap().to_rgb8(), before);
    }

    #[test]
    fn thumbnail_survives_with_lzw() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.tif");
        std::fs::write(&path, tiff_bytes(200, 150)).unwrap();
        assert!(TiffProcessor.add_thumbnail(&path, &MetadataReader::native()));
        let record = page0(&path).description();
        set_mtime(&path, 1_200_000_000);

        compress_tiff(&path, &MetadataReader::native()).unwrap();

        let data = std::fs::read(&path).unwrap();
        let file = TiffFile::parse(&data).unwrap();
        let ifd0 = file.ifd0().unwrap();
        assert_eq!(ifd0.compression_code(), 5);
        assert_eq!(ifd0.description(), record);
        let sub = file.read_ifd(ifd0.sub_ifds()[0]).unwrap();
        assert_eq!(sub.compression_code(), 5);
        assert_eq!(sub.subfile_type(), tiff::SUBFILE_REDUCED_RESOLUTION);
        assert_eq!(mtime_secs(&path), 1_200_000_000);
    }

    #[test]
    fn failure_leaves_original_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.tif");
        std::fs::write(&path, b"MM\x00\x2a\x00\x00\x00\x08\x00\x01").unwrap();

        assert!(compress_tiff(&path, &MetadataReader::native()).is_err());
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"MM\x00\x2a\x00\x00\x00\x08\x00\x01"
        );
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn non_tiff_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fake.tif");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(
            compress_tiff(&path, &MetadataReader::native()),
            Err(TransformError::Tiff(_))
        ));
    }
}
