//! End-to-end checks over the public API, using the native backend so no
//! GraphicsMagick install is needed.
//!
//! Run with: cargo test --test workflow

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image_workflow::hash;
use image_workflow::imaging::jpeg;
use image_workflow::imaging::tiff::{Compression, SUBFILE_REDUCED_RESOLUTION, TiffFile};
use image_workflow::metadata::{MetadataQuery, MetadataReader};
use image_workflow::processors::{self, ProcessorError};
use image_workflow::provenance::ProvenanceRecord;
use image_workflow::timestamps::FileTimestamps;
use image_workflow::transform::{self, NativeConverter};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

// =========================================================================
// Helpers
// =========================================================================

fn sample(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

fn write_sample(dir: &Path, name: &str) -> PathBuf {
    let format = ImageFormat::from_path(name).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, sample(160, 120, format)).unwrap();
    path
}

fn set_mtime(path: &Path, secs: u64) {
    let time = UNIX_EPOCH + Duration::from_secs(secs);
    FileTimestamps {
        accessed: time,
        modified: time,
    }
    .apply(path)
    .unwrap();
}

fn mtime_secs(path: &Path) -> u64 {
    std::fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Canned answers for the external metadata query.
struct CannedQuery {
    short: Option<String>,
    verbose: Option<String>,
}

impl MetadataQuery for CannedQuery {
    fn short_comment(&self, _path: &Path) -> Option<String> {
        self.short.clone()
    }

    fn verbose_dump(&self, _path: &Path) -> Option<String> {
        self.verbose.clone()
    }
}

const FORMATS: &[&str] = &["a.jpg", "a.jpeg", "a.tif", "a.tiff", "a.png"];

// =========================================================================
// Detection
// =========================================================================

#[test]
fn fresh_images_have_no_thumbnail() {
    let tmp = TempDir::new().unwrap();
    for name in FORMATS {
        let path = write_sample(tmp.path(), name);
        assert!(!processors::has_thumbnail(&path), "{name}");
    }
}

#[test]
fn missing_files_answer_false() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();
    for name in FORMATS {
        let path = tmp.path().join(name);
        assert!(!processors::has_thumbnail(&path));
        assert_eq!(processors::add_thumbnail(&path, &reader), Ok(false));
        assert_eq!(processors::extract_thumbnail(&path, tmp.path()), Ok(false));
        assert_eq!(processors::remove_thumbnail(&path), Ok(false));
    }
}

#[test]
fn unsupported_extension_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a.webp");
    std::fs::write(&path, b"RIFF\0\0\0\0WEBP").unwrap();

    assert!(!processors::has_thumbnail(&path));
    let expected = Err(ProcessorError::UnsupportedFormat("webp".to_string()));
    assert_eq!(
        processors::add_thumbnail(&path, &MetadataReader::native()),
        expected
    );
    assert_eq!(processors::extract_thumbnail(&path, tmp.path()), expected);
    assert_eq!(processors::remove_thumbnail(&path), expected);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn add_extract_remove_for_every_family() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("thumbnails");
    let reader = MetadataReader::native();

    for name in FORMATS {
        let path = write_sample(tmp.path(), name);

        assert_eq!(processors::add_thumbnail(&path, &reader), Ok(true), "{name}");
        assert!(processors::has_thumbnail(&path), "{name}");
        assert_eq!(processors::add_thumbnail(&path, &reader), Ok(false), "{name}");

        assert_eq!(processors::extract_thumbnail(&path, &dest), Ok(true), "{name}");
        let extracted = dest.join(format!("{name}.jpg"));
        let thumb = image::open(&extracted).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (256, 256), "{name}");

        assert_eq!(processors::remove_thumbnail(&path), Ok(true), "{name}");
        assert!(!processors::has_thumbnail(&path), "{name}");
        assert_eq!(processors::remove_thumbnail(&path), Ok(false), "{name}");

        // Still a readable image afterwards
        image_workflow::imaging::load(&path).unwrap();
    }
}

// =========================================================================
// Chain of custody
// =========================================================================

#[test]
fn record_survives_convert_thumbnail_and_compress() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();
    let converter = NativeConverter::default();

    let original = write_sample(tmp.path(), "a.jpg");
    let original_sha = hash::digest(&original).unwrap();
    let original_path = std::fs::canonicalize(&original).unwrap();

    let check = |path: &Path| {
        let record = reader
            .read_existing(path)
            .unwrap_or_else(|| panic!("no record in {}", path.display()));
        assert_eq!(record.sha1, original_sha, "{}", path.display());
        assert_eq!(PathBuf::from(&record.source_file), original_path);
    };

    let png = transform::convert_to_format(&original, "png", tmp.path(), "converted", &converter, &reader)
        .unwrap()
        .unwrap();
    assert_eq!(png, tmp.path().join("converted/a.png"));
    check(&png);

    let tif = transform::convert_to_format(&png, "tif", tmp.path(), "again", &converter, &reader)
        .unwrap()
        .unwrap();
    check(&tif);

    assert_eq!(processors::add_thumbnail(&tif, &reader), Ok(true));
    check(&tif);

    transform::compress_tiff(&tif, &reader).unwrap();
    check(&tif);

    // The original itself was never written to
    assert_eq!(hash::digest(&original).unwrap(), original_sha);
}

#[test]
fn record_moves_from_jpeg_comment_into_exif_description() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();
    let converter = NativeConverter::default();

    let original = write_sample(tmp.path(), "a.png");
    let original_sha = hash::digest(&original).unwrap();
    let original_path = std::fs::canonicalize(&original).unwrap();

    let jpg = transform::convert_to_format(&original, "jpg", tmp.path(), "converted", &converter, &reader)
        .unwrap()
        .unwrap();
    let parsed = jpeg::parse(std::fs::read(&jpg).unwrap()).unwrap();
    assert!(jpeg::read_exif(&parsed).is_none());
    assert_eq!(jpeg::comments(&parsed).len(), 1);

    assert_eq!(processors::add_thumbnail(&jpg, &reader), Ok(true));

    let parsed = jpeg::parse(std::fs::read(&jpg).unwrap()).unwrap();
    let description = jpeg::read_exif(&parsed)
        .as_ref()
        .and_then(jpeg::exif_description)
        .expect("EXIF ImageDescription");
    let from_exif = ProvenanceRecord::from_comment(&description).unwrap();
    assert_eq!(from_exif.sha1, original_sha);
    assert_eq!(PathBuf::from(&from_exif.source_file), original_path);

    let read_back = reader.read_existing(&jpg).unwrap();
    assert_eq!(read_back, from_exif);
}

#[test]
fn jpeg_thumbnail_mints_record_from_itself() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();
    let path = write_sample(tmp.path(), "a.jpg");
    let before = hash::digest(&path).unwrap();

    processors::add_thumbnail(&path, &reader).unwrap();
    let record = reader.read_existing(&path).unwrap();
    assert_eq!(record.sha1, before);
    assert!(!record.matches_content(&path).unwrap());
}

// =========================================================================
// Timestamps
// =========================================================================

#[test]
fn add_and_compress_keep_mtime() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();

    for name in ["a.jpg", "a.tif"] {
        let path = write_sample(tmp.path(), name);
        set_mtime(&path, 1_500_000_000);
        assert_eq!(processors::add_thumbnail(&path, &reader), Ok(true));
        assert_eq!(mtime_secs(&path), 1_500_000_000, "{name}");
    }

    let tif = tmp.path().join("a.tif");
    set_mtime(&tif, 1_600_000_000);
    transform::compress_tiff(&tif, &reader).unwrap();
    assert_eq!(mtime_secs(&tif), 1_600_000_000);
}

#[cfg(unix)]
#[test]
fn read_only_originals_keep_mode_and_mtime() {
    use std::os::unix::fs::PermissionsExt;
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();

    for name in ["a.jpg", "a.tif"] {
        let path = write_sample(tmp.path(), name);
        set_mtime(&path, 1_500_000_000);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();

        assert_eq!(processors::add_thumbnail(&path, &reader), Ok(true), "{name}");
        assert!(processors::has_thumbnail(&path), "{name}");
        assert_eq!(mtime_secs(&path), 1_500_000_000, "{name}");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444, "{name}");
    }

    let tif = tmp.path().join("a.tif");
    transform::compress_tiff(&tif, &reader).unwrap();
    assert_eq!(mtime_secs(&tif), 1_500_000_000);
}

// =========================================================================
// TIFF structure
// =========================================================================

#[test]
fn tiff_subifd_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let reader = MetadataReader::native();
    let path = write_sample(tmp.path(), "a.tif");

    processors::add_thumbnail(&path, &reader).unwrap();
    let data = std::fs::read(&path).unwrap();
    let file = TiffFile::parse(&data).unwrap();
    assert_eq!(file.ifd0().unwrap().sub_ifds().len(), 1);

    transform::compress_tiff(&path, &reader).unwrap();
    let data = std::fs::read(&path).unwrap();
    let file = TiffFile::parse(&data).unwrap();
    let primary = file.ifd0().unwrap();
    let offsets = primary.sub_ifds();
    assert_eq!(offsets.len(), 1);
    assert_eq!(primary.compression_code(), Compression::Lzw.code());
    let thumb = file.read_ifd(offsets[0]).unwrap();
    assert_eq!(thumb.compression_code(), Compression::Lzw.code());
    assert_eq!(thumb.subfile_type(), SUBFILE_REDUCED_RESOLUTION);
    let decoded = file.decode_page(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (256, 256));

    processors::remove_thumbnail(&path).unwrap();
    let data = std::fs::read(&path).unwrap();
    let primary = TiffFile::parse(&data).unwrap().ifd0().unwrap();
    assert!(primary.sub_ifds().is_empty());
    assert!(primary.description().is_some());
}

// =========================================================================
// Metadata reader
// =========================================================================

#[test]
fn verbose_dump_recovers_record_when_short_comment_is_empty() {
    let tmp = TempDir::new().unwrap();
    let path = write_sample(tmp.path(), "a.jpg");
    let reader = MetadataReader::new(Box::new(CannedQuery {
        short: Some(String::new()),
        verbose: Some(
            "Image: a.jpg\n  Format: JPEG\n  Comment: {\"created_at\": 1.0, \"sha1\": \"abc\", \"source_file\": \"/orig/a.jpg\"}\n  Geometry: 160x120\n"
                .to_string(),
        ),
    }));

    let record = reader.read_existing(&path).unwrap();
    assert_eq!(record.sha1, "abc");
    assert_eq!(record.source_file, "/orig/a.jpg");
}

#[test]
fn incomplete_records_are_absent() {
    let tmp = TempDir::new().unwrap();
    let path = write_sample(tmp.path(), "a.png");
    let reader = MetadataReader::new(Box::new(CannedQuery {
        short: Some(r#"{"sha1": "abc"}"#.to_string()),
        verbose: Some("  Comment: {\"source_file\": \"/a\"}\n".to_string()),
    }));
    assert!(reader.read_existing(&path).is_none());
}
