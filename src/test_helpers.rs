//! Shared test utilities: in-memory sample images and mtime helpers.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("a.jpg");
//! std::fs::write(&path, jpeg_bytes(64, 48)).unwrap();
//! set_mtime(&path, 1_500_000_000);
//! assert_eq!(mtime_secs(&path), 1_500_000_000);
//! ```

use crate::timestamps::FileTimestamps;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// =========================================================================
// Sample images
// =========================================================================

/// A smooth RGB gradient, so encoders have something non-trivial to chew on.
fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Baseline JPEG without any APP1 or COM segments.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// A very small JPEG, for use as a thumbnail payload.
pub fn tiny_jpeg() -> Vec<u8> {
    jpeg_bytes(4, 4)
}

/// RGB8 PNG without text chunks.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// Single-page, uncompressed RGB8 TIFF.
pub fn tiff_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Tiff)
}

// =========================================================================
// Timestamps
// =========================================================================

/// Set both atime and mtime of `path` to `secs` past the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let time = UNIX_EPOCH + Duration::from_secs(secs);
    FileTimestamps {
        accessed: time,
        modified: time,
    }
    .apply(path)
    .unwrap();
}

/// Whole seconds of `path`'s mtime.
pub fn mtime_secs(path: &Path) -> u64 {
    let modified: SystemTime = std::fs::metadata(path).unwrap().modified().unwrap();
    modified.duration_since(UNIX_EPOCH).unwrap().as_secs()
}
