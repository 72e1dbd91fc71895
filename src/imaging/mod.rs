//! Container plumbing, pure Rust.
//!
//! | Concern | Crate / function |
//! |---|---|
//! | **Decode / resize** | `image` (Lanczos3) |
//! | **Thumbnail JPEG** | `image::codecs::jpeg::JpegEncoder` |
//! | **EXIF APP1 + `COM`** | `img-parts` segments, `kamadak-exif` reader/writer |
//! | **PNG text chunks** | `img-parts` chunks |
//! | **TIFF pages + SubIFD** | custom IFD reader/writer, `weezl` LZW |
//!
//! Nothing here knows about provenance records or file paths beyond what it
//! is handed; the [`processors`](crate::processors) and
//! [`transform`](crate::transform) modules decide what to embed and where.

pub mod jpeg;
pub mod png;
pub mod thumbnail;
pub mod tiff;

pub use thumbnail::{Quality, THUMBNAIL_SIZE};

use image::{DynamicImage, ImageError};
use std::path::Path;

/// Decode the primary image of any supported file.
///
/// TIFFs go through [`tiff::load_page0`] so the primary page is always the
/// one decoded, whatever sub-images the file carries.
pub fn load(path: &Path) -> Result<DynamicImage, LoadError> {
    let data = std::fs::read(path)?;
    if is_tiff(path) {
        return Ok(tiff::load_page0(&data)?);
    }
    Ok(image::load_from_memory(&data)?)
}

pub fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error("decode failed: {0}")]
    Image(#[from] ImageError),
}
