//! Thumbnail rendering: a hard resize to 256×256 encoded as JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError};

/// Edge length of every thumbnail. Aspect ratio is not preserved.
pub const THUMBNAIL_SIZE: u32 = 256;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// The 256×256 raster, Lanczos3-resampled.
pub fn render(image: &DynamicImage) -> DynamicImage {
    image.resize_exact(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3)
}

/// Encode a raster as baseline JPEG. Alpha and high bit depth are dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.value()).encode_image(&rgb)?;
    Ok(out)
}

/// Render and encode in one step.
pub fn jpeg_thumbnail(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, ImageError> {
    encode_jpeg(&render(image), quality)
}
