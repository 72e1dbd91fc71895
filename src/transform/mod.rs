//! Transform drivers: format conversion and lossless TIFF recompression.
//!
//! Both drivers follow the same shape:
//!
//! ```text
//! resolve provenance record (existing, or mint from the input)
//!   → write the new file with the record embedded
//!   → carry the input's (atime, mtime) over to the result
//! ```
//!
//! Conversion delegates the pixel work to a [`Converter`]: GraphicsMagick by
//! default, or the pure-Rust [`NativeConverter`]. Compression rewrites the
//! TIFF itself through [`imaging::tiff`](crate::imaging::tiff).

mod compress;
mod convert;

pub use compress::compress_tiff;
pub use convert::{
    ConvertError, Converter, GraphicsMagickConverter, NativeConverter, convert_to_format,
    output_path,
};

use crate::imaging::LoadError;
use crate::imaging::tiff::TiffError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Tiff(#[from] TiffError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("provenance record could not be serialized: {0}")]
    Record(#[from] serde_json::Error),
}
