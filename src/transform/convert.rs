//! Format conversion into the `converted/` tree.

use super::TransformError;
use crate::imaging::{self, Quality, jpeg, png, tiff};
use crate::provenance::{self, ProvenanceSource};
use crate::timestamps::FileTimestamps;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unsupported conversion target: {0:?}")]
    UnsupportedTarget(String),
    #[error(transparent)]
    Load(#[from] imaging::LoadError),
    #[error("encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error(transparent)]
    Jpeg(#[from] jpeg::JpegError),
    #[error("container error: {0}")]
    Container(#[from] img_parts::Error),
}

/// External conversion collaborator: write `src` re-encoded as `dst` (format
/// chosen by `dst`'s extension) with `comment` stored in the output's
/// comment metadata.
pub trait Converter {
    fn convert(&self, src: &Path, dst: &Path, comment: &str) -> Result<(), ConvertError>;
}

/// `gm convert <src> -comment <json> <dst>`.
#[derive(Debug, Clone)]
pub struct GraphicsMagickConverter {
    binary: PathBuf,
}

impl GraphicsMagickConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Converter for GraphicsMagickConverter {
    fn convert(&self, src: &Path, dst: &Path, comment: &str) -> Result<(), ConvertError> {
        let output = Command::new(&self.binary)
            .arg("convert")
            .arg(src)
            .arg("-comment")
            .arg(comment)
            .arg(dst)
            .output()?;
        if !output.status.success() {
            return Err(ConvertError::ToolFailed {
                tool: self.binary.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Pure-Rust converter for JPEG, PNG and TIFF targets.
///
/// The comment goes where GraphicsMagick would put it: a JPEG `COM`
/// segment, a PNG `comment` text chunk, or TIFF `ImageDescription`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverter {
    pub quality: Quality,
}

impl NativeConverter {
    fn encode(&self, src: &Path, target: &str, comment: &str) -> Result<Vec<u8>, ConvertError> {
        match target {
            "jpg" | "jpeg" => {
                let image = imaging::load(src)?;
                let mut out = Vec::new();
                JpegEncoder::new_with_quality(&mut out, self.quality.value())
                    .encode_image(&image.to_rgb8())?;
                let mut parsed = jpeg::parse(out)?;
                jpeg::set_comment(&mut parsed, comment);
                Ok(jpeg::to_bytes(parsed))
            }
            "png" => {
                let image = imaging::load(src)?;
                let mut out = Cursor::new(Vec::new());
                image.write_to(&mut out, ImageFormat::Png)?;
                let mut parsed = png::parse(out.into_inner())?;
                png::set_comment(&mut parsed, comment);
                Ok(png::to_bytes(parsed))
            }
            "tif" | "tiff" => {
                let image = imaging::load(src)?;
                let resolution = if imaging::is_tiff(src) {
                    let data = std::fs::read(src)?;
                    tiff::TiffFile::parse(&data)
                        .and_then(|f| f.ifd0())
                        .ok()
                        .and_then(|ifd| ifd.resolution())
                } else {
                    None
                };
                let page = tiff::Page {
                    description: Some(comment),
                    resolution,
                    ..tiff::Page::new(&image, tiff::Compression::None)
                };
                Ok(tiff::encode(&page, None)?)
            }
            other => Err(ConvertError::UnsupportedTarget(other.to_string())),
        }
    }
}

impl Converter for NativeConverter {
    fn convert(&self, src: &Path, dst: &Path, comment: &str) -> Result<(), ConvertError> {
        let target = dst
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let bytes = self.encode(src, &target, comment)?;

        let parent = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(&bytes)?;
        staged.persist(dst).map_err(|e| e.error)?;
        Ok(())
    }
}

/// The path below `root`, with anything that could escape it dropped.
fn relative_parts(path: &Path, root: &Path) -> PathBuf {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Whether `path` already lives inside the conversion output tree.
fn is_converted_output(path: &Path, root: &Path, converted_dir: &str) -> bool {
    relative_parts(path, root)
        .components()
        .any(|c| c.as_os_str() == converted_dir)
}

/// `<root>/<converted_dir>/<relative dir>/<stem>.<target_format>`.
pub fn output_path(
    path: &Path,
    root: &Path,
    converted_dir: &str,
    target_format: &str,
) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_string_lossy();
    let relative = relative_parts(path, root);
    let dir = relative.parent().unwrap_or(Path::new(""));
    Some(
        root.join(converted_dir)
            .join(dir)
            .join(format!("{stem}.{target_format}")),
    )
}

/// Convert one file into the conversion tree, carrying its provenance record.
///
/// Returns `Ok(None)` for files that are themselves conversion output.
pub fn convert_to_format(
    path: &Path,
    target_format: &str,
    root: &Path,
    converted_dir: &str,
    converter: &dyn Converter,
    source: &dyn ProvenanceSource,
) -> Result<Option<PathBuf>, TransformError> {
    if is_converted_output(path, root, converted_dir) {
        tracing::debug!(path = %path.display(), "skipping conversion output");
        return Ok(None);
    }
    let Some(target) = output_path(path, root, converted_dir, target_format) else {
        return Ok(None);
    };

    let times = FileTimestamps::capture(path)?;
    let record = provenance::resolve_for_file(path, source)?;
    let comment = record.to_comment()?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)?;
    }
    converter.convert(path, &target, &comment)?;
    times.apply(&target)?;

    tracing::info!(path = %path.display(), output = %target.display(), "converted");
    Ok(Some(target))
}
