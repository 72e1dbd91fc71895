//! Minimal TIFF container reader and writer.
//!
//! Covers exactly what the structural-TIFF workflow needs:
//!
//! - Walk IFD0 and read the handful of tags that matter: compression,
//!   resolution, `ImageDescription`, and the `SubIFDs` pointer (tag 330).
//! - Decode a page's raster when it is stored the way this module writes
//!   it: chunky (planar config 1), 8 or 16 bits per sample, uncompressed or
//!   LZW, no predictor.
//! - Write a single-page TIFF whose IFD0 optionally points at one
//!   reduced-resolution sub-image (`NewSubfileType` = 1) via `SubIFDs`.
//!
//! The writer always emits little-endian ("II") files and lays pages out
//! thumbnail-first, so the sub-IFD offset is known when IFD0 is written and
//! nothing has to be patched except the header.
//!
//! Arbitrary third-party TIFFs (JPEG-in-TIFF, tiles, predictors) are decoded
//! through the `image` crate instead; see [`load_page0`].

use image::{DynamicImage, ImageBuffer, ImageFormat};
use thiserror::Error;
use weezl::BitOrder;

pub const TAG_NEW_SUBFILE_TYPE: u16 = 254;
pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;
pub const TAG_PHOTOMETRIC: u16 = 262;
pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_ROWS_PER_STRIP: u16 = 278;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_X_RESOLUTION: u16 = 282;
pub const TAG_Y_RESOLUTION: u16 = 283;
pub const TAG_PLANAR_CONFIG: u16 = 284;
pub const TAG_RESOLUTION_UNIT: u16 = 296;
pub const TAG_PREDICTOR: u16 = 317;
pub const TAG_SUB_IFDS: u16 = 330;
pub const TAG_EXTRA_SAMPLES: u16 = 338;

/// `NewSubfileType` bit marking a reduced-resolution version of another image.
pub const SUBFILE_REDUCED_RESOLUTION: u32 = 1;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_IFD: u16 = 13;

const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;

/// Uncompressed strips are cut at roughly this many bytes.
const STRIP_TARGET_BYTES: usize = 64 * 1024;

/// Upper bound on LZW expansion assumed when reserving a raster buffer.
const LZW_RESERVE_RATIO: usize = 16;

#[derive(Error, Debug)]
pub enum TiffError {
    #[error("not a TIFF file")]
    NotTiff,
    #[error("truncated or malformed TIFF: {0}")]
    Malformed(String),
    #[error("unsupported TIFF layout: {0}")]
    Unsupported(String),
    #[error("LZW error: {0:?}")]
    Lzw(weezl::LzwError),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Strip compression schemes this module can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
}

impl Compression {
    pub fn code(self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            _ => None,
        }
    }
}

/// XResolution / YResolution / ResolutionUnit, kept as raw rationals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: (u32, u32),
    pub y: (u32, u32),
    pub unit: u16,
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One raw IFD entry. `data` holds the value bytes in file byte order,
/// whether they were stored inline or out of line.
#[derive(Debug, Clone)]
struct Entry {
    tag: u16,
    typ: u16,
    count: u32,
    data: Vec<u8>,
}

/// A parsed image file directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    pub offset: u32,
    big_endian: bool,
    entries: Vec<Entry>,
}

fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 | 13 => 4, // LONG, SLONG, FLOAT, IFD
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

impl Ifd {
    fn entry(&self, tag: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    fn u16_at(&self, bytes: &[u8]) -> u16 {
        let b = [bytes[0], bytes[1]];
        if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        }
    }

    fn u32_at(&self, bytes: &[u8]) -> u32 {
        let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        }
    }

    /// All values of an integer-typed tag (BYTE, SHORT, LONG or IFD).
    pub fn uints(&self, tag: u16) -> Option<Vec<u32>> {
        let entry = self.entry(tag)?;
        let size = type_size(entry.typ);
        let values = entry
            .data
            .chunks_exact(size)
            .take(entry.count as usize)
            .map(|chunk| match entry.typ {
                TYPE_BYTE => Some(chunk[0] as u32),
                TYPE_SHORT => Some(self.u16_at(chunk) as u32),
                TYPE_LONG | TYPE_IFD => Some(self.u32_at(chunk)),
                _ => None,
            })
            .collect::<Option<Vec<u32>>>()?;
        Some(values)
    }

    pub fn uint(&self, tag: u16) -> Option<u32> {
        self.uints(tag)?.first().copied()
    }

    /// An ASCII tag as a string, trailing NULs stripped. Non-UTF-8 bytes are
    /// replaced rather than rejected.
    pub fn ascii(&self, tag: u16) -> Option<String> {
        let entry = self.entry(tag)?;
        if entry.typ != TYPE_ASCII {
            return None;
        }
        let end = entry
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(entry.data.len());
        Some(String::from_utf8_lossy(&entry.data[..end]).into_owned())
    }

    pub fn rational(&self, tag: u16) -> Option<(u32, u32)> {
        let entry = self.entry(tag)?;
        if entry.typ != TYPE_RATIONAL || entry.data.len() < 8 {
            return None;
        }
        Some((self.u32_at(&entry.data[0..4]), self.u32_at(&entry.data[4..8])))
    }

    pub fn description(&self) -> Option<String> {
        self.ascii(TAG_IMAGE_DESCRIPTION)
    }

    pub fn compression_code(&self) -> u16 {
        self.uint(TAG_COMPRESSION).map(|c| c as u16).unwrap_or(1)
    }

    /// Offsets of sub-IFDs declared on this directory (empty when none).
    pub fn sub_ifds(&self) -> Vec<u32> {
        self.uints(TAG_SUB_IFDS)
            .unwrap_or_default()
            .into_iter()
            .filter(|&offset| offset != 0)
            .collect()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        Some(Resolution {
            x: self.rational(TAG_X_RESOLUTION)?,
            y: self.rational(TAG_Y_RESOLUTION)?,
            unit: self.uint(TAG_RESOLUTION_UNIT).map(|u| u as u16).unwrap_or(2),
        })
    }

    pub fn subfile_type(&self) -> u32 {
        self.uint(TAG_NEW_SUBFILE_TYPE).unwrap_or(0)
    }
}

/// A TIFF file held in memory.
pub struct TiffFile<'a> {
    data: &'a [u8],
    big_endian: bool,
    first_ifd: u32,
}

impl<'a> TiffFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, TiffError> {
        if data.len() < 8 {
            return Err(TiffError::NotTiff);
        }
        let big_endian = match &data[0..2] {
            b"MM" => true,
            b"II" => false,
            _ => return Err(TiffError::NotTiff),
        };
        let file = Self {
            data,
            big_endian,
            first_ifd: 0,
        };
        if file.read_u16(2)? != 42 {
            return Err(TiffError::NotTiff);
        }
        let first_ifd = file.read_u32(4)?;
        Ok(Self { first_ifd, ..file })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], TiffError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                TiffError::Malformed(format!("range {offset}+{len} beyond end of file"))
            })
    }

    fn read_u16(&self, offset: usize) -> Result<u16, TiffError> {
        let b = self.slice(offset, 2)?;
        Ok(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn read_u32(&self, offset: usize) -> Result<u32, TiffError> {
        let b = self.slice(offset, 4)?;
        Ok(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// The primary page's directory.
    pub fn ifd0(&self) -> Result<Ifd, TiffError> {
        self.read_ifd(self.first_ifd)
    }

    pub fn read_ifd(&self, offset: u32) -> Result<Ifd, TiffError> {
        let offset = offset as usize;
        if offset == 0 {
            return Err(TiffError::Malformed("IFD offset is zero".into()));
        }
        let count = self.read_u16(offset)? as usize;
        let mut entries = Vec::with_capacity(count);

        for i in 0..count {
            let at = offset + 2 + i * 12;
            let tag = self.read_u16(at)?;
            let typ = self.read_u16(at + 2)?;
            let value_count = self.read_u32(at + 4)?;
            let byte_len = (value_count as usize).saturating_mul(type_size(typ));

            // Values of four bytes or less live in the entry itself
            let data = if byte_len <= 4 {
                self.slice(at + 8, byte_len)?.to_vec()
            } else {
                let value_offset = self.read_u32(at + 8)? as usize;
                self.slice(value_offset, byte_len)?.to_vec()
            };

            entries.push(Entry {
                tag,
                typ,
                count: value_count,
                data,
            });
        }

        Ok(Ifd {
            offset: offset as u32,
            big_endian: self.big_endian,
            entries,
        })
    }

    /// Decode a page stored chunky, 8/16-bit, uncompressed or LZW.
    pub fn decode_page(&self, ifd: &Ifd) -> Result<DynamicImage, TiffError> {
        let width = ifd
            .uint(TAG_IMAGE_WIDTH)
            .ok_or_else(|| TiffError::Malformed("missing ImageWidth".into()))?;
        let height = ifd
            .uint(TAG_IMAGE_LENGTH)
            .ok_or_else(|| TiffError::Malformed("missing ImageLength".into()))?;
        let samples = ifd.uint(TAG_SAMPLES_PER_PIXEL).unwrap_or(1);
        let bits = ifd.uints(TAG_BITS_PER_SAMPLE).unwrap_or_else(|| vec![1]);

        if ifd.uint(TAG_PLANAR_CONFIG).unwrap_or(1) != 1 {
            return Err(TiffError::Unsupported("planar configuration".into()));
        }
        if ifd.uint(TAG_PREDICTOR).unwrap_or(1) != 1 {
            return Err(TiffError::Unsupported("predictor".into()));
        }
        let photometric = ifd.uint(TAG_PHOTOMETRIC).unwrap_or(1) as u16;
        if photometric != PHOTOMETRIC_MIN_IS_BLACK && photometric != PHOTOMETRIC_RGB {
            return Err(TiffError::Unsupported(format!("photometric {photometric}")));
        }
        let depth = match bits.first() {
            Some(&b) if bits.iter().all(|&x| x == b) && (b == 8 || b == 16) => b,
            _ => return Err(TiffError::Unsupported(format!("bits per sample {bits:?}"))),
        };
        let compression = Compression::from_code(ifd.compression_code()).ok_or_else(|| {
            TiffError::Unsupported(format!("compression {}", ifd.compression_code()))
        })?;

        let offsets = ifd
            .uints(TAG_STRIP_OFFSETS)
            .ok_or_else(|| TiffError::Malformed("missing StripOffsets".into()))?;
        let counts = ifd
            .uints(TAG_STRIP_BYTE_COUNTS)
            .ok_or_else(|| TiffError::Malformed("missing StripByteCounts".into()))?;
        if offsets.len() != counts.len() {
            return Err(TiffError::Malformed("strip offset/count mismatch".into()));
        }

        let expected = [height as usize, samples as usize, depth as usize / 8]
            .into_iter()
            .try_fold(width as usize, usize::checked_mul)
            .ok_or_else(|| TiffError::Malformed(format!("{width}x{height} raster is too large")))?;
        // Reserve from what the strips can actually hold, not the declared size
        let stored = counts.iter().fold(0usize, |sum, &c| sum.saturating_add(c as usize));
        let bound = match compression {
            Compression::None => stored,
            Compression::Lzw => stored.saturating_mul(LZW_RESERVE_RATIO),
        };
        let mut raw = Vec::with_capacity(expected.min(bound));
        for (&offset, &count) in offsets.iter().zip(&counts) {
            let strip = self.slice(offset as usize, count as usize)?;
            match compression {
                Compression::None => raw.extend_from_slice(strip),
                Compression::Lzw => raw.extend(lzw_decode(strip)?),
            }
        }
        if raw.len() < expected {
            return Err(TiffError::Malformed(format!(
                "strip data holds {} bytes, expected {expected}",
                raw.len()
            )));
        }
        raw.truncate(expected);

        samples_to_image(width, height, samples, depth, raw, self.big_endian)
    }
}

fn samples_to_image(
    width: u32,
    height: u32,
    samples: u32,
    depth: u32,
    raw: Vec<u8>,
    big_endian: bool,
) -> Result<DynamicImage, TiffError> {
    let invalid = || TiffError::Malformed("raster size mismatch".into());

    if depth == 8 {
        let image = match samples {
            1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, raw).ok_or_else(invalid)?),
            2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, raw).ok_or_else(invalid)?),
            3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, raw).ok_or_else(invalid)?),
            4 => DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, raw).ok_or_else(invalid)?),
            n => return Err(TiffError::Unsupported(format!("{n} samples per pixel"))),
        };
        return Ok(image);
    }

    let words: Vec<u16> = raw
        .chunks_exact(2)
        .map(|b| {
            if big_endian {
                u16::from_be_bytes([b[0], b[1]])
            } else {
                u16::from_le_bytes([b[0], b[1]])
            }
        })
        .collect();
    let image = match samples {
        1 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, words).ok_or_else(invalid)?),
        2 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, words).ok_or_else(invalid)?),
        3 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, words).ok_or_else(invalid)?),
        4 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, words).ok_or_else(invalid)?),
        n => return Err(TiffError::Unsupported(format!("{n} samples per pixel"))),
    };
    Ok(image)
}

/// Decode the primary page, preferring the local decoder and falling back to
/// the `image` crate for layouts it doesn't handle.
pub fn load_page0(data: &[u8]) -> Result<DynamicImage, TiffError> {
    let tiff = TiffFile::parse(data)?;
    let ifd0 = tiff.ifd0()?;
    match tiff.decode_page(&ifd0) {
        Ok(image) => Ok(image),
        Err(TiffError::Unsupported(reason)) => {
            tracing::debug!(%reason, "falling back to the image crate TIFF decoder");
            Ok(image::load_from_memory_with_format(data, ImageFormat::Tiff)?)
        }
        Err(e) => Err(e),
    }
}

fn lzw_decode(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    weezl::decode::Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .decode(data)
        .map_err(TiffError::Lzw)
}

fn lzw_encode(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    weezl::encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(data)
        .map_err(TiffError::Lzw)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// One page to write.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub image: &'a DynamicImage,
    pub compression: Compression,
    pub description: Option<&'a str>,
    pub resolution: Option<Resolution>,
}

impl<'a> Page<'a> {
    pub fn new(image: &'a DynamicImage, compression: Compression) -> Self {
        Self {
            image,
            compression,
            description: None,
            resolution: None,
        }
    }
}

/// Pixel layout of a raster as it will be stored.
struct Samples {
    per_pixel: u16,
    bits: u16,
    bytes: Vec<u8>,
}

fn to_samples(image: &DynamicImage) -> Samples {
    fn wide(data: &[u16]) -> Vec<u8> {
        data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
    match image {
        DynamicImage::ImageLuma8(buf) => Samples { per_pixel: 1, bits: 8, bytes: buf.as_raw().clone() },
        DynamicImage::ImageLumaA8(buf) => Samples { per_pixel: 2, bits: 8, bytes: buf.as_raw().clone() },
        DynamicImage::ImageRgb8(buf) => Samples { per_pixel: 3, bits: 8, bytes: buf.as_raw().clone() },
        DynamicImage::ImageRgba8(buf) => Samples { per_pixel: 4, bits: 8, bytes: buf.as_raw().clone() },
        DynamicImage::ImageLuma16(buf) => Samples { per_pixel: 1, bits: 16, bytes: wide(buf.as_raw()) },
        DynamicImage::ImageLumaA16(buf) => Samples { per_pixel: 2, bits: 16, bytes: wide(buf.as_raw()) },
        DynamicImage::ImageRgb16(buf) => Samples { per_pixel: 3, bits: 16, bytes: wide(buf.as_raw()) },
        DynamicImage::ImageRgba16(buf) => Samples { per_pixel: 4, bits: 16, bytes: wide(buf.as_raw()) },
        // Float rasters: widen to 16-bit, the deepest integer layout written here
        other if other.color().has_alpha() => {
            Samples { per_pixel: 4, bits: 16, bytes: wide(other.to_rgba16().as_raw()) }
        }
        other => Samples { per_pixel: 3, bits: 16, bytes: wide(other.to_rgb16().as_raw()) },
    }
}

/// Collected IFD entries for one directory, little-endian.
#[derive(Default)]
struct IfdBuilder {
    entries: Vec<(u16, u16, u32, Vec<u8>)>,
}

impl IfdBuilder {
    fn shorts(&mut self, tag: u16, values: &[u16]) {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((tag, TYPE_SHORT, values.len() as u32, data));
    }

    fn longs(&mut self, tag: u16, values: &[u32]) {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((tag, TYPE_LONG, values.len() as u32, data));
    }

    fn rational(&mut self, tag: u16, (num, den): (u32, u32)) {
        let mut data = num.to_le_bytes().to_vec();
        data.extend_from_slice(&den.to_le_bytes());
        self.entries.push((tag, TYPE_RATIONAL, 1, data));
    }

    fn ascii(&mut self, tag: u16, text: &str) {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        self.entries.push((tag, TYPE_ASCII, data.len() as u32, data));
    }

    /// Append out-of-line values and the directory itself; returns the
    /// directory's offset.
    fn write(mut self, out: &mut Vec<u8>) -> u32 {
        self.entries.sort_by_key(|e| e.0);

        let mut value_offsets = Vec::with_capacity(self.entries.len());
        for (_, _, _, data) in &self.entries {
            if data.len() > 4 {
                pad_to_word(out);
                value_offsets.push(Some(out.len() as u32));
                out.extend_from_slice(data);
            } else {
                value_offsets.push(None);
            }
        }

        pad_to_word(out);
        let ifd_offset = out.len() as u32;
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for ((tag, typ, count, data), external) in self.entries.iter().zip(value_offsets) {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&typ.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            match external {
                Some(offset) => out.extend_from_slice(&offset.to_le_bytes()),
                None => {
                    let mut inline = [0u8; 4];
                    inline[..data.len()].copy_from_slice(data);
                    out.extend_from_slice(&inline);
                }
            }
        }
        // Next-IFD pointer: every page written here ends its chain
        out.extend_from_slice(&0u32.to_le_bytes());
        ifd_offset
    }
}

fn pad_to_word(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

/// Append a page's strips and directory; returns the directory offset.
fn write_page(
    out: &mut Vec<u8>,
    page: &Page<'_>,
    subfile_type: Option<u32>,
    sub_ifd: Option<u32>,
) -> Result<u32, TiffError> {
    let (width, height) = (page.image.width(), page.image.height());
    let samples = to_samples(page.image);
    let row_bytes = (width as usize * samples.per_pixel as usize * samples.bits as usize / 8).max(1);
    let rows_per_strip = (STRIP_TARGET_BYTES / row_bytes).clamp(1, height.max(1) as usize);

    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for strip in samples.bytes.chunks(rows_per_strip * row_bytes) {
        let encoded = match page.compression {
            Compression::None => strip.to_vec(),
            Compression::Lzw => lzw_encode(strip)?,
        };
        pad_to_word(out);
        offsets.push(out.len() as u32);
        counts.push(encoded.len() as u32);
        out.extend_from_slice(&encoded);
    }

    let mut ifd = IfdBuilder::default();
    if let Some(kind) = subfile_type {
        ifd.longs(TAG_NEW_SUBFILE_TYPE, &[kind]);
    }
    ifd.longs(TAG_IMAGE_WIDTH, &[width]);
    ifd.longs(TAG_IMAGE_LENGTH, &[height]);
    ifd.shorts(
        TAG_BITS_PER_SAMPLE,
        &vec![samples.bits; samples.per_pixel as usize],
    );
    ifd.shorts(TAG_COMPRESSION, &[page.compression.code()]);
    let photometric = if samples.per_pixel >= 3 {
        PHOTOMETRIC_RGB
    } else {
        PHOTOMETRIC_MIN_IS_BLACK
    };
    ifd.shorts(TAG_PHOTOMETRIC, &[photometric]);
    if let Some(text) = page.description {
        ifd.ascii(TAG_IMAGE_DESCRIPTION, text);
    }
    ifd.longs(TAG_STRIP_OFFSETS, &offsets);
    ifd.shorts(TAG_SAMPLES_PER_PIXEL, &[samples.per_pixel]);
    ifd.longs(TAG_ROWS_PER_STRIP, &[rows_per_strip as u32]);
    ifd.longs(TAG_STRIP_BYTE_COUNTS, &counts);
    if let Some(res) = page.resolution {
        ifd.rational(TAG_X_RESOLUTION, res.x);
        ifd.rational(TAG_Y_RESOLUTION, res.y);
        ifd.shorts(TAG_RESOLUTION_UNIT, &[res.unit]);
    }
    ifd.shorts(TAG_PLANAR_CONFIG, &[1]);
    if let Some(offset) = sub_ifd {
        ifd.longs(TAG_SUB_IFDS, &[offset]);
    }
    if samples.per_pixel == 2 || samples.per_pixel == 4 {
        // Unassociated alpha
        ifd.shorts(TAG_EXTRA_SAMPLES, &[2]);
    }

    Ok(ifd.write(out))
}

/// Encode a TIFF: `primary` as page 0, `thumbnail` (if any) as a
/// reduced-resolution sub-image referenced from page 0's `SubIFDs` tag.
pub fn encode(primary: &Page<'_>, thumbnail: Option<&Page<'_>>) -> Result<Vec<u8>, TiffError> {
    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let sub_ifd = match thumbnail {
        Some(thumb) => Some(write_page(&mut out, thumb, Some(SUBFILE_REDUCED_RESOLUTION), None)?),
        None => None,
    };
    let ifd0 = write_page(&mut out, primary, None, sub_ifd)?;
    out[4..8].copy_from_slice(&ifd0.to_le_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn parse_rejects_non_tiff() {
        assert!(matches!(TiffFile::parse(b"\x89PNG\r\n\x1a\n"), Err(TiffError::NotTiff)));
        assert!(matches!(TiffFile::parse(b"II"), Err(TiffError::NotTiff)));
        assert!(matches!(TiffFile::parse(b"II\x2b\x00\x08\x00\x00\x00"), Err(TiffError::NotTiff)));
    }

    #[test]
    fn single_page_has_no_sub_ifd() {
        let image = gradient(10, 10);
        let bytes = encode(&Page::new(&image, Compression::None), None).unwrap();

        let tiff = TiffFile::parse(&bytes).unwrap();
        let ifd0 = tiff.ifd0().unwrap();
        assert!(ifd0.sub_ifds().is_empty());
        assert_eq!(ifd0.compression_code(), 1);
        assert_eq!(tiff.decode_page(&ifd0).unwrap(), image);
    }

    #[test]
    fn thumbnail_written_as_reduced_resolution_sub_ifd() {
        let image = gradient(40, 30);
        let thumb = gradient(8, 8);
        let bytes = encode(
            &Page::new(&image, Compression::None),
            Some(&Page::new(&thumb, Compression::None)),
        )
        .unwrap();

        let tiff = TiffFile::parse(&bytes).unwrap();
        let ifd0 = tiff.ifd0().unwrap();
        let subs = ifd0.sub_ifds();
        assert_eq!(subs.len(), 1);
        assert_eq!(ifd0.subfile_type(), 0);

        let sub = tiff.read_ifd(subs[0]).unwrap();
        assert_eq!(sub.subfile_type(), SUBFILE_REDUCED_RESOLUTION);
        assert_eq!(tiff.decode_page(&sub).unwrap(), thumb);
        assert_eq!(tiff.decode_page(&ifd0).unwrap(), image);
    }

    #[test]
    fn lzw_pages_decode_losslessly() {
        // Tall enough to be split across several strips
        let image = gradient(300, 400);
        let thumb = gradient(16, 16);
        let bytes = encode(
            &Page::new(&image, Compression::Lzw),
            Some(&Page::new(&thumb, Compression::Lzw)),
        )
        .unwrap();

        let tiff = TiffFile::parse(&bytes).unwrap();
        let ifd0 = tiff.ifd0().unwrap();
        assert_eq!(ifd0.compression_code(), 5);
        assert!(ifd0.uints(TAG_STRIP_OFFSETS).unwrap().len() > 1);
        assert_eq!(tiff.decode_page(&ifd0).unwrap(), image);

        let sub = tiff.read_ifd(ifd0.sub_ifds()[0]).unwrap();
        assert_eq!(sub.compression_code(), 5);
        assert_eq!(tiff.decode_page(&sub).unwrap(), thumb);
    }

    #[test]
    fn description_and_resolution_survive() {
        let image = gradient(4, 4);
        let resolution = Resolution {
            x: (300, 1),
            y: (300, 1),
            unit: 2,
        };
        let page = Page {
            description: Some(r#"{"sha1": "abc", "source_file": "/tmp/ü.tif"}"#),
            resolution: Some(resolution),
            ..Page::new(&image, Compression::None)
        };
        let bytes = encode(&page, None).unwrap();

        let ifd0 = TiffFile::parse(&bytes).unwrap().ifd0().unwrap();
        assert_eq!(
            ifd0.description().as_deref(),
            Some(r#"{"sha1": "abc", "source_file": "/tmp/ü.tif"}"#)
        );
        assert_eq!(ifd0.resolution(), Some(resolution));
    }

    #[test]
    fn sixteen_bit_and_alpha_layouts() {
        let gray16 = DynamicImage::ImageLuma16(ImageBuffer::from_fn(5, 3, |x, y| {
            image::Luma([(x * 1000 + y) as u16])
        }));
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_fn(3, 3, |x, y| {
            image::Rgba([x as u8, y as u8, 7, 128])
        }));

        for image in [gray16, rgba] {
            let bytes = encode(&Page::new(&image, Compression::Lzw), None).unwrap();
            let tiff = TiffFile::parse(&bytes).unwrap();
            assert_eq!(tiff.decode_page(&tiff.ifd0().unwrap()).unwrap(), image);
        }
    }

    #[test]
    fn image_crate_reads_what_we_write() {
        let image = gradient(20, 10);
        let thumb = gradient(4, 4);
        let bytes = encode(
            &Page::new(&image, Compression::Lzw),
            Some(&Page::new(&thumb, Compression::Lzw)),
        )
        .unwrap();

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Tiff).unwrap();
        assert_eq!(decoded.to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn load_page0_round_trips() {
        let image = gradient(12, 9);
        let bytes = encode(&Page::new(&image, Compression::None), None).unwrap();
        assert_eq!(load_page0(&bytes).unwrap(), image);
    }

    #[test]
    fn truncated_file_is_malformed() {
        let image = gradient(10, 10);
        let bytes = encode(&Page::new(&image, Compression::None), None).unwrap();
        let tiff = TiffFile::parse(&bytes[..bytes.len() - 20]);
        let result = tiff.and_then(|t| t.ifd0());
        assert!(result.is_err());
    }

    /// Overwrite an inline LONG value of `tag` in IFD0.
    fn patch_long(bytes: &mut [u8], tag: u16, value: u32) {
        let ifd0 = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let count = u16::from_le_bytes([bytes[ifd0], bytes[ifd0 + 1]]) as usize;
        let entry = (0..count)
            .map(|i| ifd0 + 2 + i * 12)
            .find(|&at| u16::from_le_bytes([bytes[at], bytes[at + 1]]) == tag)
            .unwrap();
        bytes[entry + 8..entry + 12].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn oversized_dimensions_are_malformed() {
        let image = gradient(10, 10);
        for compression in [Compression::None, Compression::Lzw] {
            let mut bytes = encode(&Page::new(&image, compression), None).unwrap();
            patch_long(&mut bytes, TAG_IMAGE_WIDTH, u32::MAX);
            patch_long(&mut bytes, TAG_IMAGE_LENGTH, u32::MAX);

            let tiff = TiffFile::parse(&bytes).unwrap();
            let ifd0 = tiff.ifd0().unwrap();
            assert!(matches!(tiff.decode_page(&ifd0), Err(TiffError::Malformed(_))));
            assert!(matches!(load_page0(&bytes), Err(TiffError::Malformed(_))));
        }
    }

    #[test]
    fn large_declared_size_with_little_data_is_malformed() {
        let image = gradient(10, 10);
        let mut bytes = encode(&Page::new(&image, Compression::None), None).unwrap();
        patch_long(&mut bytes, TAG_IMAGE_WIDTH, 60_000);
        patch_long(&mut bytes, TAG_IMAGE_LENGTH, 60_000);

        let tiff = TiffFile::parse(&bytes).unwrap();
        let ifd0 = tiff.ifd0().unwrap();
        assert!(matches!(tiff.decode_page(&ifd0), Err(TiffError::Malformed(_))));
    }
}
