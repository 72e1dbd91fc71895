//! JPEG segment plumbing: the EXIF APP1 block and `COM` comment segments.
//!
//! Pixels are never touched. Segments are swapped with `img-parts`, EXIF is
//! parsed with `kamadak-exif` and rebuilt with its experimental writer when a
//! thumbnail is added or removed.

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use img_parts::jpeg::{Jpeg, JpegSegment, markers};
use img_parts::{Bytes, ImageEXIF};
use std::io::Cursor;
use thiserror::Error;

/// Largest payload a single JPEG segment can hold (length field minus itself).
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;
/// `Exif\0\0` prefix img-parts adds in front of the TIFF payload.
const EXIF_HEADER_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum JpegError {
    #[error("not a JPEG: {0}")]
    Container(#[from] img_parts::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("EXIF block of {0} bytes does not fit in an APP1 segment")]
    ExifTooLarge(usize),
}

pub fn parse(data: Vec<u8>) -> Result<Jpeg, JpegError> {
    Ok(Jpeg::from_bytes(Bytes::from(data))?)
}

pub fn to_bytes(jpeg: Jpeg) -> Vec<u8> {
    jpeg.encoder().bytes().to_vec()
}

/// Parsed EXIF of a JPEG, if it carries an APP1 EXIF block.
pub fn read_exif(jpeg: &Jpeg) -> Option<exif::Exif> {
    let raw = jpeg.exif()?;
    exif::Reader::new().read_raw(raw.to_vec()).ok()
}

/// The JPEG stream stored in IFD1, if any.
pub fn exif_thumbnail(exif: &exif::Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let length = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    if length == 0 {
        return None;
    }
    exif.buf().get(offset..offset.checked_add(length)?)
}

/// `ImageDescription` from the primary IFD, decoded as UTF-8 (lossy).
pub fn exif_description(exif: &exif::Exif) -> Option<String> {
    let field = exif.get_field(Tag::ImageDescription, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => {
            let bytes: Vec<u8> = parts.iter().flatten().copied().collect();
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => None,
    }
}

/// Tags the writer derives itself; copying them would duplicate or dangle.
fn is_structural(tag: Tag) -> bool {
    [
        Tag::ExifIFDPointer,
        Tag::GPSInfoIFDPointer,
        Tag::InteropIFDPointer,
        Tag::StripOffsets,
        Tag::StripByteCounts,
        Tag::TileOffsets,
        Tag::TileByteCounts,
        Tag::JPEGInterchangeFormat,
        Tag::JPEGInterchangeFormatLength,
    ]
    .contains(&tag)
}

/// Primary-IFD fields (including the Exif/GPS/Interop sub-IFDs) that can be
/// written back unchanged.
fn carried_fields(existing: Option<&exif::Exif>, replace_description: bool) -> Vec<Field> {
    let Some(exif) = existing else {
        return Vec::new();
    };
    exif.fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .filter(|f| !is_structural(f.tag))
        .filter(|f| !(replace_description && f.tag == Tag::ImageDescription))
        .filter(|f| !matches!(f.value, Value::Unknown(..)))
        .cloned()
        .collect()
}

fn thumbnail_ifd_fields() -> Vec<Field> {
    let dpi = Value::Rational(vec![Rational { num: 72, denom: 1 }]);
    vec![
        Field {
            tag: Tag::Compression,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![6]),
        },
        Field {
            tag: Tag::XResolution,
            ifd_num: In::THUMBNAIL,
            value: dpi.clone(),
        },
        Field {
            tag: Tag::YResolution,
            ifd_num: In::THUMBNAIL,
            value: dpi,
        },
        Field {
            tag: Tag::ResolutionUnit,
            ifd_num: In::THUMBNAIL,
            value: Value::Short(vec![2]),
        },
    ]
}

/// Serialize an EXIF TIFF payload.
///
/// Primary fields of `existing` are kept. `description`, when given, replaces
/// `ImageDescription`. `thumbnail`, when given, becomes IFD1's JPEG stream;
/// otherwise no IFD1 is written.
pub fn build_exif(
    existing: Option<&exif::Exif>,
    description: Option<&str>,
    thumbnail: Option<&[u8]>,
) -> Result<Vec<u8>, JpegError> {
    let mut fields = carried_fields(existing, description.is_some());
    if let Some(text) = description {
        fields.push(Field {
            tag: Tag::ImageDescription,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        });
    }
    if thumbnail.is_some() {
        fields.extend(thumbnail_ifd_fields());
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    if let Some(jpeg) = thumbnail {
        writer.set_jpeg(jpeg, In::THUMBNAIL);
    }

    let little_endian = existing.is_none_or(|e| e.little_endian());
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian)?;
    let payload = buf.into_inner();

    if payload.len() + EXIF_HEADER_LEN > MAX_SEGMENT_PAYLOAD {
        return Err(JpegError::ExifTooLarge(payload.len()));
    }
    Ok(payload)
}

/// Replace (or drop, with `None`) the APP1 EXIF block.
pub fn set_exif(jpeg: &mut Jpeg, payload: Option<Vec<u8>>) {
    jpeg.set_exif(payload.map(Bytes::from));
}

/// Texts of all `COM` segments, in file order.
pub fn comments(jpeg: &Jpeg) -> Vec<String> {
    jpeg.segments()
        .iter()
        .filter(|s| s.marker() == markers::COM)
        .map(|s| String::from_utf8_lossy(s.contents()).into_owned())
        .collect()
}

/// Replace every `COM` segment with a single one holding `text`, placed after
/// the leading APPn segments.
pub fn set_comment(jpeg: &mut Jpeg, text: &str) {
    let segments = jpeg.segments_mut();
    segments.retain(|s| s.marker() != markers::COM);

    let position = segments
        .iter()
        .take_while(|s| (markers::APP0..=markers::APP15).contains(&s.marker()))
        .count();
    let segment = JpegSegment::new_with_contents(markers::COM, Bytes::from(text.as_bytes().to_vec()));
    segments.insert(position, segment);
}
