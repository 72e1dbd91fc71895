//! PNG text chunks (`tEXt` / `iTXt`) holding a comment string.
//!
//! GraphicsMagick stores `-comment` as a `tEXt` chunk with keyword `comment`.
//! The same layout is written here; text that is not Latin-1 safe goes into an
//! uncompressed `iTXt` chunk instead, since `tEXt` cannot carry UTF-8.

use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};

pub const COMMENT_KEYWORD: &str = "comment";

const TEXT: [u8; 4] = *b"tEXt";
const INTERNATIONAL_TEXT: [u8; 4] = *b"iTXt";
const END: [u8; 4] = *b"IEND";

pub fn parse(data: Vec<u8>) -> Result<Png, img_parts::Error> {
    Png::from_bytes(Bytes::from(data))
}

pub fn to_bytes(png: Png) -> Vec<u8> {
    png.encoder().bytes().to_vec()
}

/// `(keyword, text)` of a `tEXt` chunk body.
fn decode_text(body: &[u8]) -> Option<(String, String)> {
    let split = body.iter().position(|&b| b == 0)?;
    let keyword = latin1(&body[..split]);
    Some((keyword, latin1(&body[split + 1..])))
}

/// `(keyword, text)` of an uncompressed `iTXt` chunk body.
fn decode_international(body: &[u8]) -> Option<(String, String)> {
    let split = body.iter().position(|&b| b == 0)?;
    let keyword = latin1(&body[..split]);
    let rest = &body[split + 1..];
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        return None;
    }
    let (_method, rest) = rest.split_first()?;
    // Language tag, then translated keyword, each NUL-terminated
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];
    Some((keyword, String::from_utf8_lossy(text).into_owned()))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Texts of every `comment` chunk (keyword compared case-insensitively).
pub fn comments(png: &Png) -> Vec<String> {
    png.chunks()
        .iter()
        .filter_map(|chunk| match chunk.kind() {
            TEXT => decode_text(chunk.contents()),
            INTERNATIONAL_TEXT => decode_international(chunk.contents()),
            _ => None,
        })
        .filter(|(keyword, _)| keyword.eq_ignore_ascii_case(COMMENT_KEYWORD))
        .map(|(_, text)| text)
        .collect()
}

/// Replace any `comment` text chunk with one holding `text`, placed before
/// `IEND`.
pub fn set_comment(png: &mut Png, text: &str) {
    let chunks = png.chunks_mut();
    chunks.retain(|chunk| {
        let decoded = match chunk.kind() {
            TEXT => decode_text(chunk.contents()),
            INTERNATIONAL_TEXT => decode_international(chunk.contents()),
            _ => None,
        };
        !decoded.is_some_and(|(keyword, _)| keyword.eq_ignore_ascii_case(COMMENT_KEYWORD))
    });

    let mut body = COMMENT_KEYWORD.as_bytes().to_vec();
    body.push(0);
    let kind = if text.is_ascii() {
        body.extend_from_slice(text.as_bytes());
        TEXT
    } else {
        // compression flag, method, empty language, empty translated keyword
        body.extend_from_slice(&[0, 0, 0, 0]);
        body.extend_from_slice(text.as_bytes());
        INTERNATIONAL_TEXT
    };

    let position = chunks
        .iter()
        .position(|chunk| chunk.kind() == END)
        .unwrap_or(chunks.len());
    chunks.insert(position, PngChunk::new(kind, Bytes::from(body)));
}
