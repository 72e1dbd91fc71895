//! Reading an existing provenance record out of an image.
//!
//! Lookups are best-effort and never fail: any missing tool, non-zero exit,
//! unreadable file or unparsable text just means "no record". Strategies run
//! in order and the first valid record wins:
//!
//! 1. **Short comment**: ask the metadata tool for the comment field alone
//!    (`gm identify -format %c`) and parse it as JSON.
//! 2. **Verbose dump**: ask for the full metadata dump (`gm identify -verbose`)
//!    and pull the JSON object following a `Comment:` label.
//! 3. **Embedded text**: read the file's own comment/description fields
//!    directly: JPEG `COM` segments and EXIF `ImageDescription`, PNG
//!    `tEXt`/`iTXt` comment chunks, TIFF `ImageDescription`.
//!
//! A candidate is only accepted if it is a JSON object with `sha1` and
//! `source_file`; see [`ProvenanceRecord::from_comment`]. TIFF writers often
//! put other JSON in the description field (`{"shape": [...]}`), which is
//! correctly treated as no record.
//!
//! The external tool sits behind [`MetadataQuery`] so it can be swapped for a
//! mock in tests, or left out entirely with [`MetadataReader::native`].

use crate::imaging::{jpeg, png, tiff};
use crate::provenance::{ProvenanceRecord, ProvenanceSource};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

/// `Comment: {...}` line of a verbose metadata dump.
static VERBOSE_COMMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Comment:\s*(\{.*\})\s*$").ok());

/// External metadata query collaborator.
///
/// Both calls return `None` on any failure (tool missing, non-zero exit).
pub trait MetadataQuery {
    /// The file's short comment string.
    fn short_comment(&self, path: &Path) -> Option<String>;

    /// The file's full verbose metadata dump.
    fn verbose_dump(&self, path: &Path) -> Option<String>;
}

/// [`MetadataQuery`] backed by the GraphicsMagick `identify` command.
#[derive(Debug, Clone)]
pub struct GraphicsMagick {
    binary: PathBuf,
}

impl GraphicsMagick {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn identify(&self, args: &[&str], path: &Path) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("identify")
            .args(args)
            .arg(path)
            .output()
            .ok()?;
        if !output.status.success() {
            tracing::debug!(
                path = %path.display(),
                status = %output.status,
                "gm identify failed"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GraphicsMagick {
    fn default() -> Self {
        Self::new("gm")
    }
}

impl MetadataQuery for GraphicsMagick {
    fn short_comment(&self, path: &Path) -> Option<String> {
        self.identify(&["-format", "%c"], path)
    }

    fn verbose_dump(&self, path: &Path) -> Option<String> {
        self.identify(&["-verbose"], path)
    }
}

/// Pull a record out of a verbose dump's `Comment:` line.
pub fn extract_from_dump(dump: &str) -> Option<ProvenanceRecord> {
    let regex = VERBOSE_COMMENT.as_ref()?;
    regex
        .captures_iter(dump)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| ProvenanceRecord::from_comment(m.as_str()))
}

/// Comment-like strings stored in the file itself, by container type.
pub fn embedded_comments(path: &Path) -> Vec<String> {
    let Ok(data) = std::fs::read(path) else {
        return Vec::new();
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let Ok(parsed) = jpeg::parse(data) else {
                return Vec::new();
            };
            let mut texts = jpeg::comments(&parsed);
            if let Some(description) = jpeg::read_exif(&parsed)
                .as_ref()
                .and_then(jpeg::exif_description)
            {
                texts.push(description);
            }
            texts
        }
        "png" => png::parse(data)
            .map(|parsed| png::comments(&parsed))
            .unwrap_or_default(),
        "tif" | "tiff" => tiff::TiffFile::parse(&data)
            .and_then(|file| file.ifd0())
            .ok()
            .and_then(|ifd| ifd.description())
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

/// First-match reader over the three strategies.
pub struct MetadataReader {
    query: Option<Box<dyn MetadataQuery>>,
}

impl MetadataReader {
    pub fn new(query: Box<dyn MetadataQuery>) -> Self {
        Self { query: Some(query) }
    }

    /// Reader that only inspects the file itself, no external tool.
    pub fn native() -> Self {
        Self { query: None }
    }

    pub fn graphicsmagick(binary: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(GraphicsMagick::new(binary)))
    }

    pub fn read_existing(&self, path: &Path) -> Option<ProvenanceRecord> {
        if !path.is_file() {
            return None;
        }

        if let Some(query) = &self.query {
            let short = query
                .short_comment(path)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            if let Some(record) = short.as_deref().and_then(ProvenanceRecord::from_comment) {
                return Some(record);
            }
            if let Some(record) = query
                .verbose_dump(path)
                .as_deref()
                .and_then(extract_from_dump)
            {
                tracing::debug!(path = %path.display(), "record recovered from verbose dump");
                return Some(record);
            }
        }

        embedded_comments(path)
            .iter()
            .find_map(|text| ProvenanceRecord::from_comment(text))
    }
}

impl ProvenanceSource for MetadataReader {
    fn read_existing(&self, path: &Path) -> Option<ProvenanceRecord> {
        MetadataReader::read_existing(self, path)
    }
}
