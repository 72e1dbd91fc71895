//! Provenance records and the "preserve if present, else mint" rule.
//!
//! A provenance record is the JSON triple embedded in an image's textual
//! description/comment field:
//!
//! ```json
//! {"created_at": 1500000000.0, "sha1": "<40 hex>", "source_file": "/abs/original.jpg"}
//! ```
//!
//! ## Chain of custody
//!
//! The record is minted exactly once, on the first transformation applied to
//! a file that carries none. Every later transformation (conversion,
//! compression, thumbnail add) copies it forward untouched, so a derivative
//! always names the *original* file and its original content hash, never an
//! intermediate.
//!
//! The rule itself is [`resolve`], a pure function of (existing record, file
//! origin, file bytes). [`resolve_for_file`] is the thin I/O wrapper the
//! processors and drivers call.

use crate::hash;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// The `{created_at, sha1, source_file}` record.
///
/// `created_at` is kept as whatever JSON value was found (a number when
/// minted here, possibly a string or `null` from elsewhere) and unknown keys
/// are kept in `extra`, so a record read from one file is written to the
/// next one exactly as it was found. `None` means the key was absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Value>,
    pub sha1: String,
    pub source_file: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProvenanceRecord {
    /// Build a fresh record for a file that has none.
    pub fn mint(origin: &Origin, sha1: String) -> Self {
        Self {
            created_at: Number::from_f64(origin.created_at).map(Value::Number),
            sha1,
            source_file: origin.source_file.to_string_lossy().into_owned(),
            extra: Map::new(),
        }
    }

    /// Parse a record out of a comment/description string.
    ///
    /// Returns `None` unless the text is a JSON object carrying at least the
    /// `sha1` and `source_file` keys (both strings). Anything else, including
    /// other JSON that happens to live in the same field, means "no record".
    pub fn from_comment(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        let object = value.as_object()?;
        if !object.contains_key("sha1") || !object.contains_key("source_file") {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Serialize for embedding in a comment/description field.
    pub fn to_comment(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether `path` still holds the exact bytes this record was minted from.
    pub fn matches_content(&self, path: &Path) -> io::Result<bool> {
        Ok(hash::digest(path)? == self.sha1)
    }
}

/// A key that is present counts, even when its value is `null`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Filesystem facts a freshly minted record is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    /// Seconds since the epoch: birth time where the platform reports one,
    /// modification time otherwise.
    pub created_at: f64,
    /// Resolved absolute path of the file.
    pub source_file: PathBuf,
}

impl Origin {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let created = meta.created().or_else(|_| meta.modified())?;
        Ok(Self {
            created_at: epoch_seconds(created),
            source_file: std::fs::canonicalize(path)?,
        })
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Anything that can look up a record already embedded in a file.
///
/// Implemented by [`MetadataReader`](crate::metadata::MetadataReader);
/// lookups are best-effort and never fail, they only come back empty.
pub trait ProvenanceSource {
    fn read_existing(&self, path: &Path) -> Option<ProvenanceRecord>;
}

/// The propagation rule: reuse `existing` verbatim, otherwise mint a new
/// record from the file's origin and current content.
pub fn resolve(
    existing: Option<ProvenanceRecord>,
    origin: &Origin,
    content: &[u8],
) -> ProvenanceRecord {
    existing.unwrap_or_else(|| ProvenanceRecord::mint(origin, hash::digest_bytes(content)))
}

/// Apply [`resolve`] to a file on disk.
///
/// The file is only read (and hashed) when no record is found.
pub fn resolve_for_file(
    path: &Path,
    source: &dyn ProvenanceSource,
) -> io::Result<ProvenanceRecord> {
    if let Some(existing) = source.read_existing(path) {
        tracing::debug!(path = %path.display(), "reusing existing provenance record");
        return Ok(existing);
    }
    let origin = Origin::of(path)?;
    let content = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), "minting provenance record");
    Ok(resolve(None, &origin, &content))
}

/// What [`inspect`] found out about a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub record: ProvenanceRecord,
    /// The record was already embedded (as opposed to what would be minted).
    pub embedded: bool,
    /// The file's current bytes hash to `record.sha1`.
    pub content_matches: bool,
}

/// Resolve the record for `path` without writing anything, and check it
/// against the file's current content.
pub fn inspect(path: &Path, source: &dyn ProvenanceSource) -> io::Result<Inspection> {
    let existing = source.read_existing(path);
    let embedded = existing.is_some();
    let record = match existing {
        Some(record) => record,
        None => resolve_for_file(path, &NoRecord)?,
    };
    let content_matches = record.matches_content(path)?;
    Ok(Inspection {
        record,
        embedded,
        content_matches,
    })
}

struct NoRecord;

impl ProvenanceSource for NoRecord {
    fn read_existing(&self, _path: &Path) -> Option<ProvenanceRecord> {
        None
    }
}
