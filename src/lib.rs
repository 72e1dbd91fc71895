//! # Image Workflow
//!
//! Thumbnail embedding, format conversion and lossless TIFF recompression for a
//! photo archive, with a provenance record that follows every derivative back
//! to the file it came from.
//!
//! # Chain of Custody
//!
//! Every transformation embeds a small JSON record in the output's comment or
//! description field:
//!
//! ```text
//! {"created_at": 1500000000.0, "sha1": "…", "source_file": "/photos/a.jpg"}
//! ```
//!
//! The record is minted once, from the first file that has none, and copied
//! forward verbatim afterwards. Converting `a.jpg` to PNG and then to TIFF
//! yields a TIFF whose record still names `a.jpg` and its hash. Mutations
//! also leave `(atime, mtime)` where they were.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`hash`] | Streaming SHA-1 of file contents |
//! | [`provenance`] | The record type and the "reuse if present, else mint" rule |
//! | [`metadata`] | Finds an existing record: GraphicsMagick queries, then the file's own comment fields |
//! | [`timestamps`] | Capture and restore `(atime, mtime)` around a rewrite |
//! | [`imaging`] | Container plumbing: thumbnails, EXIF/COM, PNG text chunks, TIFF IFDs |
//! | [`processors`] | Add / extract / remove / detect thumbnails, one processor per container family |
//! | [`transform`] | Convert to another format; recompress TIFFs losslessly |
//! | [`scan`] | Sequential directory walk filtered by extension |
//! | [`batch`] | One driver per CLI command, applying a single-file operation across a tree |
//! | [`gallery`] | Single-page HTML gallery rendered with Maud |
//! | [`config`] | `image-workflow.toml` loading and validation |
//! | [`logging`] | `tracing-subscriber` setup |
//! | [`output`] | CLI output formatting |
//!
//! # Thumbnail Placement
//!
//! | Container | Thumbnail | Record |
//! |---|---|---|
//! | JPEG | EXIF IFD1 | EXIF `ImageDescription` |
//! | TIFF | reduced-resolution page behind `SubIFDs` | page 0 `ImageDescription` |
//! | PNG | `<name>.thumb.jpg` next to the file | not written by the thumbnail step |
//!
//! Thumbnails are always 256×256 JPEG, whatever the source aspect ratio.

pub mod batch;
pub mod config;
pub mod gallery;
pub mod hash;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod processors;
pub mod provenance;
pub mod scan;
pub mod timestamps;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
