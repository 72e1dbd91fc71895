//! CLI output formatting.
//!
//! Stdout carries one line per file plus a summary; diagnostics go through
//! `tracing` to stderr. Paths are shown relative to the root.
//!
//! # Output Format
//!
//! ## Batch commands
//!
//! ```text
//! 001 a.jpg: done
//! 002 trip/b.png: skipped (already has a thumbnail)
//! 003 trip/c.tif: done → converted/trip/c.png
//! 004 broken.tif: failed
//!     not a TIFF file
//!
//! add-thumbnails: 2 done, 1 skipped, 1 failed
//! ```
//!
//! ## Provenance
//!
//! ```text
//! converted/a.png
//!     Source: /photos/a.jpg
//!     SHA-1: 0123...
//!     Created: 1500000000.0
//!     Record: embedded
//!     Content: derived (differs from source)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure.

use crate::batch::{FileReport, Outcome};
use crate::provenance::Inspection;
use serde_json::Value;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Root-relative display path, forward slashes.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Counts per outcome kind, in (done, skipped, failed) order.
pub fn tally(reports: &[FileReport]) -> (usize, usize, usize) {
    reports
        .iter()
        .fold((0, 0, 0), |(done, skipped, failed), r| match r.outcome {
            Outcome::Done(_) => (done + 1, skipped, failed),
            Outcome::Skipped(_) => (done, skipped + 1, failed),
            Outcome::Failed(_) => (done, skipped, failed + 1),
        })
}

// ============================================================================
// Batch commands
// ============================================================================

pub fn format_batch_output(command: &str, reports: &[FileReport], root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, report) in reports.iter().enumerate() {
        let head = format!(
            "{} {}",
            format_index(i + 1),
            display_path(&report.path, root)
        );
        match &report.outcome {
            Outcome::Done(Some(produced)) => {
                lines.push(format!("{}: done → {}", head, display_path(produced, root)))
            }
            Outcome::Done(None) => lines.push(format!("{}: done", head)),
            Outcome::Skipped(reason) => lines.push(format!("{}: skipped ({})", head, reason)),
            Outcome::Failed(reason) => {
                lines.push(format!("{}: failed", head));
                lines.push(format!("{}{}", indent(1), reason));
            }
        }
    }

    if reports.is_empty() {
        lines.push(format!("{}: no matching images", command));
    } else {
        let (done, skipped, failed) = tally(reports);
        lines.push(String::new());
        lines.push(format!(
            "{}: {} done, {} skipped, {} failed",
            command, done, skipped, failed
        ));
    }
    lines
}

pub fn print_batch_output(command: &str, reports: &[FileReport], root: &Path) {
    for line in format_batch_output(command, reports, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Gallery
// ============================================================================

pub fn format_gallery_output(path: &Path, count: usize, root: &Path) -> Vec<String> {
    let noun = if count == 1 { "image" } else { "images" };
    vec![format!(
        "Gallery → {} ({} {})",
        display_path(path, root),
        count,
        noun
    )]
}

pub fn print_gallery_output(path: &Path, count: usize, root: &Path) {
    for line in format_gallery_output(path, count, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// Show the record behind a file and whether the file is the original.
///
/// A record that was not embedded is what the next transformation would
/// mint; its content always matches.
pub fn format_provenance(path: &Path, inspection: &Inspection, root: &Path) -> Vec<String> {
    let record = &inspection.record;
    let ctx = indent(1);
    let created = match &record.created_at {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    let mut lines = vec![
        display_path(path, root),
        format!("{}Source: {}", ctx, record.source_file),
        format!("{}SHA-1: {}", ctx, record.sha1),
        format!("{}Created: {}", ctx, created),
    ];
    lines.push(format!(
        "{}Record: {}",
        ctx,
        if inspection.embedded {
            "embedded"
        } else {
            "none (would be minted)"
        }
    ));
    lines.push(format!(
        "{}Content: {}",
        ctx,
        if inspection.content_matches {
            "original"
        } else {
            "derived (differs from source)"
        }
    ));
    for (key, value) in &record.extra {
        lines.push(format!("{}{}: {}", ctx, key, value));
    }
    lines
}

pub fn print_provenance(path: &Path, inspection: &Inspection, root: &Path) {
    for line in format_provenance(path, inspection, root) {
        println!("{}", line);
    }
}
