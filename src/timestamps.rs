//! Access/modification time preservation around mutating rewrites.
//!
//! A file's modification time is part of the chain-of-custody evidence: it
//! records when the *content* last changed. Embedding a thumbnail or
//! re-encoding losslessly must not move it, so the pair is captured from the
//! original before a rewrite and stamped onto the staged replacement with
//! [`FileTimestamps::apply_to`] before the rename. A rename keeps the staged
//! file's times, so the original never has to be reopened for writing.

use std::fs::{File, FileTimes};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// `(access_time, modify_time)` captured from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimestamps {
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

impl FileTimestamps {
    pub fn capture(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            accessed: meta.accessed()?,
            modified: meta.modified()?,
        })
    }

    /// Reapply the captured pair to `path` (which may be a different file).
    /// The file must be writable.
    pub fn apply(&self, path: &Path) -> io::Result<()> {
        let file = File::options().write(true).open(path)?;
        self.apply_to(&file)
    }

    /// Reapply the captured pair to an open handle.
    pub fn apply_to(&self, file: &File) -> io::Result<()> {
        file.set_times(
            FileTimes::new()
                .set_accessed(self.accessed)
                .set_modified(self.modified),
        )
    }
}
