//! Content hashing for provenance records.
//!
//! SHA-1 is used for content addressing only: the digest answers "is this the
//! same original?" and populates freshly minted records. It is not a security
//! boundary, and the algorithm is fixed by the on-disk record format
//! (`"sha1": "<40 hex chars>"`).

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Read buffer size for streaming digests.
const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-1 of a file's contents as lowercase hex, streamed in fixed-size chunks.
pub fn digest(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha1::new();

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-1 of an in-memory buffer as lowercase hex.
pub fn digest_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn digest_bytes_known_vector() {
        assert_eq!(
            digest_bytes(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn digest_of_empty_input() {
        assert_eq!(digest_bytes(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn file_digest_matches_buffer_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");
        // Larger than one chunk so the streaming loop runs more than once
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(digest(&path).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn digest_is_lowercase_hex_of_40_chars() {
        let hex = digest_bytes(b"image bytes");
        assert_eq!(hex.len(), 40);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn digest_missing_file_errors() {
        assert!(digest(Path::new("/nonexistent/file.jpg")).is_err());
    }
}
