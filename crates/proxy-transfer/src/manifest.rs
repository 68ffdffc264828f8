//! The content-addressed manifest: an ordered list of fixed-size chunks,
//! each identified by its SHA-256. Grounded on `twisted_client.py`'s
//! `upload()`/`download_with_tmp_files()`, which split files into 5 MiB
//! parts and reassembled them in `uid` order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Size of one chunk, in bytes. Matches `CHUNK_SIZE_IN_MB` in the original
/// transfer client.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Number of chunks transferred in parallel. Matches `CONNECTION_COUNT`;
/// this also bounds the HTTP connector's persistent connection pool size.
pub const CONNECTION_COUNT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPart {
    pub uid: u64,
    pub offset: u64,
    pub length: u64,
    pub shasum: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub parts: Vec<ManifestPart>,
}

impl Manifest {
    /// Splits `total_size` bytes into `CHUNK_SIZE`-bounded parts, in order.
    /// The actual `shasum` for each part is filled in as chunks are hashed
    /// during upload; this only plans the split.
    pub fn plan(total_size: u64) -> Vec<(u64, u64, u64)> {
        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut uid = 0u64;
        while offset < total_size || (total_size == 0 && uid == 0) {
            let length = CHUNK_SIZE.min(total_size - offset);
            parts.push((uid, offset, length));
            offset += length;
            uid += 1;
            if total_size == 0 {
                break;
            }
        }
        parts
    }

    pub fn sorted_by_uid(&self) -> Vec<&ManifestPart> {
        let mut parts: Vec<&ManifestPart> = self.parts.iter().collect();
        parts.sort_by_key(|p| p.uid);
        parts
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_splits_into_expected_chunk_count() {
        let total = 30 * 1024 * 1024; // 30 MiB
        let parts = Manifest::plan(total);
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[0], (0, 0, CHUNK_SIZE));
        assert_eq!(parts[5], (5, 25 * 1024 * 1024, 5 * 1024 * 1024));
    }

    #[test]
    fn plan_handles_sub_chunk_file() {
        let parts = Manifest::plan(100);
        assert_eq!(parts, vec![(0, 0, 100)]);
    }

    #[test]
    fn sha256_hex_is_64_lowercase_hex_chars() {
        let digest = sha256_hex(b"some file contents");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sha256_hex_is_deterministic_and_content_sensitive() {
        assert_eq!(sha256_hex(b"a"), sha256_hex(b"a"));
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
