//! Two-tier metadata cache: a process-local map with a per-path TTL backing
//! a shared key-value store, grounded on `fs_cache.py`'s
//! `FSCache.metadata_cache` dict and `metadata_proxy/metadata_loader.py`'s
//! Redis-backed `get_cached_file_metadata`/`get_cached_list_dir`.
//!
//! Values in the shared store are zlib-compressed JSON, matching the
//! original's `compute_file_metadata_key`/`compute_list_dir_key` scheme, so
//! a Rust and a Python instance of this proxy can share one Redis deployment
//! during a staged rollout.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    pub exists: bool,
    pub is_file: bool,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: i64,
    pub normalized_path: Option<String>,
}

impl FileMetadata {
    pub fn missing() -> FileMetadata {
        FileMetadata {
            exists: false,
            is_file: false,
            is_dir: false,
            size: 0,
            mtime: 0,
            normalized_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DirListing {
    pub files: Vec<String>,
    pub files_metadata: HashMap<String, FileMetadata>,
}

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

/// The shape actually stored in the shared KV tier: the value plus the wall
/// clock time it was written, so a reader (possibly in a different process,
/// possibly much later) can still apply the same `max_age` freshness rule
/// the process-local tier applies, instead of trusting the shared entry
/// forever once it lands in Redis.
#[derive(Serialize, Deserialize)]
struct SharedEntry<T> {
    value: T,
    stored_at_unix_secs: u64,
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Process-local cache, keyed by the full backend path, shared across every
/// connection in this process. The shared Redis tier is consulted only on
/// a local miss, mirroring `get_metadata_async`'s two-step lookup.
pub struct MetadataStore {
    files: Mutex<HashMap<String, CacheEntry<FileMetadata>>>,
    dirs: Mutex<HashMap<String, CacheEntry<DirListing>>>,
    redis: Option<redis::Client>,
}

const KEY_PREFIX_FILE: &str = "seekscale:metadata:file_metadata:";
const KEY_PREFIX_DIR: &str = "seekscale:metadata:list_dir:";

fn file_key(full_path: &str) -> String {
    format!("{KEY_PREFIX_FILE}{}", BASE64.encode(full_path))
}

fn dir_key(full_path: &str) -> String {
    format!("{KEY_PREFIX_DIR}{}", BASE64.encode(full_path))
}

fn compress(value: &impl Serialize) -> Vec<u8> {
    let json = serde_json::to_vec(value).unwrap_or_default();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(&json);
    encoder.finish().unwrap_or_default()
}

fn decompress<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Option<T> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json).ok()?;
    serde_json::from_slice(&json).ok()
}

impl MetadataStore {
    pub fn new(redis_url: Option<&str>) -> MetadataStore {
        let redis = redis_url.and_then(|url| redis::Client::open(url).ok());
        MetadataStore {
            files: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashMap::new()),
            redis,
        }
    }

    pub async fn get_file(&self, full_path: &str, max_age: Duration) -> Option<FileMetadata> {
        if let Some(entry) = self.files.lock().expect("metadata lock poisoned").get(full_path) {
            if entry.fetched_at.elapsed() <= max_age {
                return Some(entry.value.clone());
            }
        }
        self.get_file_shared(full_path, max_age).await
    }

    pub async fn set_file(&self, full_path: &str, metadata: FileMetadata) {
        self.files.lock().expect("metadata lock poisoned").insert(
            full_path.to_string(),
            CacheEntry {
                value: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );
        self.set_file_shared(full_path, &metadata).await;
    }

    pub async fn get_dir(&self, full_path: &str, max_age: Duration) -> Option<DirListing> {
        if let Some(entry) = self.dirs.lock().expect("metadata lock poisoned").get(full_path) {
            if entry.fetched_at.elapsed() <= max_age {
                return Some(entry.value.clone());
            }
        }
        self.get_dir_shared(full_path, max_age).await
    }

    pub async fn set_dir(&self, full_path: &str, listing: DirListing) {
        self.dirs.lock().expect("metadata lock poisoned").insert(
            full_path.to_string(),
            CacheEntry {
                value: listing.clone(),
                fetched_at: Instant::now(),
            },
        );
        self.set_dir_shared(full_path, &listing).await;
    }

    /// Drops every process-local entry. The management socket's `STATS`
    /// command exposes the resulting size; there is no equivalent flush for
    /// the shared tier, since other proxy instances may still rely on it.
    pub fn flush_local(&self) {
        self.files.lock().expect("metadata lock poisoned").clear();
        self.dirs.lock().expect("metadata lock poisoned").clear();
    }

    pub fn local_size(&self) -> usize {
        self.files.lock().expect("metadata lock poisoned").len()
            + self.dirs.lock().expect("metadata lock poisoned").len()
    }

    async fn get_file_shared(&self, full_path: &str, max_age: Duration) -> Option<FileMetadata> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.get_multiplexed_async_connection().await.ok()?;
        let bytes: Vec<u8> = redis::Cmd::get(file_key(full_path))
            .query_async(&mut conn)
            .await
            .ok()?;
        let entry: SharedEntry<FileMetadata> = decompress(&bytes)?;
        if unix_now_secs().saturating_sub(entry.stored_at_unix_secs) > max_age.as_secs() {
            return None;
        }
        Some(entry.value)
    }

    async fn set_file_shared(&self, full_path: &str, metadata: &FileMetadata) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let payload = compress(&SharedEntry {
                value: metadata,
                stored_at_unix_secs: unix_now_secs(),
            });
            let _: Result<(), _> = redis::Cmd::set(file_key(full_path), payload)
                .query_async(&mut conn)
                .await;
        }
    }

    async fn get_dir_shared(&self, full_path: &str, max_age: Duration) -> Option<DirListing> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.get_multiplexed_async_connection().await.ok()?;
        let bytes: Vec<u8> = redis::Cmd::get(dir_key(full_path))
            .query_async(&mut conn)
            .await
            .ok()?;
        let entry: SharedEntry<DirListing> = decompress(&bytes)?;
        if unix_now_secs().saturating_sub(entry.stored_at_unix_secs) > max_age.as_secs() {
            return None;
        }
        Some(entry.value)
    }

    async fn set_dir_shared(&self, full_path: &str, listing: &DirListing) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let payload = compress(&SharedEntry {
                value: listing,
                stored_at_unix_secs: unix_now_secs(),
            });
            let _: Result<(), _> = redis::Cmd::set(dir_key(full_path), payload)
                .query_async(&mut conn)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_roundtrips_through_zlib() {
        let meta = FileMetadata {
            exists: true,
            is_file: true,
            is_dir: false,
            size: 100,
            mtime: 1_700_000_000,
            normalized_path: Some("Foo.txt".to_string()),
        };
        let bytes = compress(&meta);
        let back: FileMetadata = decompress(&bytes).unwrap();
        assert_eq!(back, meta);
    }

    #[tokio::test]
    async fn local_cache_hits_within_max_age() {
        let store = MetadataStore::new(None);
        store.set_file("/a/b.txt", FileMetadata::missing()).await;
        assert!(store
            .get_file("/a/b.txt", Duration::from_secs(60))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn local_cache_misses_past_max_age() {
        let store = MetadataStore::new(None);
        store.set_file("/a/b.txt", FileMetadata::missing()).await;
        assert!(store
            .get_file("/a/b.txt", Duration::from_secs(0))
            .await
            .is_none());
    }
}
