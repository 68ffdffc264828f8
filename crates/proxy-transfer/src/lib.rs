#![forbid(unsafe_code)]

//! Content-addressed chunked transfer for files above the proxy's size
//! threshold, and the background-download job queue that keeps a CLOSE
//! from blocking on a multi-gigabyte upload.

mod client;
mod index;
mod manifest;
mod queue;
mod store;

pub use client::{CacheClient, TransferError};
pub use index::{key_from_metadata, IndexError, ManifestIndex};
pub use manifest::{sha256_hex, Manifest, ManifestPart, CHUNK_SIZE, CONNECTION_COUNT};
pub use queue::{JobQueue, JobRecord, QueueError, MAX_ATTEMPTS, POLL_INTERVAL};
pub use store::{ChunkStore, StoreError};
