//! Chunk-level HTTP primitives against the content-addressed store,
//! grounded on `twisted_client.py`'s `upload_part`/`download_part`/
//! `check_part`. The store is addressed purely by SHA-256: `HEAD /get/<sha>`
//! tests presence, `POST /upload` is an idempotent chunk upload, and
//! `GET /get/<sha>` downloads one chunk.

use crate::manifest::sha256_hex;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transport error talking to the content store: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("content store returned status {0} for chunk {1}")]
    BadStatus(StatusCode, String),
}

pub struct ChunkStore {
    client: Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl ChunkStore {
    pub fn new(client: Client, base_url: impl Into<String>, connection_count: usize) -> ChunkStore {
        ChunkStore {
            client,
            base_url: base_url.into(),
            semaphore: Arc::new(Semaphore::new(connection_count)),
        }
    }

    /// `HEAD /get/<sha>`: `true` when the chunk is already present, so an
    /// upload can be skipped.
    pub async fn has_chunk(&self, shasum: &str) -> Result<bool, StoreError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let url = format!("{}/get/{shasum}", self.base_url);
        let resp = self.client.head(&url).send().await?;
        Ok(resp.status() == StatusCode::OK)
    }

    /// Uploads `data` if the store doesn't already have a chunk under its
    /// SHA-256, the idempotent HEAD-before-PUT pattern from the original
    /// client. Returns the chunk's shasum either way.
    pub async fn upload_chunk(&self, data: &[u8]) -> Result<String, StoreError> {
        let shasum = sha256_hex(data);
        if self.has_chunk(&shasum).await? {
            return Ok(shasum);
        }

        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let url = format!("{}/upload", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("X-Seekscale-Payload-Length", data.len().to_string())
            .header("X-Seekscale-Payload-Shasum", shasum.clone())
            .body(data.to_vec())
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(StoreError::BadStatus(resp.status(), shasum));
        }
        Ok(shasum)
    }

    /// `GET /get/<sha>`: downloads one chunk in full.
    pub async fn download_chunk(&self, shasum: &str) -> Result<Vec<u8>, StoreError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let url = format!("{}/get/{shasum}", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(StoreError::BadStatus(resp.status(), shasum.to_string()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
