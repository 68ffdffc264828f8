//! Orchestrates whole-file transfer on top of [`crate::store::ChunkStore`]
//! and [`crate::index::ManifestIndex`], grounded on `twisted_client.py`'s
//! `upload()`/`download_with_tmp_files()`.

use crate::index::{key_from_metadata, IndexError, ManifestIndex};
use crate::manifest::{Manifest, ManifestPart, CONNECTION_COUNT};
use crate::store::{ChunkStore, StoreError};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CacheClient {
    store: ChunkStore,
    index: ManifestIndex,
}

impl CacheClient {
    pub fn new(store: ChunkStore, index: ManifestIndex) -> CacheClient {
        CacheClient { store, index }
    }

    pub fn key_from_metadata(&self, path: &str, size: u64, mtime: i64) -> String {
        key_from_metadata(path, size, mtime)
    }

    pub async fn has_file(&self, key: &str) -> Result<bool, TransferError> {
        Ok(self.index.has_file(key).await?)
    }

    /// Fetches a large file's content from the content-addressed store when
    /// a manifest is already known under `key`. Returns `false` (with
    /// `output_path` untouched) when nothing is cached yet for that key, so
    /// the caller can fall back to a direct fetch.
    pub async fn download_cached_file(&self, key: &str, output_path: &Path) -> Result<bool, TransferError> {
        match self.index.get_manifest(key).await? {
            Some(manifest) => {
                self.get_file(&manifest, output_path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Splits `local_path` into `CHUNK_SIZE` parts, uploads each (skipping
    /// ones the store already has) with up to `CONNECTION_COUNT` chunks in
    /// flight at a time, and stores the resulting manifest under `key`.
    pub async fn cache_file(&self, key: &str, local_path: &Path) -> Result<Manifest, TransferError> {
        let total_size = tokio::fs::metadata(local_path).await?.len();
        let plan = Manifest::plan(total_size);

        let mut parts = Vec::with_capacity(plan.len());
        let mut pending = FuturesUnordered::new();
        let mut plan_iter = plan.into_iter();

        for (uid, offset, length) in plan_iter.by_ref().take(CONNECTION_COUNT) {
            pending.push(self.upload_part(local_path, uid, offset, length));
        }

        while let Some(result) = pending.next().await {
            parts.push(result?);
            if let Some((uid, offset, length)) = plan_iter.next() {
                pending.push(self.upload_part(local_path, uid, offset, length));
            }
        }

        parts.sort_by_key(|p: &ManifestPart| p.uid);
        let manifest = Manifest { parts };
        self.index.set_manifest(key, &manifest).await?;
        Ok(manifest)
    }

    async fn upload_part(
        &self,
        local_path: &Path,
        uid: u64,
        offset: u64,
        length: u64,
    ) -> Result<ManifestPart, TransferError> {
        let mut file = File::open(local_path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;

        let shasum = self.store.upload_chunk(&buf).await?;
        Ok(ManifestPart {
            uid,
            offset,
            length,
            shasum,
        })
    }

    /// Downloads every part of `manifest` (again bounded to
    /// `CONNECTION_COUNT` in flight) and writes them to `output_path` at
    /// their recorded offsets, so completion order doesn't matter.
    pub async fn get_file(
        &self,
        manifest: &Manifest,
        output_path: &Path,
    ) -> Result<(), TransferError> {
        let file = File::create(output_path).await?;
        let total_len = manifest.parts.iter().map(|p| p.offset + p.length).max().unwrap_or(0);
        file.set_len(total_len).await?;
        drop(file);

        let parts = manifest.sorted_by_uid();
        let mut pending = FuturesUnordered::new();
        let mut parts_iter = parts.into_iter();

        for part in parts_iter.by_ref().take(CONNECTION_COUNT) {
            pending.push(self.download_part(output_path, part));
        }

        while let Some(result) = pending.next().await {
            result?;
            if let Some(part) = parts_iter.next() {
                pending.push(self.download_part(output_path, part));
            }
        }

        Ok(())
    }

    async fn download_part(&self, output_path: &Path, part: &ManifestPart) -> Result<(), TransferError> {
        let data = self.store.download_chunk(&part.shasum).await?;
        let mut file = tokio::fs::OpenOptions::new().write(true).open(output_path).await?;
        file.seek(SeekFrom::Start(part.offset)).await?;
        file.write_all(&data).await?;
        Ok(())
    }
}
