//! The cache-aware actions the proxy performs against a path: SYNC,
//! LISTDIR, SYNCBACK, DELETE and TOUCH. Grounded on the public methods of
//! `FSCache` in `fs_cache.py` (`get_metadata_async`/`get_dir_listing_async`/
//! `get_file`/`set_file`/`delete_file`/`touch_file`).

use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::http::HttpConnector;
use crate::metadata::{DirListing, FileMetadata, MetadataStore};
use crate::paths::full_path_from_share;
use proxy_transfer::CacheClient as TransferClient;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// `remote_mtime - 500 * mtime_refresh_threshold`: how far back a
/// placeholder's mtime is set relative to the real remote mtime, so a
/// client comparing timestamps always sees the placeholder as older than
/// the real file and triggers a refresh rather than trusting stale data.
const PLACEHOLDER_MTIME_BACKDATE_FACTOR: i64 = 500;

pub struct CacheClient {
    settings: CacheSettings,
    metadata: MetadataStore,
    http: HttpConnector,
    transfer: Option<Arc<TransferClient>>,
}

impl CacheClient {
    pub fn new(
        settings: CacheSettings,
        metadata: MetadataStore,
        http: HttpConnector,
        transfer: Option<Arc<TransferClient>>,
    ) -> CacheClient {
        CacheClient {
            settings,
            metadata,
            http,
            transfer,
        }
    }

    fn max_age_for(&self, share_name: &str, path: &str) -> Duration {
        let full_path = full_path_from_share(share_name, path);
        for pattern in &self.settings.no_recheck_metadata_patterns {
            if full_path.starts_with(pattern.as_str()) {
                return Duration::from_secs(24 * 3600);
            }
        }
        Duration::from_secs(self.settings.mtime_metadata_refresh_threshold)
    }

    /// SYNC: fetches metadata for `path` (served from the two-tier cache
    /// when still fresh) and materializes `local_path` to match it — a real
    /// directory for a directory target, and for a regular file its actual
    /// content (small files via a direct GET, large ones through the
    /// content-addressed store) with the real remote mtime. Content is
    /// fetched only when the local copy doesn't already look fresh; a
    /// failed fetch falls back to a backdated placeholder rather than
    /// failing the whole action.
    pub async fn sync(
        &self,
        share_name: &str,
        path: &str,
        local_path: &Path,
        force_update: bool,
    ) -> Result<FileMetadata, CacheError> {
        let full_path = full_path_from_share(share_name, path);
        let max_age = self.max_age_for(share_name, path);

        if !force_update {
            if let Some(cached) = self.metadata.get_file(&full_path, max_age).await {
                return Ok(cached);
            }
        }

        let body = self.http.get_metadata(&full_path).await?;
        let metadata: FileMetadata = serde_json::from_slice(&body)?;
        self.metadata.set_file(&full_path, metadata.clone()).await;

        if metadata.exists && metadata.is_file {
            self.materialize_file(local_path, &full_path, &metadata).await?;
        } else if metadata.exists && metadata.is_dir {
            tokio::fs::create_dir_all(local_path).await?;
        }

        Ok(metadata)
    }

    async fn materialize_file(
        &self,
        local_path: &Path,
        full_path: &str,
        metadata: &FileMetadata,
    ) -> Result<(), CacheError> {
        if already_fresh(local_path, metadata.mtime, self.settings.mtime_refresh_threshold).await {
            return Ok(());
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let fetched = if metadata.size >= self.settings.cacheclient3_size_threshold {
            self.fetch_large_file(full_path, local_path, metadata)
                .await
                .unwrap_or(false)
        } else {
            self.fetch_small_file(full_path, local_path).await.unwrap_or(false)
        };

        if fetched {
            let mtime = filetime::FileTime::from_unix_time(metadata.mtime, 0);
            filetime::set_file_times(local_path, mtime, mtime)?;
            std::fs::set_permissions(local_path, std::fs::Permissions::from_mode(0o777))?;
            Ok(())
        } else {
            create_placeholder(
                local_path,
                metadata.size,
                metadata.mtime,
                self.settings.mtime_refresh_threshold,
            )
        }
    }

    async fn fetch_small_file(&self, full_path: &str, local_path: &Path) -> Result<bool, CacheError> {
        match self.http.get_file(full_path).await {
            Ok(bytes) => {
                tokio::fs::write(local_path, &bytes).await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn fetch_large_file(
        &self,
        full_path: &str,
        local_path: &Path,
        metadata: &FileMetadata,
    ) -> Result<bool, CacheError> {
        let Some(transfer) = &self.transfer else {
            return self.fetch_small_file(full_path, local_path).await;
        };
        let key = transfer.key_from_metadata(full_path, metadata.size, metadata.mtime);
        if transfer.download_cached_file(&key, local_path).await.unwrap_or(false) {
            return Ok(true);
        }
        self.fetch_small_file(full_path, local_path).await
    }

    /// LISTDIR: returns the names and per-child metadata of a directory's
    /// contents, populating the metadata cache for every child in the same
    /// pass (mirrors `get_dir_listing_async`'s `files_metadata` piggyback),
    /// and materializes a placeholder or directory for every child that
    /// exists remotely under `local_dir`.
    pub async fn list_dir(
        &self,
        share_name: &str,
        path: &str,
        local_dir: &Path,
        force_update: bool,
    ) -> Result<DirListing, CacheError> {
        let full_path = full_path_from_share(share_name, path);
        let max_age = self.max_age_for(share_name, path);

        if !force_update {
            if let Some(cached) = self.metadata.get_dir(&full_path, max_age).await {
                return Ok(cached);
            }
        }

        let body = self
            .http
            .get_dir_listing(&full_path, Duration::from_secs(self.settings.list_dir_timeout_secs))
            .await?;
        let listing: DirListing = serde_json::from_slice(&body)?;
        self.metadata.set_dir(&full_path, listing.clone()).await;

        tokio::fs::create_dir_all(local_dir).await?;

        for (child, child_metadata) in &listing.files_metadata {
            let child_path = format!("{}\\{child}", path.trim_end_matches('\\'));
            let child_full_path = full_path_from_share(share_name, &child_path);
            self.metadata.set_file(&child_full_path, child_metadata.clone()).await;

            if !child_metadata.exists {
                continue;
            }
            let child_local_path = local_dir.join(child);
            if child_metadata.is_file {
                let _ = create_placeholder(
                    &child_local_path,
                    child_metadata.size,
                    child_metadata.mtime,
                    self.settings.mtime_refresh_threshold,
                );
            } else if child_metadata.is_dir {
                let _ = tokio::fs::create_dir_all(&child_local_path).await;
            }
        }

        Ok(listing)
    }

    /// SYNCBACK: pushes a locally-written file back to the backend. Large
    /// files go through the content-addressed transfer and its background
    /// job queue so a CLOSE doesn't block on the full upload; small ones
    /// are written through immediately, matching `FSCache.set_file`.
    pub async fn sync_back(
        &self,
        share_name: &str,
        path: &str,
        local_path: &Path,
    ) -> Result<(), CacheError> {
        if !self.settings.enable_write_through {
            return Ok(());
        }

        let full_path = full_path_from_share(share_name, path);
        let local_size = tokio::fs::metadata(local_path).await?.len();

        if local_size >= self.settings.cacheclient3_size_threshold {
            if let Some(transfer) = &self.transfer {
                let mtime = tokio::fs::metadata(local_path)
                    .await?
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                let key = transfer.key_from_metadata(&full_path, local_size, mtime);
                if !transfer.has_file(&key).await? {
                    transfer.cache_file(&key, local_path).await?;
                }
                return Ok(());
            }
        }

        self.http.write_file(&full_path, local_path).await?;

        Ok(())
    }

    /// DELETE: removes `path` from the backend and invalidates its
    /// parent's directory listing, since the deleted entry must stop
    /// appearing there.
    pub async fn delete(&self, share_name: &str, path: &str, local_path: &Path) -> Result<(), CacheError> {
        let full_path = full_path_from_share(share_name, path);
        self.http.delete_file(&full_path).await?;

        let parent = parent_path(path);
        if let Some(parent_dir) = local_path.parent() {
            let _ = self.list_dir(share_name, &parent, parent_dir, true).await;
        }

        Ok(())
    }

    /// Whether write-back actions (SYNCBACK, DELETE) should run at all,
    /// per the `enable_write_through` setting.
    pub fn write_through_enabled(&self) -> bool {
        self.settings.enable_write_through
    }

    /// Number of entries currently held in the process-local metadata
    /// cache, exposed to the management socket's `STATS` command.
    pub fn metadata_cache_size(&self) -> usize {
        self.metadata.local_size()
    }

    /// TOUCH: advisory mtime refresh on the backend, sent only when
    /// configured on. Never blocks: a touch that fails is logged upstream
    /// and otherwise ignored, since it is never required for correctness.
    pub async fn touch(&self, share_name: &str, path: &str) -> Result<(), CacheError> {
        if !self.settings.enable_touch_files {
            return Ok(());
        }
        let full_path = full_path_from_share(share_name, path);
        self.http.touch_file(&full_path).await?;
        Ok(())
    }
}

fn parent_path(path: &str) -> String {
    match path.rfind('\\') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Whether `local_path` already looks like a fresh copy of the remote file:
/// present, non-empty, and newer than `remote_mtime` by at least
/// `mtime_refresh_threshold` seconds. When true, SYNC can skip fetching
/// content again.
async fn already_fresh(local_path: &Path, remote_mtime: i64, mtime_refresh_threshold: u64) -> bool {
    let Ok(local_meta) = tokio::fs::metadata(local_path).await else {
        return false;
    };
    if local_meta.len() == 0 {
        return false;
    }
    let Ok(local_mtime) = local_meta.modified() else {
        return false;
    };
    let local_secs = local_mtime
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    remote_mtime < local_secs + mtime_refresh_threshold as i64
}

/// Creates (or resizes) a sparse placeholder file: 0600 permissions, sized
/// to the remote file, with mtime backdated so any mtime comparison treats
/// it as stale and prompts a real refresh before being trusted.
fn create_placeholder(
    local_path: &Path,
    remote_size: u64,
    remote_mtime: i64,
    mtime_refresh_threshold: u64,
) -> Result<(), CacheError> {
    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(local_path)?;
    file.set_len(remote_size)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;

    let backdated = remote_mtime - PLACEHOLDER_MTIME_BACKDATE_FACTOR * mtime_refresh_threshold as i64;
    let backdated = backdated.max(0) as u64;
    let mtime = filetime::FileTime::from_unix_time(backdated as i64, 0);
    filetime::set_file_times(local_path, mtime, mtime)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_path_of_nested_file() {
        assert_eq!(parent_path(r"foo\bar\baz.txt"), r"foo\bar");
    }

    #[test]
    fn parent_path_of_top_level_file() {
        assert_eq!(parent_path("baz.txt"), "");
    }
}
