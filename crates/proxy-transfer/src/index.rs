//! The content-addressed index: maps `(path, size, mtime)` to a manifest,
//! grounded on `filecache_client3.py`'s `CacheClient3`. Keys and the
//! keyset name are kept identical to the original so an already-warm cache
//! survives a rollout to this implementation.

use crate::manifest::Manifest;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const ALL_KEYS_METAKEY: &str = "renderfarm:cacheclient3:keyset";

pub fn key_from_metadata(path: &str, size: u64, mtime: i64) -> String {
    format!(
        "renderfarm:cacheclient3:file:{}:{}:{}",
        BASE64.encode(path),
        size,
        mtime
    )
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("manifest at key {0} was not valid JSON")]
    Corrupt(String),
}

pub struct ManifestIndex {
    client: redis::Client,
}

impl ManifestIndex {
    pub fn new(redis_url: &str) -> Result<ManifestIndex, IndexError> {
        Ok(ManifestIndex {
            client: redis::Client::open(redis_url)?,
        })
    }

    pub async fn has_file(&self, key: &str) -> Result<bool, IndexError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = redis::Cmd::exists(key).query_async(&mut conn).await?;
        Ok(exists)
    }

    pub async fn get_manifest(&self, key: &str) -> Result<Option<Manifest>, IndexError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::Cmd::get(key).query_async(&mut conn).await?;
        match raw {
            Some(json) => {
                let manifest: Manifest =
                    serde_json::from_str(&json).map_err(|_| IndexError::Corrupt(key.to_string()))?;
                Ok(Some(manifest))
            }
            None => Ok(None),
        }
    }

    pub async fn set_manifest(&self, key: &str, manifest: &Manifest) -> Result<(), IndexError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(manifest).unwrap_or_default();
        let _: () = redis::Cmd::set(key, json).query_async(&mut conn).await?;
        let _: () = redis::Cmd::sadd(ALL_KEYS_METAKEY, key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_metadata_embeds_base64_path_size_mtime() {
        let key = key_from_metadata("/data/scene.ma", 12345, 1_700_000_000);
        assert_eq!(
            key,
            format!(
                "renderfarm:cacheclient3:file:{}:12345:1700000000",
                BASE64.encode("/data/scene.ma")
            )
        );
    }
}
