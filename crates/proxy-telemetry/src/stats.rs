//! Shapes the `STATS` payload returned over the management socket.
//!
//! Mirrors `debug_interface.py`'s `get_debug_stats_struct`: a `Global`
//! section, one section per cache subsystem, and a `Client` array with one
//! entry per connected peer.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct GlobalStats {
    pub pid: u32,
    pub listen_address: String,
    pub listen_port: u16,
    pub shutdown_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct FsLocalCacheClientStats {
    pub active_actions: usize,
}

#[derive(Debug, Serialize)]
pub struct MetadataCacheStats {
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct HttpConnectorStats {
    pub requests_stats: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct ClientStats {
    pub host: String,
    pub tree_connect_requests: usize,
    pub file_open_requests: usize,
    pub file_close_requests: usize,
    pub open_files: usize,
    pub queue_lengths: HashMap<String, usize>,
    pub packets_processed: u64,
}

#[derive(Debug, Serialize)]
pub struct DebugStats {
    pub global: GlobalStats,
    pub fs_local_cache_client: FsLocalCacheClientStats,
    pub metadata_cache: MetadataCacheStats,
    pub http_connector: HttpConnectorStats,
    pub clients: Vec<ClientStats>,
}

impl DebugStats {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
