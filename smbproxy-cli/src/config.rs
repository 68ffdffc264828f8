//! Command-line configuration, grounded on `settings.py`'s module-level
//! constants. Every default below matches the original so an operator
//! migrating a deployment doesn't need to relearn the knobs.

use clap::Parser;
use proxy_cache::CacheSettings;
use proxy_transport::BackendConfig;
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(name = "smbproxy", version, about = "Transparent SMB2 interception proxy")]
pub struct Cli {
    /// Address this proxy listens on for incoming SMB2 connections.
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_address: IpAddr,

    /// Port this proxy listens on. SMB's well-known port.
    #[arg(long, default_value_t = 445)]
    pub listen_port: u16,

    /// Host of the real Samba instance this proxy forwards to.
    #[arg(long, default_value = "127.0.0.1")]
    pub remote_samba_host: String,

    /// Port of the real Samba instance.
    #[arg(long, default_value_t = 1445)]
    pub remote_samba_port: u16,

    /// Host of the metadata proxy (serves `file_metadata.json`/`list_dir.json`).
    #[arg(long, default_value = "10.91.1.254")]
    pub metadata_proxy_host: String,

    #[arg(long, default_value_t = 25200)]
    pub metadata_proxy_port: u16,

    /// Host of the backend fileserver HTTP API.
    #[arg(long, default_value = "gateway.seekscale.com")]
    pub http_service_host: String,

    #[arg(long, default_value_t = 15024)]
    pub http_service_port: u16,

    /// Redis connection URL for the shared metadata/manifest/job-queue store.
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    pub redis_url: String,

    /// Base URL of the content-addressed chunk store.
    #[arg(long, default_value = "https://entrypoint.seekscale.com:34968")]
    pub content_store_url: String,

    /// Client certificate used for mutual TLS to the backend fileserver.
    #[arg(long)]
    pub ssl_cert: Option<String>,
    #[arg(long)]
    pub ssl_key: Option<String>,
    #[arg(long)]
    pub ssl_ca: Option<String>,

    /// Overrides every share's UNC host component, for multi-tenant
    /// deployments that all point at one proxy instance.
    #[arg(long)]
    pub force_host: Option<String>,

    /// Root directory the placeholder files are materialized under.
    #[arg(long, default_value = "/home/data/smbshares/")]
    pub shares_root: String,

    #[arg(long, default_value_t = 1024 * 1024)]
    pub cacheclient3_size_threshold: u64,

    #[arg(long, default_value_t = 5)]
    pub mtime_refresh_threshold: u64,

    #[arg(long, default_value_t = 15)]
    pub mtime_metadata_refresh_threshold: u64,

    #[arg(long, default_value_t = 50)]
    pub list_dir_timeout_secs: u64,

    #[arg(long)]
    pub enable_write_through: bool,

    #[arg(long)]
    pub enable_touch_files: bool,

    /// Writes a row per filesystem operation to the audit HTTP endpoint.
    #[arg(long)]
    pub enable_audit_log: bool,

    #[arg(long)]
    pub audit_endpoint: Option<String>,

    /// Minimum log level.
    #[arg(long, default_value = "info")]
    pub log_level: log::LevelFilter,

    /// Directory the management Unix socket is created in. The actual
    /// socket is named `smbproxy-<pid>.sock`.
    #[arg(long, default_value = "/tmp")]
    pub management_socket_dir: String,
}

impl Cli {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            host: self.remote_samba_host.clone(),
            port: self.remote_samba_port,
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            cacheclient3_size_threshold: self.cacheclient3_size_threshold,
            mtime_refresh_threshold: self.mtime_refresh_threshold,
            mtime_metadata_refresh_threshold: self.mtime_metadata_refresh_threshold,
            no_recheck_metadata_patterns: Vec::new(),
            enable_write_through: self.enable_write_through,
            enable_touch_files: self.enable_touch_files,
            list_dir_timeout_secs: self.list_dir_timeout_secs,
            shares_root: self.shares_root.clone(),
        }
    }
}
