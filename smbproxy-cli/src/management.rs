//! Management Unix-domain socket: a line-protocol `STATS`/`SHUTDOWN`
//! interface, grounded on `debug_interface.py`'s debug socket.

use proxy_telemetry::stats::{
    ClientStats, DebugStats, FsLocalCacheClientStats, GlobalStats, HttpConnectorStats,
    MetadataCacheStats,
};
use proxy_telemetry::Metrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Global, process-wide shutdown flag. Connection tasks poll this between
/// packets and begin draining once it flips.
#[derive(Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> ShutdownFlag {
        ShutdownFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ManagementContext {
    pub listen_address: String,
    pub listen_port: u16,
    pub shutdown: ShutdownFlag,
    pub metrics: Arc<Metrics>,
    pub metadata_cache_size: Arc<dyn Fn() -> usize + Send + Sync>,
    pub active_actions: Arc<dyn Fn() -> usize + Send + Sync>,
    pub connection_open_files: Arc<dyn Fn() -> Vec<(String, usize)> + Send + Sync>,
}

fn socket_path(dir: &str) -> String {
    format!("{dir}/smbproxy-{}.sock", std::process::id())
}

/// Binds the management socket and serves connections until the process
/// exits. Each connection speaks a tiny line protocol: a command per line,
/// one JSON or text reply, then the connection closes.
pub async fn serve(dir: &str, ctx: Arc<ManagementContext>) -> std::io::Result<()> {
    let path = socket_path(dir);
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    log::info!(target: "smbproxy::management", "management socket listening at {path}");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                log::warn!(target: "smbproxy::management", "management connection error: {e}");
            }
        });
    }
}

async fn handle_connection(stream: UnixStream, ctx: Arc<ManagementContext>) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "STATS" => {
                let stats = build_stats(&ctx);
                let body = stats.to_json().to_string();
                writer.write_all(body.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            "SHUTDOWN" => {
                ctx.shutdown.request();
                writer.write_all(b"shutdown requested\n").await?;
            }
            other => {
                writer
                    .write_all(format!("unknown command: {other}\n").as_bytes())
                    .await?;
            }
        }
    }
    Ok(())
}

fn build_stats(ctx: &ManagementContext) -> DebugStats {
    let mut queue_lengths = HashMap::new();
    queue_lengths.insert("pending".to_string(), 0usize);

    let clients = (ctx.connection_open_files)()
        .into_iter()
        .map(|(host, open_files)| ClientStats {
            host,
            tree_connect_requests: 0,
            file_open_requests: 0,
            file_close_requests: 0,
            open_files,
            queue_lengths: queue_lengths.clone(),
            packets_processed: 0,
        })
        .collect();

    DebugStats {
        global: GlobalStats {
            pid: std::process::id(),
            listen_address: ctx.listen_address.clone(),
            listen_port: ctx.listen_port,
            shutdown_requested: ctx.shutdown.is_requested(),
        },
        fs_local_cache_client: FsLocalCacheClientStats {
            active_actions: (ctx.active_actions)(),
        },
        metadata_cache: MetadataCacheStats {
            size: (ctx.metadata_cache_size)(),
        },
        http_connector: HttpConnectorStats {
            requests_stats: ctx.metrics.snapshot(),
        },
        clients,
    }
}
