//! Entry point: parses configuration, wires every crate's client together,
//! and runs the accept loop plus the management and background-worker
//! tasks until a shutdown is requested and every connection has drained.

mod background;
mod config;
mod connection;
mod management;
mod state;

use clap::Parser;
use config::Cli;
use connection::ConnectionContext;
use management::{ManagementContext, ShutdownFlag};
use proxy_cache::{CacheClient, HttpConnector, MetadataStore};
use proxy_telemetry::{AuditSink, HttpAuditSink, Metrics, NullAuditSink};
use proxy_transfer::{CacheClient as TransferClient, ChunkStore, JobQueue, ManifestIndex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Outbound HTTP requests this proxy allows in flight at once, grounded on
/// `fs_cache.py`'s `sem = defer.DeferredSemaphore(15)`.
const HTTP_CONCURRENCY: usize = 15;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    proxy_telemetry::init_logging(cli.log_level);

    let metrics = Arc::new(Metrics::new());
    let http_client = build_http_client(&cli)?;

    let audit: Arc<dyn AuditSink> = if cli.enable_audit_log {
        match &cli.audit_endpoint {
            Some(endpoint) => Arc::new(HttpAuditSink::new(endpoint.clone())),
            None => {
                log::warn!(target: "smbproxy", "audit log enabled but no --audit-endpoint given, disabling");
                Arc::new(NullAuditSink)
            }
        }
    } else {
        Arc::new(NullAuditSink)
    };

    let metadata = MetadataStore::new(Some(&cli.redis_url));
    let http = HttpConnector::new(
        http_client.clone(),
        &cli.metadata_proxy_host,
        cli.metadata_proxy_port,
        &cli.http_service_host,
        cli.http_service_port,
        HTTP_CONCURRENCY,
        metrics.clone(),
    );

    let transfer = match (
        ManifestIndex::new(&cli.redis_url),
        JobQueue::new(&cli.redis_url),
    ) {
        (Ok(index), Ok(queue)) => {
            let store = ChunkStore::new(
                http_client.clone(),
                cli.content_store_url.clone(),
                proxy_transfer::CONNECTION_COUNT,
            );
            let transfer = Arc::new(TransferClient::new(store, index));
            Some((transfer, Arc::new(queue)))
        }
        (Err(e), _) | (_, Err(e)) => {
            log::warn!(target: "smbproxy", "content-addressed transfer disabled, failed to reach redis: {e}");
            None
        }
    };

    let cache = Arc::new(CacheClient::new(
        cli.cache_settings(),
        metadata,
        http,
        transfer.as_ref().map(|(t, _)| t.clone()),
    ));

    let shutdown = ShutdownFlag::new();
    let active_connections = Arc::new(AtomicUsize::new(0));

    if let Some((transfer_client, job_queue)) = transfer {
        tokio::spawn(background::run(job_queue, transfer_client));
    }

    let management_ctx = Arc::new(ManagementContext {
        listen_address: cli.listen_address.to_string(),
        listen_port: cli.listen_port,
        shutdown: shutdown.clone(),
        metrics: metrics.clone(),
        metadata_cache_size: {
            let cache = cache.clone();
            Arc::new(move || cache.metadata_cache_size())
        },
        active_actions: {
            let active_connections = active_connections.clone();
            Arc::new(move || active_connections.load(Ordering::SeqCst))
        },
        connection_open_files: Arc::new(|| Vec::new()),
    });
    {
        let dir = cli.management_socket_dir.clone();
        let ctx = management_ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = management::serve(&dir, ctx).await {
                log::error!(target: "smbproxy::management", "management socket exited: {e}");
            }
        });
    }

    let connection_ctx = Arc::new(ConnectionContext {
        cache,
        shares_root: PathBuf::from(cli.shares_root.clone()),
        force_host: cli.force_host.clone(),
        shutdown: shutdown.clone(),
        metrics: metrics.clone(),
        audit,
    });
    let backend_config = cli.backend_config();

    let listener = TcpListener::bind((cli.listen_address, cli.listen_port)).await?;
    log::info!(
        target: "smbproxy",
        "listening on {}:{}",
        cli.listen_address,
        cli.listen_port
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (client_stream, peer_addr) = accepted?;
                let ctx = connection_ctx.clone();
                let backend_config = backend_config.clone();
                let active_connections = active_connections.clone();
                let connection_id = uuid::Uuid::new_v4().to_string();

                active_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let result = connect_and_handle(
                        connection_id,
                        peer_addr.to_string(),
                        client_stream,
                        &backend_config,
                        ctx,
                    )
                    .await;
                    if let Err(e) = result {
                        log::warn!(target: "smbproxy::connection", "connection error: {e}");
                    }
                    active_connections.fetch_sub(1, Ordering::SeqCst);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!(target: "smbproxy", "received interrupt, requesting shutdown");
                shutdown.request();
            }
        }

        if shutdown.is_requested() && active_connections.load(Ordering::SeqCst) == 0 {
            break;
        }
    }

    Ok(())
}

/// Builds the shared `reqwest` client, configuring a client certificate for
/// mutual TLS to the backend fileserver when `--ssl-cert`/`--ssl-key` are
/// given, and trusting `--ssl-ca` in place of the platform store when
/// present. Grounded on `ssl_agent.py`'s `create_agent`.
fn build_http_client(cli: &Cli) -> std::io::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let (Some(cert_path), Some(key_path)) = (&cli.ssl_cert, &cli.ssl_key) {
        let mut pem = std::fs::read(cert_path)?;
        pem.extend_from_slice(&std::fs::read(key_path)?);
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        builder = builder.identity(identity);
    }

    if let Some(ca_path) = &cli.ssl_ca {
        let ca_pem = std::fs::read(ca_path)?;
        let cert = reqwest::Certificate::from_pem(&ca_pem)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn connect_and_handle(
    connection_id: String,
    peer: String,
    client_stream: tokio::net::TcpStream,
    backend_config: &proxy_transport::BackendConfig,
    ctx: Arc<ConnectionContext>,
) -> std::io::Result<()> {
    let backend_stream = proxy_transport::connect_backend(
        backend_config,
        std::time::Duration::from_secs(10),
    )
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e))?;

    connection::handle(connection_id, peer, client_stream, backend_stream, ctx).await
}
