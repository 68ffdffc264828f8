use crate::config::BackendConfig;
use crate::error::TransportError;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};

/// Resolves and connects to the backend SMB server over Direct-TCP
/// (MS-SMB2 2.1), applying `timeout` to the connect attempt itself.
///
/// Nagle's algorithm is disabled the way real SMB clients disable it: the
/// protocol is request/response with small, latency-sensitive messages, and
/// batching them defeats the point of pipelining compound requests.
pub async fn connect_backend(
    config: &BackendConfig,
    timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let addr_string = config.addr_string();
    let mut addrs = lookup_host(&addr_string)
        .await
        .map_err(|e| TransportError::Resolve(addr_string.clone(), e))?;
    let addr = addrs
        .next()
        .ok_or_else(|| TransportError::NoAddress(addr_string.clone()))?;

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::ConnectTimeout(addr))??;

    stream.set_nodelay(true)?;
    log::debug!(target: "proxy_transport", "connected to backend {addr}");
    Ok(stream)
}
