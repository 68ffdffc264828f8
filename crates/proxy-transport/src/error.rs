use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to resolve backend address {0}: {1}")]
    Resolve(String, std::io::Error),

    #[error("no addresses resolved for backend {0}")]
    NoAddress(String),

    #[error("timed out connecting to backend {0}")]
    ConnectTimeout(SocketAddr),

    #[error("io error talking to backend: {0}")]
    Io(#[from] std::io::Error),
}
