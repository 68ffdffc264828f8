use crate::http::HttpError;
use proxy_transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("fileserver request failed: {0}")]
    Http(#[from] HttpError),
    #[error("content-addressed transfer failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("response body was not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
}
