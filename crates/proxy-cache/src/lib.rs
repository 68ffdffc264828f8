#![forbid(unsafe_code)]

//! Cache-aware remote filesystem access: metadata store, HTTP connector to
//! the backend fileserver and metadata proxy, and the SYNC/LISTDIR/
//! SYNCBACK/DELETE/TOUCH actions the connection state machine drives.

mod client;
mod config;
mod error;
mod http;
mod metadata;
mod paths;

pub use client::CacheClient;
pub use config::CacheSettings;
pub use error::CacheError;
pub use http::{HttpConnector, HttpError};
pub use metadata::{DirListing, FileMetadata, MetadataStore};
pub use paths::{apply_force_host, full_path_from_share, is_excluded_share};
