//! Per-connection SMB2 state: the bookkeeping needed to resolve a CREATE
//! response, a QUERY_DIRECTORY or a SET_INFO/CLOSE request back to the
//! share and path they belong to, since the wire protocol only carries
//! opaque tree/file ids after the initial TREE_CONNECT/CREATE exchange.

use proxy_dtyp::FileId;
use std::collections::HashMap;

/// A TREE_CONNECT request seen on the wire, kept until its response
/// arrives so the assigned tree id can be bound to the requested share.
#[derive(Debug, Clone)]
pub struct PendingTreeConnect {
    pub share_name: String,
}

/// A tree this connection has successfully connected to.
#[derive(Debug, Clone)]
pub struct ConnectedTree {
    pub share_name: String,
}

/// A CREATE request seen on the wire, kept until its response arrives.
#[derive(Debug, Clone)]
pub struct PendingCreate {
    pub tree_id: u32,
    pub name: String,
    pub desired_access_implies_write: bool,
    pub delete_on_close: bool,
}

/// A file this connection currently has open.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub tree_id: u32,
    pub share_name: String,
    pub path: String,
    pub opened_for_write: bool,
    pub delete_on_close: bool,
}

/// All per-connection state the proxy needs to decide what cache action a
/// given message implies. One instance lives for the lifetime of a single
/// client TCP connection.
#[derive(Default)]
pub struct ConnectionState {
    pub tree_connect_requests: HashMap<u64, PendingTreeConnect>,
    pub connected_trees: HashMap<u32, ConnectedTree>,
    pub file_open_requests: HashMap<u64, PendingCreate>,
    pub open_files: HashMap<FileId, OpenFile>,
    pub session_latest_tree_connect_path: Option<String>,
    pub session_latest_create_request_filename: Option<String>,
}

impl ConnectionState {
    pub fn new() -> ConnectionState {
        ConnectionState::default()
    }

    /// `true` once every tracked open has been closed. The management
    /// socket's graceful `SHUTDOWN` waits on this per connection before
    /// tearing it down.
    pub fn is_drained(&self) -> bool {
        self.open_files.is_empty()
    }

    /// Resolves the tree id a compound message's file-id-bearing commands
    /// are scoped to, given the tree id carried in the SMB2 header.
    pub fn share_for_tree(&self, tree_id: u32) -> Option<&str> {
        self.connected_trees.get(&tree_id).map(|t| t.share_name.as_str())
    }
}
