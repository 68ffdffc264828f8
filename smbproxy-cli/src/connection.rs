//! The per-connection proxy loop: reads Direct-TCP frames from the client,
//! inspects the handful of commands the proxy cares about, runs whatever
//! cache action that implies, and only then forwards the original bytes
//! unchanged to the backend -- and the mirror image for responses flowing
//! back. The proxy never re-serializes an SMB2 message; it reads for
//! understanding, not for rewriting.
//!
//! Grounded on `smbproxy4.py`'s per-connection `Protocol` class, translated
//! from Twisted's deferred chains to a plain async task per connection
//! (MS-SMB2's request/response framing maps naturally onto `tokio::io`).
//! The hold-until-resolved ordering guarantee (MS-SMB2 framing aside, this
//! is the proxy's own invariant) falls out for free: the handlers below are
//! awaited before the raw bytes are written to their destination.

use crate::management::ShutdownFlag;
use crate::state::{ConnectionState, ConnectedTree, OpenFile, PendingCreate, PendingTreeConnect};
use proxy_cache::{apply_force_host, is_excluded_share, CacheClient};
use proxy_dtyp::FileId;
use proxy_telemetry::{AuditRecord, AuditSink, Metrics};
use proxy_wire::{read_frame_header, walk_compound_chain, Body};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// `tid == 0xFFFFFFFF` in a compound chain means "reuse the tree connected
/// earlier in this chain" (MS-SMB2 3.3.5.2.11).
const COMPOUND_TREE_ID_SENTINEL: u32 = u32::MAX;

pub struct ConnectionContext {
    pub cache: Arc<CacheClient>,
    pub shares_root: PathBuf,
    pub force_host: Option<String>,
    pub shutdown: ShutdownFlag,
    pub metrics: Arc<Metrics>,
    pub audit: Arc<dyn AuditSink>,
}

/// Per-connection identity threaded into every audit record this
/// connection's actions produce.
struct Identity<'a> {
    connection_id: &'a str,
    peer: &'a str,
}

fn audit(ctx: &ConnectionContext, id: &Identity, action_type: &str, share_name: Option<&str>, path: Option<&str>, succeeded: bool) {
    ctx.audit.record(AuditRecord {
        connection_id: id.connection_id.to_string(),
        peer: id.peer.to_string(),
        action_id: uuid::Uuid::new_v4().to_string(),
        action_type: action_type.to_string(),
        share_name: share_name.map(str::to_string),
        path: path.map(str::to_string),
        http_request_id: None,
        succeeded,
    });
}

/// Runs one client connection to completion: proxies bytes in both
/// directions, inspecting and reacting to the five intercepted commands
/// along the way. Returns once either side closes the connection.
pub async fn handle(
    connection_id: String,
    peer: String,
    mut client: TcpStream,
    mut backend: TcpStream,
    ctx: Arc<ConnectionContext>,
) -> std::io::Result<()> {
    log::info!(target: "smbproxy::connection", "accepted connection {connection_id} from {peer}");
    let id = Identity {
        connection_id: &connection_id,
        peer: &peer,
    };
    let mut state = ConnectionState::new();
    let (mut client_rd, mut client_wr) = client.split();
    let (mut backend_rd, mut backend_wr) = backend.split();

    loop {
        tokio::select! {
            frame = read_one_frame(&mut client_rd) => {
                let Some(frame) = frame? else { break };
                handle_client_frame(&frame, &mut state, &ctx, &id).await;
                backend_wr.write_all(&frame).await?;
            }
            frame = read_one_frame(&mut backend_rd) => {
                let Some(frame) = frame? else { break };
                handle_backend_frame(&frame, &mut state).await;
                client_wr.write_all(&frame).await?;
            }
        }

        if ctx.shutdown.is_requested() && state.is_drained() {
            break;
        }
    }

    Ok(())
}

/// Reads one complete Direct-TCP frame (header + payload) off `reader`.
/// Returns `Ok(None)` on a clean EOF before any bytes of a new frame.
async fn read_one_frame<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = read_frame_header(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        .unwrap_or(0);

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&body);
    Ok(Some(frame))
}

/// Resolves the share a message's `tid` refers to, following the
/// compound-chain "reuse the tree connected earlier in this chain" sentinel.
fn resolve_share(tid: u32, state: &ConnectionState) -> Option<String> {
    if tid == COMPOUND_TREE_ID_SENTINEL {
        state.session_latest_tree_connect_path.clone()
    } else {
        state.share_for_tree(tid).map(str::to_string)
    }
}

/// Resolves the `(share, path)` a file id refers to, following the
/// compound-chain "reuse the file opened earlier in this chain" sentinel
/// for a CREATE whose response hasn't arrived yet within the same chain.
fn resolve_open(file_id: FileId, state: &ConnectionState) -> Option<(String, String)> {
    if file_id == FileId::FULL {
        let share = state.session_latest_tree_connect_path.clone()?;
        let path = state.session_latest_create_request_filename.clone()?;
        Some((share, path))
    } else {
        state
            .open_files
            .get(&file_id)
            .map(|o| (o.share_name.clone(), o.path.clone()))
    }
}

async fn handle_client_frame(
    frame: &[u8],
    state: &mut ConnectionState,
    ctx: &ConnectionContext,
    id: &Identity<'_>,
) {
    if frame.len() < 8 || &frame[4..8] == b"\xffSMB" {
        return;
    }
    let payload = &frame[4..];

    for msg in walk_compound_chain(payload) {
        let header = msg.header;
        let body = Body::decode(&header, msg.body);

        match body {
            Body::TreeConnectRequest(req) => {
                let share_name = apply_force_host(&req.path, ctx.force_host.as_deref());
                state.session_latest_tree_connect_path = Some(share_name.clone());
                state
                    .tree_connect_requests
                    .insert(header.message_id, PendingTreeConnect { share_name });
            }
            Body::CreateRequest(req) => {
                state.session_latest_create_request_filename = Some(req.name.clone());

                if let Some(share_name) = resolve_share(header.tree_id, state) {
                    if !is_excluded_share(&share_name) {
                        let local_path = local_path_for(&ctx.shares_root, &share_name, &req.name);

                        let timer = ctx.metrics.start_action("sync");
                        let result = ctx.cache.sync(&share_name, &req.name, &local_path, false).await;
                        audit(ctx, id, "sync", Some(&share_name), Some(&req.name), result.is_ok());
                        if result.is_ok() { timer.succeeded(); } else { timer.failed(); }

                        if req.desired_access.implies_write() {
                            let timer = ctx.metrics.start_action("touch");
                            let result = ctx.cache.touch(&share_name, &req.name).await;
                            audit(ctx, id, "touch", Some(&share_name), Some(&req.name), result.is_ok());
                            if result.is_ok() { timer.succeeded(); } else { timer.failed(); }
                        }
                    }
                }

                state.file_open_requests.insert(
                    header.message_id,
                    PendingCreate {
                        tree_id: header.tree_id,
                        name: req.name,
                        desired_access_implies_write: req.desired_access.implies_write(),
                        delete_on_close: req.delete_on_close,
                    },
                );
            }
            Body::QueryDirectoryRequest(req) => {
                if let Some((share_name, path)) = resolve_open(req.file_id, state) {
                    let local_dir = local_path_for(&ctx.shares_root, &share_name, &path);
                    let timer = ctx.metrics.start_action("list_dir");
                    let result = ctx.cache.list_dir(&share_name, &path, &local_dir, false).await;
                    audit(ctx, id, "list_dir", Some(&share_name), Some(&path), result.is_ok());
                    if result.is_ok() { timer.succeeded(); } else { timer.failed(); }
                }
            }
            Body::SetInfoRequest(req) => {
                if let Some(delete_pending) = req.delete_pending {
                    if let Some(open) = state.open_files.get_mut(&req.file_id) {
                        open.delete_on_close = delete_pending;
                    }
                }
            }
            Body::CloseRequest(req) => {
                if let Some(open) = state.open_files.remove(&req.file_id) {
                    finalize_close(open, ctx, id).await;
                }
            }
            _ => {}
        }
    }
}

async fn handle_backend_frame(frame: &[u8], state: &mut ConnectionState) {
    if frame.len() < 8 {
        return;
    }
    let payload = &frame[4..];

    for msg in walk_compound_chain(payload) {
        let header = msg.header;
        let body = Body::decode(&header, msg.body);

        match body {
            Body::TreeConnectResponse(_resp) => {
                if let Some(pending) = state.tree_connect_requests.remove(&header.message_id) {
                    if header.is_success() {
                        state.connected_trees.insert(
                            header.tree_id,
                            ConnectedTree {
                                share_name: pending.share_name,
                            },
                        );
                    }
                }
            }
            Body::CreateResponse(resp) => {
                if let Some(pending) = state.file_open_requests.remove(&header.message_id) {
                    if header.is_success() {
                        if let Some(share_name) = resolve_share(pending.tree_id, state) {
                            state.open_files.insert(
                                resp.file_id,
                                OpenFile {
                                    tree_id: pending.tree_id,
                                    share_name,
                                    path: pending.name,
                                    opened_for_write: pending.desired_access_implies_write,
                                    delete_on_close: pending.delete_on_close,
                                },
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

async fn finalize_close(open: OpenFile, ctx: &ConnectionContext, id: &Identity<'_>) {
    if !ctx.cache.write_through_enabled() {
        return;
    }

    let local_path = local_path_for(&ctx.shares_root, &open.share_name, &open.path);

    if open.opened_for_write {
        let timer = ctx.metrics.start_action("sync_back");
        let result = ctx.cache.sync_back(&open.share_name, &open.path, &local_path).await;
        audit(ctx, id, "sync_back", Some(&open.share_name), Some(&open.path), result.is_ok());
        if result.is_ok() { timer.succeeded(); } else { timer.failed(); }
    }
    if open.delete_on_close {
        let timer = ctx.metrics.start_action("delete");
        let result = ctx.cache.delete(&open.share_name, &open.path, &local_path).await;
        audit(ctx, id, "delete", Some(&open.share_name), Some(&open.path), result.is_ok());
        if result.is_ok() { timer.succeeded(); } else { timer.failed(); }
    }
}

/// Resolves `path` under the local share directory, preferring the case of
/// an already-existing entry over the client-supplied casing for every
/// segment (MS-SMB2 paths are case-insensitive; the remote filesystem is
/// usually case-preserving, so a second client touching the same file with
/// different casing must still land on the one local file already there).
/// Segments with no existing match keep the client's casing.
fn local_path_for(shares_root: &std::path::Path, share_name: &str, path: &str) -> PathBuf {
    let share_component = share_name.trim_start_matches('\\').replace('\\', "_");
    let mut resolved = shares_root.join(share_component);

    for segment in path.split('\\').filter(|s| !s.is_empty()) {
        resolved.push(case_insensitive_match(&resolved, segment));
    }

    resolved
}

/// Looks for an entry under `dir` matching `segment` case-insensitively;
/// falls back to `segment` verbatim if `dir` doesn't exist or has no match.
fn case_insensitive_match(dir: &std::path::Path, segment: &str) -> String {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return segment.to_string();
    };
    for entry in entries.flatten() {
        if let Some(name) = entry.file_name().to_str() {
            if name.eq_ignore_ascii_case(segment) {
                return name.to_string();
            }
        }
    }
    segment.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("smbproxy-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn local_path_for_creates_no_directories_itself() {
        let root = scratch_dir();
        let resolved = local_path_for(&root, r"\\HOST\SHARE", r"foo\bar.txt");
        assert_eq!(resolved, root.join("HOST_SHARE").join("foo").join("bar.txt"));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn local_path_for_prefers_existing_case() {
        let root = scratch_dir();
        let share_dir = root.join("HOST_SHARE");
        std::fs::create_dir_all(share_dir.join("Assets").join("Textures")).unwrap();

        let resolved = local_path_for(&root, r"\\HOST\SHARE", r"ASSETS\textures\Foo.png");

        assert_eq!(resolved, share_dir.join("Assets").join("Textures").join("Foo.png"));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn case_insensitive_match_falls_back_to_client_casing_when_absent() {
        let root = scratch_dir();
        assert_eq!(case_insensitive_match(&root, "NewFile.txt"), "NewFile.txt");
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn resolve_share_follows_compound_sentinel() {
        let mut state = ConnectionState::new();
        state.session_latest_tree_connect_path = Some(r"\\HOST\SHARE".to_string());
        assert_eq!(
            resolve_share(COMPOUND_TREE_ID_SENTINEL, &state),
            Some(r"\\HOST\SHARE".to_string())
        );
        assert_eq!(resolve_share(42, &state), None);
    }

    #[test]
    fn resolve_open_follows_compound_sentinel() {
        let mut state = ConnectionState::new();
        state.session_latest_tree_connect_path = Some(r"\\HOST\SHARE".to_string());
        state.session_latest_create_request_filename = Some(r"foo\bar.txt".to_string());
        assert_eq!(
            resolve_open(FileId::FULL, &state),
            Some((r"\\HOST\SHARE".to_string(), r"foo\bar.txt".to_string()))
        );
    }
}
