//! Optional external audit trail.
//!
//! Grounded on `audit_logger.py`, which inserted one row per filesystem
//! operation into a `File_operations` Postgres table and deliberately
//! swallowed every failure so a flaky audit database could never take the
//! proxy itself down. This crate keeps that guarantee but reports through
//! the same HTTP connector the rest of the proxy already uses to talk to
//! backend services, rather than carrying a separate database driver for a
//! single write path (see DESIGN.md).

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub connection_id: String,
    pub peer: String,
    pub action_id: String,
    pub action_type: String,
    pub share_name: Option<String>,
    pub path: Option<String>,
    pub http_request_id: Option<String>,
    pub succeeded: bool,
}

/// Sink for [`AuditRecord`]s. Implementations must never propagate errors
/// to the caller; audit logging is best-effort.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Discards every record. Used when `ENABLE_AUDIT_LOG` is false.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) {}
}

/// Posts each record to an HTTP audit endpoint, fire-and-forget.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuditSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("building the audit HTTP client must not fail");
        HttpAuditSink {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl AuditSink for HttpAuditSink {
    fn record(&self, record: AuditRecord) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&record).send().await {
                log::warn!(target: "proxy_telemetry::audit", "audit write failed, dropping record: {e}");
            }
        });
    }
}
