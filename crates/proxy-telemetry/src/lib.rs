#![forbid(unsafe_code)]

//! Structured logging, in-process metrics and the optional audit trail for
//! the interception proxy.

mod audit;
mod logging;
mod metrics;
pub mod stats;

pub use audit::{AuditRecord, AuditSink, HttpAuditSink, NullAuditSink};
pub use logging::{init_logging, with_context};
pub use metrics::{ActionTimer, Metrics};
