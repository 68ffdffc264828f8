//! JSON-per-line structured logging.
//!
//! Grounded on `logger.py`'s `structlog` JSON renderer: every record carries
//! a fixed set of context keys (`connection_id`, `peer`, `action_id`,
//! `action_type`, `share_name`, `path`, `http_request_id`) alongside the
//! usual level/target/message, so log aggregation can filter and join on
//! them without parsing free-form text.

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::{json, Map, Value};
use std::sync::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

thread_local! {
    static CONTEXT: std::cell::RefCell<Map<String, Value>> = std::cell::RefCell::new(Map::new());
}

/// Installs `level` context fields for the current thread for the duration
/// of `f`, restoring whatever was set before on return. Proxy connection
/// tasks call this once per packet so every log line emitted while handling
/// it is automatically tagged.
pub fn with_context<F, R>(fields: &[(&str, Value)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = CONTEXT.with(|c| {
        let mut c = c.borrow_mut();
        let previous = c.clone();
        for (k, v) in fields {
            c.insert((*k).to_string(), v.clone());
        }
        previous
    });
    let result = f();
    CONTEXT.with(|c| *c.borrow_mut() = previous);
    result
}

struct JsonLogger {
    min_level: LevelFilter,
    writer: Mutex<Box<dyn std::io::Write + Send>>,
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut fields = CONTEXT.with(|c| c.borrow().clone());
        fields.insert("level".into(), json!(level_name(record.level())));
        fields.insert("target".into(), json!(record.target()));
        fields.insert("message".into(), json!(record.args().to_string()));
        fields.insert(
            "timestamp".into(),
            json!(OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default()),
        );

        let line = Value::Object(fields).to_string();
        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

/// Installs the JSON logger as the global `log` backend, writing to stderr.
/// Call once at process startup.
pub fn init_logging(min_level: LevelFilter) {
    let logger = JsonLogger {
        min_level,
        writer: Mutex::new(Box::new(std::io::stderr())),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(min_level);
    }
}
