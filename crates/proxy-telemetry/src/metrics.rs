//! In-process counters and timers, grounded on `statsd_logging.py`'s
//! `StatsClient` wrapper. The original shipped counters to a StatsD
//! daemon under a `<hostname>.smbproxy.<pid>` prefix; this crate keeps the
//! same metric names but accumulates them in memory so the management
//! socket's `STATS` command (see [`crate::stats`]) can report them without
//! a network dependency on a collector being reachable.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Default)]
struct Timer {
    count: u64,
    total_millis: u64,
}

/// A registry of named counters and timers. One instance is shared (behind
/// an `Arc`) across every connection task in the process.
#[derive(Default)]
pub struct Metrics {
    counters: RwLock<HashMap<String, u64>>,
    timers: RwLock<HashMap<String, Timer>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, n: u64) {
        let mut counters = self.counters.write().expect("metrics lock poisoned");
        *counters.entry(name.to_string()).or_insert(0) += n;
    }

    pub fn timing(&self, name: &str, elapsed: Duration) {
        let mut timers = self.timers.write().expect("metrics lock poisoned");
        let entry = timers.entry(name.to_string()).or_default();
        entry.count += 1;
        entry.total_millis += elapsed.as_millis() as u64;
    }

    /// Convenience for the `action.<TYPE>.*` family: bumps `started`,
    /// returns a guard that bumps `succeeded`/`failed` and records
    /// `duration` timing when dropped or finished explicitly.
    pub fn start_action<'a>(&'a self, action_type: &str) -> ActionTimer<'a> {
        self.incr(&format!("action.{action_type}.started"));
        ActionTimer {
            metrics: self,
            action_type: action_type.to_string(),
            start: std::time::Instant::now(),
            finished: false,
        }
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        let counters = self.counters.read().expect("metrics lock poisoned");
        let mut out = counters.clone();
        let timers = self.timers.read().expect("metrics lock poisoned");
        for (name, timer) in timers.iter() {
            out.insert(format!("{name}.count"), timer.count);
            let avg = if timer.count > 0 {
                timer.total_millis / timer.count
            } else {
                0
            };
            out.insert(format!("{name}.avg_ms"), avg);
        }
        out
    }
}

/// RAII guard produced by [`Metrics::start_action`]. Call [`Self::succeeded`]
/// or [`Self::failed`] when the outcome is known; dropping without calling
/// either records a failure, since an action that never reports its outcome
/// is indistinguishable from one that panicked mid-flight.
pub struct ActionTimer<'a> {
    metrics: &'a Metrics,
    action_type: String,
    start: std::time::Instant,
    finished: bool,
}

impl ActionTimer<'_> {
    pub fn succeeded(mut self) {
        self.finish("succeeded");
    }

    pub fn failed(mut self) {
        self.finish("failed");
    }

    fn finish(&mut self, outcome: &str) {
        self.finished = true;
        self.metrics
            .incr(&format!("action.{}.{outcome}", self.action_type));
        self.metrics.timing(
            &format!("action.{}.duration", self.action_type),
            self.start.elapsed(),
        );
    }
}

impl Drop for ActionTimer<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.metrics
                .incr(&format!("action.{}.failed", self.action_type));
            self.metrics.timing(
                &format!("action.{}.duration", self.action_type),
                self.start.elapsed(),
            );
        }
    }
}
