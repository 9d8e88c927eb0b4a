//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the session coordinator records.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the session and the binary.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    torrents_tracked: IntGauge,
    session_commands_total: IntCounterVec,
    session_ticks_total: IntCounter,
    events_emitted_total: IntCounterVec,
    engine_failures_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Torrents currently tracked by the coordinator.
    pub torrents_tracked: i64,
    /// Refresh ticks completed.
    pub session_ticks_total: u64,
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let torrents_tracked = collector(
            "torrents_tracked",
            IntGauge::with_opts(Opts::new(
                "torrents_tracked",
                "Torrents tracked by the session coordinator",
            )),
        )?;
        let session_commands_total = collector(
            "session_commands_total",
            IntCounterVec::new(
                Opts::new(
                    "session_commands_total",
                    "Session commands handled by command and outcome",
                ),
                &["command", "outcome"],
            ),
        )?;
        let session_ticks_total = collector(
            "session_ticks_total",
            IntCounter::with_opts(Opts::new(
                "session_ticks_total",
                "Refresh ticks completed by the session coordinator",
            )),
        )?;
        let events_emitted_total = collector(
            "events_emitted_total",
            IntCounterVec::new(
                Opts::new("events_emitted_total", "Domain events emitted by type"),
                &["type"],
            ),
        )?;
        let engine_failures_total = collector(
            "engine_failures_total",
            IntCounterVec::new(
                Opts::new(
                    "engine_failures_total",
                    "Download engine calls that returned an error",
                ),
                &["operation"],
            ),
        )?;

        let register = |name: &'static str, boxed: Box<dyn prometheus::core::Collector>| {
            registry
                .register(boxed)
                .map_err(|source| TelemetryError::MetricsRegister { name, source })
        };
        register("torrents_tracked", Box::new(torrents_tracked.clone()))?;
        register(
            "session_commands_total",
            Box::new(session_commands_total.clone()),
        )?;
        register("session_ticks_total", Box::new(session_ticks_total.clone()))?;
        register("events_emitted_total", Box::new(events_emitted_total.clone()))?;
        register(
            "engine_failures_total",
            Box::new(engine_failures_total.clone()),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                torrents_tracked,
                session_commands_total,
                session_ticks_total,
                events_emitted_total,
                engine_failures_total,
            }),
        })
    }

    /// Set the tracked torrent gauge.
    pub fn set_torrents_tracked(&self, count: usize) {
        self.inner
            .torrents_tracked
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Count a handled session command.
    pub fn inc_command(&self, command: &str, outcome: &str) {
        self.inner
            .session_commands_total
            .with_label_values(&[command, outcome])
            .inc();
    }

    /// Count a completed refresh tick.
    pub fn inc_tick(&self) {
        self.inner.session_ticks_total.inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a failed engine call.
    pub fn inc_engine_failure(&self, operation: &str) {
        self.inner
            .engine_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Current value of `session_commands_total` for one label pair.
    #[must_use]
    pub fn command_count(&self, command: &str, outcome: &str) -> u64 {
        self.inner
            .session_commands_total
            .with_label_values(&[command, outcome])
            .get()
    }

    /// Current value of `engine_failures_total` for one operation.
    #[must_use]
    pub fn engine_failure_count(&self, operation: &str) -> u64 {
        self.inner
            .engine_failures_total
            .with_label_values(&[operation])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            torrents_tracked: self.inner.torrents_tracked.get(),
            session_ticks_total: self.inner.session_ticks_total.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.set_torrents_tracked(3);
        metrics.inc_tick();
        metrics.inc_tick();
        metrics.inc_command("add_magnet", "ok");
        metrics.inc_command("add_magnet", "ok");
        metrics.inc_command("toggle_want", "not_found");
        metrics.inc_event("torrent_added");
        metrics.inc_engine_failure("download_all");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.torrents_tracked, 3);
        assert_eq!(snapshot.session_ticks_total, 2);
        assert_eq!(metrics.command_count("add_magnet", "ok"), 2);
        assert_eq!(metrics.command_count("toggle_want", "not_found"), 1);
        assert_eq!(metrics.engine_failure_count("download_all"), 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("session_commands_total"));
        assert!(rendered.contains("events_emitted_total"));
        assert!(rendered.contains("engine_failures_total"));
        Ok(())
    }

    #[test]
    fn snapshot_serializes_for_status_output() -> Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot()).expect("serialize snapshot");
        assert_eq!(value["torrents_tracked"], 0);
        assert_eq!(value["session_ticks_total"], 0);
        Ok(())
    }
}
