//! Prometheus metrics for slreq.
//!
//! - `slreq_command_total{command}` - Commands dispatched by name
//! - `slreq_command_duration_seconds{command}` - Command latency histogram
//! - `slreq_command_results_total{code}` - Command outcomes by result code
//! - `slreq_queue_mutations_total{op}` - Successful queue writes by operation
//! - `slreq_queued_entries` - Entries queued across all channels
//! - `slreq_sessions_swept_total` - Sessions removed by the sweeper

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();
pub static COMMAND_RESULTS: OnceLock<IntCounterVec> = OnceLock::new();
pub static QUEUE_MUTATIONS: OnceLock<IntCounterVec> = OnceLock::new();
pub static QUEUED_ENTRIES: OnceLock<IntGauge> = OnceLock::new();
pub static SESSIONS_SWEPT: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the registry. Repeat calls are no-ops.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(metric = stringify!($metric), error = %e, "Failed to register metric");
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(metric = stringify!($metric), error = %e, "Failed to create metric");
                }
            }
        };
    }

    if COMMAND_COUNTER.get().is_some() {
        return;
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("slreq_command_total", "Commands dispatched by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("slreq_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["command"]));
    register!(COMMAND_RESULTS, IntCounterVec::new(Opts::new("slreq_command_results_total", "Command outcomes by result code"), &["code"]));
    register!(QUEUE_MUTATIONS, IntCounterVec::new(Opts::new("slreq_queue_mutations_total", "Queue writes by operation"), &["op"]));
    register!(QUEUED_ENTRIES, IntGauge::new("slreq_queued_entries", "Entries queued across all channels"));
    register!(SESSIONS_SWEPT, IntCounter::new("slreq_sessions_swept_total", "Sessions removed by the sweeper"));
}

/// Gather all metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

#[inline]
pub fn record_result(code: &str) {
    if let Some(c) = COMMAND_RESULTS.get() {
        c.with_label_values(&[code]).inc();
    }
}

/// Record a persisted queue change and move the queued gauge by `delta`.
#[inline]
pub fn record_queue_mutation(op: &str, delta: i64) {
    if let Some(c) = QUEUE_MUTATIONS.get() {
        c.with_label_values(&[op]).inc();
    }
    if let Some(g) = QUEUED_ENTRIES.get() {
        g.add(delta);
    }
}

#[inline]
pub fn set_queued_entries(total: i64) {
    if let Some(g) = QUEUED_ENTRIES.get() {
        g.set(total);
    }
}

#[inline]
pub fn record_sessions_swept(count: usize) {
    if let Some(c) = SESSIONS_SWEPT.get() {
        c.inc_by(count as u64);
    }
}
