//! Prometheus metrics collection for slirc-dispatch.
//!
//! Tracks command throughput, latency and the outcome of every gate in the
//! invocation pipeline. Metrics are registered into a private registry;
//! embedders expose [`gather_metrics`] however they like.
//!
//! - `dispatch_command_total{command}` - Invocations that reached the body
//! - `dispatch_command_duration_seconds{command}` - Body latency histogram
//! - `dispatch_command_errors_total{command,kind}` - Failures by error code
//! - `dispatch_cooldown_denied_total{command}` - Cooldown denials
//! - `dispatch_concurrency_rejected_total{command}` - Concurrency rejections

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Events received by `dispatch`, addressed or not.
pub static EVENTS_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Invocations by command.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by command and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Cooldown denials by command.
pub static COOLDOWN_DENIED: OnceLock<IntCounterVec> = OnceLock::new();

/// Concurrency rejections by command.
pub static CONCURRENCY_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Failures raised inside error handlers themselves.
pub static HANDLER_FAILURES: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Command latency by command.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                let m = $init.expect(concat!(stringify!($metric), " creation failed"));
                if let Err(e) = r.register(Box::new(m.clone())) {
                    tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                }
                let _ = $metric.set(m);
            }
        };
    }

    register!(EVENTS_RECEIVED, IntCounter::new("dispatch_events_total", "Events received by the dispatcher"));
    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("dispatch_command_total", "Commands invoked by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("dispatch_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("dispatch_command_errors_total", "Command errors by name and kind"), &["command", "kind"]));
    register!(COOLDOWN_DENIED, IntCounterVec::new(Opts::new("dispatch_cooldown_denied_total", "Invocations denied by a cooldown"), &["command"]));
    register!(CONCURRENCY_REJECTED, IntCounterVec::new(Opts::new("dispatch_concurrency_rejected_total", "Invocations rejected by a concurrency limit"), &["command"]));
    register!(HANDLER_FAILURES, IntCounter::new("dispatch_error_handler_failures_total", "Failures raised inside error handlers"));
}

/// Gather all metrics and encode them in Prometheus text format.
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

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn get_counter(metric: &OnceLock<IntCounter>) -> Option<&IntCounter> {
    metric.get()
}

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

fn get_histogram_vec(metric: &OnceLock<HistogramVec>) -> Option<&HistogramVec> {
    metric.get()
}

/// Record an inbound event.
#[inline]
pub fn record_event() {
    if let Some(c) = get_counter(&EVENTS_RECEIVED) {
        c.inc();
    }
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = get_counter_vec(&COMMAND_COUNTER) {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = get_histogram_vec(&COMMAND_LATENCY) {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, kind: &str) {
    if let Some(c) = get_counter_vec(&COMMAND_ERRORS) {
        c.with_label_values(&[command, kind]).inc();
    }
}

/// Record a cooldown denial.
#[inline]
pub fn record_cooldown_denied(command: &str) {
    if let Some(c) = get_counter_vec(&COOLDOWN_DENIED) {
        c.with_label_values(&[command]).inc();
    }
}

/// Record a concurrency rejection.
#[inline]
pub fn record_concurrency_rejected(command: &str) {
    if let Some(c) = get_counter_vec(&CONCURRENCY_REJECTED) {
        c.with_label_values(&[command]).inc();
    }
}

/// Record a failure inside an error handler.
#[inline]
pub fn record_handler_failure() {
    if let Some(c) = get_counter(&HANDLER_FAILURES) {
        c.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();
        init();

        record_command("ping", 0.001);
        record_command_error("ping", "command_on_cooldown");
        record_cooldown_denied("ping");

        let output = gather_metrics();
        assert!(output.contains("dispatch_command_total"));
        assert!(output.contains("dispatch_command_errors_total"));
        assert!(output.contains("dispatch_cooldown_denied_total"));
    }
}
