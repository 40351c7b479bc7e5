use crate::adapters::LockKind;
use anyhow::{anyhow, Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{HistogramOpts, HistogramTimer, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static LOCK_ACTUATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static LOCK_ADAPTER_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static LOCK_AUDIT_WRITE_FAILURES_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static LOCK_DB_QUERY_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Install the HTTP metrics recorder and register the domain metrics.
/// Recording functions are no-ops until this has run.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow!("metrics already initialized"))?;

    let registry = Registry::new();

    let actuations = IntCounterVec::new(
        Opts::new(
            "lock_actuations_total",
            "Actuation attempts by action and outcome",
        ),
        &["action", "outcome"],
    )?;
    let adapter_attempts = IntCounterVec::new(
        Opts::new(
            "lock_adapter_attempts_total",
            "Device request attempts by lock kind and result",
        ),
        &["kind", "result"],
    )?;
    let audit_failures = IntCounter::new(
        "lock_audit_write_failures_total",
        "Audit rows that could not be written",
    )?;
    let db_duration = HistogramVec::new(
        HistogramOpts::new(
            "lock_db_query_duration_seconds",
            "Database query duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["query"],
    )?;

    registry.register(Box::new(actuations.clone()))?;
    registry.register(Box::new(adapter_attempts.clone()))?;
    registry.register(Box::new(audit_failures.clone()))?;
    registry.register(Box::new(db_duration.clone()))?;

    PROMETHEUS_REGISTRY
        .set(registry)
        .map_err(|_| anyhow!("prometheus registry already set"))?;
    // The registry above was set only once, so these are set only once too.
    let _ = LOCK_ACTUATIONS_TOTAL.set(actuations);
    let _ = LOCK_ADAPTER_ATTEMPTS_TOTAL.set(adapter_attempts);
    let _ = LOCK_AUDIT_WRITE_FAILURES_TOTAL.set(audit_failures);
    let _ = LOCK_DB_QUERY_DURATION.set(db_duration);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Count one actuation or status query by its terminal outcome.
pub fn record_actuation(action: &str, outcome: &str) {
    if let Some(counter) = LOCK_ACTUATIONS_TOTAL.get() {
        counter.with_label_values(&[action, outcome]).inc();
    }
}

/// Count one device request attempt; `result` is `response` or `no_response`.
pub fn record_adapter_attempt(kind: LockKind, result: &str) {
    if let Some(counter) = LOCK_ADAPTER_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[kind.as_str(), result]).inc();
    }
}

pub fn record_audit_write_failure() {
    if let Some(counter) = LOCK_AUDIT_WRITE_FAILURES_TOTAL.get() {
        counter.inc();
    }
}

/// Start a query timer; it observes when dropped.
pub fn db_timer(query: &str) -> Option<HistogramTimer> {
    LOCK_DB_QUERY_DURATION
        .get()
        .map(|histogram| histogram.with_label_values(&[query]).start_timer())
}
