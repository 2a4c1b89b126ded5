//! # Metrics
//!
//! Prometheus metrics for the vault-backed services and the HTTP client base.
//!
//! ## Metrics Exposed
//!
//! - `vault_services_cache_hits_total` - Lookups served from a read-through cache, by resource kind
//! - `vault_services_cache_misses_total` - Lookups that went to the vault, by resource kind
//! - `vault_services_fetch_errors_total` - Failed vault lookups, by resource kind
//! - `vault_services_provider_request_duration_seconds` - Key Vault REST call duration, by operation
//! - `vault_services_http_requests_total` - HTTP client base dispatches, by method and outcome
//! - `vault_services_logged_metric` - Last value recorded through `log_metric`, by name

use anyhow::Result;
use prometheus::{GaugeVec, HistogramVec, IntCounterVec, Registry};
use std::sync::{LazyLock, OnceLock};

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();

static CACHE_HITS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_services_cache_hits_total",
            "Total number of lookups served from a read-through cache",
        ),
        &["kind"],
    )
    .expect("Failed to create CACHE_HITS_TOTAL metric - this should never happen")
});

static CACHE_MISSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_services_cache_misses_total",
            "Total number of lookups that required a vault call",
        ),
        &["kind"],
    )
    .expect("Failed to create CACHE_MISSES_TOTAL metric - this should never happen")
});

static FETCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_services_fetch_errors_total",
            "Total number of failed vault lookups",
        ),
        &["kind"],
    )
    .expect("Failed to create FETCH_ERRORS_TOTAL metric - this should never happen")
});

static PROVIDER_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "vault_services_provider_request_duration_seconds",
            "Duration of Key Vault REST calls in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_REQUEST_DURATION metric - this should never happen")
});

static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_services_http_requests_total",
            "Total number of HTTP client base dispatches by outcome",
        ),
        &["method", "outcome"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric - this should never happen")
});

static LOGGED_METRIC: LazyLock<GaugeVec> = LazyLock::new(|| {
    GaugeVec::new(
        prometheus::Opts::new(
            "vault_services_logged_metric",
            "Last value recorded through log_metric",
        ),
        &["name"],
    )
    .expect("Failed to create LOGGED_METRIC metric - this should never happen")
});

/// Register all metrics with the shared registry
///
/// Safe to call more than once; only the first call registers.
///
/// # Errors
/// Returns an error if a metric fails to register
pub fn register_metrics() -> Result<()> {
    REGISTERED
        .get_or_init(|| register_all().map_err(|e| e.to_string()))
        .clone()
        .map_err(anyhow::Error::msg)
}

fn register_all() -> Result<()> {
    REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FETCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LOGGED_METRIC.clone()))?;
    Ok(())
}

/// Encode all registered metrics in the Prometheus text format
///
/// # Errors
/// Returns an error if encoding fails
pub fn encode_text() -> Result<String> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_cache_hits(kind: &str) {
    CACHE_HITS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_cache_misses(kind: &str) {
    CACHE_MISSES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_fetch_errors(kind: &str) {
    FETCH_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_provider_request_duration(operation: &str, duration: f64) {
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn record_http_request(method: &str, outcome: &str) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
}

/// Record a named value, the counterpart of a `LogMetric` line
pub fn log_metric(name: &str, value: f64) {
    LOGGED_METRIC.with_label_values(&[name]).set(value);
    tracing::info!(metric.name = name, metric.value = value, "Metric {name}: {value}");
}

/// Current hit count for a resource kind (used by tests)
#[must_use]
pub fn cache_hits(kind: &str) -> u64 {
    CACHE_HITS_TOTAL.with_label_values(&[kind]).get()
}
