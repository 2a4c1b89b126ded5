//! # Observability
//!
//! Prometheus metrics collection. Logging goes through `tracing`.

pub mod metrics;
