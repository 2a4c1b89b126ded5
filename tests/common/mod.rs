//! Common test utilities
//!
//! Provides shared initialization code and fixtures for the integration tests,
//! including rustls crypto provider setup.
#![allow(dead_code, reason = "each test binary uses a subset of these helpers")]

use std::sync::{Arc, Once};
use vault_services::config::{Environment, MemoryConfigSource, ServiceConfiguration};
use vault_services::constants::CERTIFICATE_THUMBPRINT_KEY;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Must run before any reqwest client is created; the Pact mock server
        // may already have installed a process-wide provider
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        }
    });
}

/// DER of a freshly generated self-signed certificate for `host`
pub fn self_signed_der(host: &str) -> Vec<u8> {
    rcgen::generate_simple_self_signed(vec![host.to_string()])
        .expect("Failed to generate self-signed certificate")
        .cert
        .der()
        .to_vec()
}

/// Configuration with the thumbprint key set plus `pairs`
pub fn configuration(environment: Environment, pairs: &[(&str, &str)]) -> ServiceConfiguration {
    let source = MemoryConfigSource::from_pairs(
        std::iter::once((CERTIFICATE_THUMBPRINT_KEY, "0123456789ABCDEF"))
            .chain(pairs.iter().copied()),
    );
    ServiceConfiguration::with_environment(Arc::new(source), environment)
        .expect("Failed to build configuration")
}
