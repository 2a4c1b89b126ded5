//! # Provider Modules
//!
//! Remote vault access. A provider resolves a named resource (optionally at a
//! specific version) and reports either the value or the raw status of the
//! call that failed to produce one.
//!
//! The read-through caches in [`crate::cache`] only depend on
//! [`ResourceFetcher`], so tests can substitute counting fakes for the
//! Key Vault REST client in [`azure`].

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Status line of the remote call behind a [`FetchResponse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
}

impl RawResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// `200 OK`
    #[must_use]
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// `404 Not Found`
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }
}

/// Outcome of a single fetch: a value, or `None` with the raw status explaining why not
#[derive(Debug, Clone)]
pub struct FetchResponse<T> {
    pub value: Option<T>,
    pub raw: RawResponse,
}

impl<T> FetchResponse<T> {
    /// A successful fetch carrying `value`
    pub fn found(value: T) -> Self {
        Self {
            value: Some(value),
            raw: RawResponse::ok(),
        }
    }

    /// A fetch that produced no value
    pub fn missing(raw: RawResponse) -> Self {
        Self { value: None, raw }
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// Remote resource fetcher for a single resource type
///
/// Implementations must honour `cancel` for long-running calls; the cache
/// also races every fetch against the token.
#[async_trait]
pub trait ResourceFetcher<T>: Send + Sync {
    /// Fetch `name` at `version` (latest when `None`)
    async fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<T>>;
}

// Provider implementations
pub mod azure;
