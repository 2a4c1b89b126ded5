//! # Read-Through Cache
//!
//! In-memory, name-keyed cache in front of a [`ResourceFetcher`].
//!
//! Entries are created on the first successful fetch and live as long as the
//! cache. There is no eviction, expiry or refresh.
//!
//! ## Keying
//!
//! The key is the resource name only. The first version resolved for a name is
//! returned for every later lookup of that name, whatever version the caller
//! asks for.
//!
//! ## Concurrency
//!
//! Storage is a [`DashMap`]. Concurrent cold lookups of the same name may all
//! reach the fetcher; inserts are add-if-absent, so every caller gets the value
//! that won the race. No map guard is held across an `.await`.

use crate::error::{require_non_blank, ResourceKind, Result, ServiceError};
use crate::observability::metrics;
use crate::provider::ResourceFetcher;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

/// A value that can live in a [`NamedResourceCache`]
pub trait CacheableResource: Clone + Send + Sync + 'static {
    /// Resource kind used in error messages and metric labels
    const KIND: ResourceKind;

    /// True when the fetched value has no usable content
    fn is_empty_payload(&self) -> bool {
        false
    }

    /// Message of the [`ServiceError::EmptyPayload`] raised for an empty value
    fn empty_payload_message() -> &'static str {
        "Resource contents are empty."
    }

    /// Structural validation run once, before the value is cached
    ///
    /// # Errors
    /// Returns an error when the payload cannot be used
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Name-keyed read-through cache
pub struct NamedResourceCache<T> {
    entries: DashMap<String, T>,
    parameter: &'static str,
}

impl<T> std::fmt::Debug for NamedResourceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedResourceCache")
            .field("parameter", &self.parameter)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<T: CacheableResource> Default for NamedResourceCache<T> {
    fn default() -> Self {
        Self::new("name")
    }
}

impl<T: CacheableResource> NamedResourceCache<T> {
    /// Create an empty cache
    ///
    /// `parameter` names the identifier in [`ServiceError::InvalidArgument`]
    /// when a lookup is made with a blank name.
    #[must_use]
    pub fn new(parameter: &'static str) -> Self {
        Self {
            entries: DashMap::new(),
            parameter,
        }
    }

    /// Cached value for `name`, if any
    #[must_use]
    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    /// Insert `value` unless `name` is already cached; returns the value held by the cache
    pub fn insert_if_absent(&self, name: &str, value: T) -> T {
        self.entries
            .entry(name.to_string())
            .or_insert(value)
            .value()
            .clone()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value for `name`, fetching and caching it on a miss
    ///
    /// `version` is only forwarded to the fetcher on a miss; it plays no part
    /// in the lookup.
    ///
    /// # Errors
    /// - [`ServiceError::InvalidArgument`] when `name` is blank (the fetcher is not called)
    /// - [`ServiceError::NotFound`] when the fetcher returns no value
    /// - [`ServiceError::EmptyPayload`] when the value has no content
    /// - [`ServiceError::Cancelled`] when `cancel` fires before the fetch completes
    /// - any error returned by the fetcher or by [`CacheableResource::validate`]
    pub async fn get_or_fetch<F>(
        &self,
        fetcher: &F,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        F: ResourceFetcher<T> + ?Sized,
    {
        require_non_blank(name, self.parameter)?;
        let kind = T::KIND.as_str();

        if let Some(value) = self.get(name) {
            debug!(kind, name, "Cache hit");
            metrics::increment_cache_hits(kind);
            return Ok(value);
        }

        metrics::increment_cache_misses(kind);
        let span = debug_span!("cache.fetch", kind, name, version = version.unwrap_or("latest"));

        let response = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ServiceError::Cancelled),
                response = fetcher.fetch(name, version, cancel) => response,
            }
        }
        .instrument(span)
        .await
        .inspect_err(|_| metrics::increment_fetch_errors(kind))?;

        let Some(value) = response.value else {
            metrics::increment_fetch_errors(kind);
            return Err(ServiceError::NotFound {
                kind: T::KIND,
                name: name.to_string(),
                status: response.raw.status,
                reason: response.raw.reason,
            });
        };

        if value.is_empty_payload() {
            metrics::increment_fetch_errors(kind);
            return Err(ServiceError::EmptyPayload(
                T::empty_payload_message().to_string(),
            ));
        }
        value
            .validate()
            .inspect_err(|_| metrics::increment_fetch_errors(kind))?;

        Ok(self.insert_if_absent(name, value))
    }
}
