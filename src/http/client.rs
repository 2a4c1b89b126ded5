//! # Service HTTP Client
//!
//! Resolves request URLs against a base address fixed at construction and
//! dispatches JSON requests with `reqwest`.
//!
//! ## Base URL
//!
//! 1. An absolute `http(s)://` base is used as given.
//! 2. Otherwise the base is `https://localhost/` in the `Local` environment, or
//!    the configured `ServiceAddress` elsewhere.
//! 3. A relative base is then appended to that as a path suffix.
//!
//! ## Per-call paths
//!
//! Absolute paths bypass the base. Relative paths lose one leading `/` and are
//! concatenated onto the base with no separator added, so a base meant to take
//! child paths should end in `/`.

use super::{base_message, HttpOutcome, ServiceResponse};
use crate::config::ServiceConfiguration;
use crate::constants::{LOCAL_BASE_URL, SERVICE_ADDRESS_KEY, SERVICE_URL_KEY};
use crate::error::{Result, ServiceError};
use crate::observability::metrics;
use anyhow::Context;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Serialize;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)",
    )
    .expect("Failed to compile ABSOLUTE_URL pattern - this should never happen")
});

/// True when `value` is an absolute `http://` or `https://` URL
#[must_use]
pub fn is_absolute_url(value: &str) -> bool {
    ABSOLUTE_URL.is_match(value)
}

/// JSON HTTP client with a fixed base URL
#[derive(Clone)]
pub struct ServiceHttpClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for ServiceHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ServiceHttpClient {
    /// Create a client whose base comes from the `ServiceUrl` setting
    ///
    /// # Errors
    /// Returns an error if configuration cannot be read or the HTTP client cannot be built
    pub fn new(configuration: &ServiceConfiguration) -> Result<Self> {
        let service_url = configuration.get_value(SERVICE_URL_KEY)?;
        Self::with_base_url(configuration, service_url.as_deref())
    }

    /// Create a client with an explicit base URL or path suffix
    ///
    /// # Errors
    /// Returns an error if configuration cannot be read or the HTTP client cannot be built
    pub fn with_base_url(
        configuration: &ServiceConfiguration,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Self::with_client(client, configuration, base_url)
    }

    /// Create a client around an existing `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if configuration cannot be read
    pub fn with_client(
        client: Client,
        configuration: &ServiceConfiguration,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let base_url = resolve_base_url(configuration, base_url)?;
        debug!(base_url = %base_url, "HTTP client base URL resolved");
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}{path}", self.base_url)
    }

    /// Send a GET request
    ///
    /// # Errors
    /// Returns an error for transport failures, unparseable bodies and cancellation.
    /// A non-success status is returned as [`HttpOutcome::Failed`].
    pub async fn get<TResponse>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpOutcome<TResponse>>
    where
        TResponse: ServiceResponse,
    {
        self.send(Method::GET, path, None, cancel).await
    }

    /// Send a POST request with a JSON body
    ///
    /// # Errors
    /// Returns an error for serialization or transport failures, unparseable bodies and
    /// cancellation. A non-success status is returned as [`HttpOutcome::Failed`].
    pub async fn post<TRequest, TResponse>(
        &self,
        body: &TRequest,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpOutcome<TResponse>>
    where
        TRequest: Serialize + ?Sized,
        TResponse: ServiceResponse,
    {
        let payload = serde_json::to_vec(body)
            .inspect_err(|e| error!(path, error = %e, "Failed to serialize request body"))?;
        self.send(Method::POST, path, Some(payload), cancel).await
    }

    async fn send<TResponse>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<HttpOutcome<TResponse>>
    where
        TResponse: ServiceResponse,
    {
        let url = self.resolve_url(path);
        let method_label = method.as_str().to_string();
        let span = info_span!(
            "http.request",
            http.method = method_label.as_str(),
            http.url = url.as_str()
        );

        let result = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ServiceError::Cancelled),
                outcome = self.dispatch::<TResponse>(method, &url, body) => outcome,
            }
        }
        .instrument(span)
        .await;

        match &result {
            Ok(outcome) if outcome.is_success() => {
                metrics::record_http_request(&method_label, "completed");
            }
            Ok(_) => metrics::record_http_request(&method_label, "failed"),
            Err(e) => {
                error!(url = %url, error = %e, "HTTP request failed");
                metrics::record_http_request(&method_label, "error");
            }
        }
        result
    }

    async fn dispatch<TResponse>(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpOutcome<TResponse>>
    where
        TResponse: ServiceResponse,
    {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default();
        info!(
            uri = %response.url(),
            status = status.as_u16(),
            reason,
            "Response received"
        );

        if let Err(status_error) = response.error_for_status_ref() {
            let message = base_message(&status_error);
            error!(status = status.as_u16(), error = %message, "Request returned a failure status");
            let mut failed = TResponse::default();
            failed.set_status(500, message);
            return Ok(HttpOutcome::Failed(failed));
        }

        let content = response.text().await?;
        let mut parsed = if content.trim().is_empty() {
            TResponse::default()
        } else {
            serde_json::from_str(&content)?
        };
        parsed.set_status(status.as_u16(), reason);
        Ok(HttpOutcome::Completed(parsed))
    }
}

fn resolve_base_url(configuration: &ServiceConfiguration, base_url: Option<&str>) -> Result<String> {
    let base_url = base_url.map(str::trim).filter(|url| !url.is_empty());

    if let Some(url) = base_url.filter(|url| is_absolute_url(url)) {
        return Ok(url.to_string());
    }

    let origin = if configuration.environment().is_local() {
        LOCAL_BASE_URL.to_string()
    } else {
        configuration
            .get_value(SERVICE_ADDRESS_KEY)?
            .unwrap_or_default()
    };

    Ok(match base_url {
        Some(suffix) => format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        ),
        None => origin,
    })
}
