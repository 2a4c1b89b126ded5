//! # Errors
//!
//! Error taxonomy shared by the configuration accessor, the vault-backed
//! services and the HTTP client base.

use std::fmt;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Kind of remote resource served through a read-through cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Certificate,
    Secret,
    Key,
}

impl ResourceKind {
    /// Lower-case name used in error messages and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Certificate => "certificate",
            ResourceKind::Secret => "secret",
            ResourceKind::Key => "key",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the services in this crate
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required identifier or configuration key was missing or blank
    #[error("Value cannot be null or empty. (Parameter '{0}')")]
    InvalidArgument(String),

    /// The vault had no value for the requested name
    #[error("Failed to retrieve {kind}: '{name}'. Code={status} Reason={reason}")]
    NotFound {
        kind: ResourceKind,
        name: String,
        status: u16,
        reason: String,
    },

    /// The vault returned a value whose content is structurally empty
    #[error("{0}")]
    EmptyPayload(String),

    /// A configuration value was not valid base64
    #[error("The input is not a valid Base-64 string: {0}")]
    Format(#[from] base64::DecodeError),

    /// The caller's cancellation token fired before the remote call completed
    #[error("The operation was canceled.")]
    Cancelled,

    /// Transport failure that is not soft-mapped by the HTTP client base
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be parsed
    #[error("Failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// The configuration source failed to produce a value
    #[error("Configuration error for '{key}': {message}")]
    Configuration { key: String, message: String },

    /// Any other provider failure (authentication, unexpected status, malformed payload)
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl ServiceError {
    /// Create an invalid argument error naming the offending parameter or key
    pub fn invalid_argument(parameter: impl Into<String>) -> Self {
        Self::InvalidArgument(parameter.into())
    }

    /// Create a configuration error
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not-found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Check if this error came from a cancelled token
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }
}

/// Returns `Err(InvalidArgument)` when `value` is empty or whitespace
///
/// # Errors
/// Returns [`ServiceError::InvalidArgument`] naming `parameter`.
pub fn require_non_blank<'a>(value: &'a str, parameter: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(ServiceError::invalid_argument(parameter))
    } else {
        Ok(value)
    }
}
