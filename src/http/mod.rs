//! # HTTP Client Base
//!
//! JSON request dispatcher used by service clients.
//!
//! Responses are typed: every response type embeds a [`ResponseStatus`] that
//! the dispatcher stamps with the HTTP status of the call. A non-success status
//! is not an error; it comes back as [`HttpOutcome::Failed`] carrying a default
//! response with status 500 and the underlying error message. Transport,
//! parsing and cancellation failures are returned as `Err`.

pub mod client;

pub use client::ServiceHttpClient;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Status stamped on every dispatched response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    #[serde(default)]
    pub status_code: u16,
    /// Reason phrase, or the error message of a soft failure
    #[serde(default)]
    pub status_message: String,
}

/// A response type the dispatcher can produce
///
/// `Default` supplies the value returned on a soft failure.
pub trait ServiceResponse: Default + DeserializeOwned + Send {
    fn status(&self) -> &ResponseStatus;

    fn status_mut(&mut self) -> &mut ResponseStatus;

    fn set_status(&mut self, status_code: u16, status_message: impl Into<String>)
    where
        Self: Sized,
    {
        let status = self.status_mut();
        status.status_code = status_code;
        status.status_message = status_message.into();
    }

    fn status_code(&self) -> u16 {
        self.status().status_code
    }

    fn status_message(&self) -> &str {
        &self.status().status_message
    }
}

/// Result of a dispatched call that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome<T> {
    /// Success status; the parsed body stamped with that status
    Completed(T),
    /// Non-success status; a default response stamped with 500 and the error message
    Failed(T),
}

impl<T> HttpOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, HttpOutcome::Completed(_))
    }

    pub fn response(&self) -> &T {
        match self {
            HttpOutcome::Completed(response) | HttpOutcome::Failed(response) => response,
        }
    }

    /// The response, whichever way the call went
    pub fn into_inner(self) -> T {
        match self {
            HttpOutcome::Completed(response) | HttpOutcome::Failed(response) => response,
        }
    }
}

/// Message of the innermost error in a `source()` chain
#[must_use]
pub fn base_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
