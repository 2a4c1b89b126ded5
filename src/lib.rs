//! Vault Services Library
//!
//! Cached Azure Key Vault certificate, secret and key services, a layered
//! configuration accessor and a JSON HTTP client base.
//! Tests are included in the module files and under `tests/`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod models;
pub mod observability;
pub mod provider;
pub mod server;
pub mod services;

pub use error::{ResourceKind, Result, ServiceError};
