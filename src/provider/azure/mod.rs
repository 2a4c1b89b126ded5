//! # Azure Providers
//!
//! Azure Key Vault access through the Azure SDK.
//!
//! - `key_vault`: certificates, certificate downloads, secrets and keys
//! - `credential`: token credentials (static or managed identity)
//! - `models`: Key Vault response payloads

pub mod credential;
pub mod key_vault;
pub mod models;

// Re-export for convenience
pub use credential::{default_credential, StaticTokenCredential};
pub use key_vault::{default_retry_options, KeyVaultClient};
