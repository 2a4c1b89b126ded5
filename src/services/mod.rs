//! # Vault Services
//!
//! Certificate, secret and key lookups with per-service read-through caches.

pub mod certificate;
pub mod key_vault;

pub use certificate::CertificateService;
pub use key_vault::KeyVaultService;

use crate::config::ServiceConfiguration;
use crate::error::Result;
use crate::provider::azure::KeyVaultClient;
use std::sync::Arc;
use tracing::info;

/// Both vault services over one shared Key Vault client
#[derive(Debug)]
pub struct VaultServices {
    pub certificates: CertificateService,
    pub key_vault: KeyVaultService,
}

impl VaultServices {
    /// Build both services against the vault named in configuration
    ///
    /// # Errors
    /// Returns an error if the vault URI is missing or the client cannot be created
    pub fn from_configuration(configuration: &ServiceConfiguration) -> Result<Self> {
        let client = Arc::new(KeyVaultClient::new(configuration)?);
        info!(vault_url = %client.vault_url(), "Vault services created");
        Ok(Self {
            certificates: CertificateService::new(Arc::clone(&client)),
            key_vault: KeyVaultService::new(client),
        })
    }
}
