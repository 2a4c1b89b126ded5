//! # Key Vault Service
//!
//! Cached access to vault secrets and keys, each cached by name only.

use crate::cache::NamedResourceCache;
use crate::config::ServiceConfiguration;
use crate::error::Result;
use crate::models::{VaultKey, VaultSecret};
use crate::provider::azure::KeyVaultClient;
use crate::provider::ResourceFetcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE: &str = "KeyVaultService";

/// Read-through secret and key caches over a vault fetcher
pub struct KeyVaultService {
    secrets: Arc<dyn ResourceFetcher<VaultSecret>>,
    keys: Arc<dyn ResourceFetcher<VaultKey>>,
    secret_cache: NamedResourceCache<VaultSecret>,
    key_cache: NamedResourceCache<VaultKey>,
}

impl std::fmt::Debug for KeyVaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultService")
            .field("secret_cache", &self.secret_cache)
            .field("key_cache", &self.key_cache)
            .finish_non_exhaustive()
    }
}

impl KeyVaultService {
    /// Create a service over one fetcher serving both secrets and keys
    pub fn new<F>(fetcher: Arc<F>) -> Self
    where
        F: ResourceFetcher<VaultSecret> + ResourceFetcher<VaultKey> + 'static,
    {
        let shared: Arc<F> = Arc::clone(&fetcher);
        Self::with_fetchers(shared, fetcher)
    }

    /// Create a service over separate fetchers
    pub fn with_fetchers(
        secrets: Arc<dyn ResourceFetcher<VaultSecret>>,
        keys: Arc<dyn ResourceFetcher<VaultKey>>,
    ) -> Self {
        Self {
            secrets,
            keys,
            secret_cache: NamedResourceCache::new("secretKey"),
            key_cache: NamedResourceCache::new("keyName"),
        }
    }

    /// Create a service backed by the Key Vault named in configuration
    ///
    /// # Errors
    /// Returns an error if the Key Vault client cannot be created
    pub fn from_configuration(configuration: &ServiceConfiguration) -> Result<Self> {
        let client = KeyVaultClient::new(configuration)
            .inspect_err(|e| error!(service = SERVICE, error = %e, "Failed to create Key Vault client"))?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Secret `secret_key`; `version` is only used on a cache miss
    ///
    /// # Errors
    /// - `InvalidArgument` when the name is blank
    /// - `NotFound` when the vault has no such secret
    /// - `Cancelled` when `cancel` fires first
    pub async fn get_secret(
        &self,
        secret_key: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<VaultSecret> {
        let shown_version = version.unwrap_or_default();
        info!(
            service = SERVICE,
            operation = "get_secret",
            name = secret_key,
            version = shown_version,
            "{SERVICE} get_secret secretKey={secret_key} version={shown_version}"
        );

        self.secret_cache
            .get_or_fetch(self.secrets.as_ref(), secret_key, version, cancel)
            .await
            .inspect_err(|e| error!(service = SERVICE, operation = "get_secret", name = secret_key, error = %e, "{e}"))
    }

    /// Key `key_name`; `version` is only used on a cache miss
    ///
    /// # Errors
    /// - `InvalidArgument` when the name is blank
    /// - `NotFound` when the vault has no such key
    /// - `Cancelled` when `cancel` fires first
    pub async fn get_key(
        &self,
        key_name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<VaultKey> {
        let shown_version = version.unwrap_or_default();
        info!(
            service = SERVICE,
            operation = "get_key",
            name = key_name,
            version = shown_version,
            "{SERVICE} get_key keyName={key_name} version={shown_version}"
        );

        self.key_cache
            .get_or_fetch(self.keys.as_ref(), key_name, version, cancel)
            .await
            .inspect_err(|e| error!(service = SERVICE, operation = "get_key", name = key_name, error = %e, "{e}"))
    }
}
