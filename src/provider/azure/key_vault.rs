//! # Azure Key Vault Client
//!
//! Reads certificates, certificate downloads, secrets and keys through the
//! Azure SDK clients.
//!
//! This client:
//! - Authenticates with the credential picked by [`default_credential`]
//! - Retries transient failures through the SDK's exponential retry policy
//! - Reports a 404 as "no value" with the raw status so callers can build
//!   their own not-found error
//! - Routes to a Pact mock server when `PACT_MODE` and
//!   `AZURE_KEY_VAULT_ENDPOINT` are set

use super::credential::default_credential;
use super::models::{parse_object_id, CertificateBundle, KeyBundle, SecretBundle};
use crate::config::ServiceConfiguration;
use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS};
use crate::error::{Result, ServiceError};
use crate::models::{Certificate, DownloadedCertificate, VaultKey, VaultSecret};
use crate::observability::metrics;
use crate::provider::{FetchResponse, RawResponse, ResourceFetcher};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_core::http::{ClientOptions, ExponentialRetryOptions, RetryOptions, StatusCode};
use azure_security_keyvault_certificates::models::CertificateClientGetCertificateOptions;
use azure_security_keyvault_certificates::{CertificateClient, CertificateClientOptions};
use azure_security_keyvault_keys::models::KeyClientGetKeyOptions;
use azure_security_keyvault_keys::{KeyClient, KeyClientOptions};
use azure_security_keyvault_secrets::models::SecretClientGetSecretOptions;
use azure_security_keyvault_secrets::{SecretClient, SecretClientOptions};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

/// Outcome of a single Key Vault GET
enum Lookup<T> {
    Found(T),
    Missing(RawResponse),
}

/// Exponential retry with the service defaults: 1s delay, 1s max delay, 1 retry
#[must_use]
pub fn default_retry_options() -> RetryOptions {
    RetryOptions::exponential(ExponentialRetryOptions {
        initial_delay: time::Duration::milliseconds(DEFAULT_RETRY_DELAY_MS),
        max_delay: time::Duration::milliseconds(DEFAULT_RETRY_MAX_DELAY_MS),
        max_retries: DEFAULT_MAX_RETRIES,
        ..Default::default()
    })
}

/// Key Vault data-plane client
#[derive(Clone)]
pub struct KeyVaultClient {
    certificates: Arc<CertificateClient>,
    secrets: Arc<SecretClient>,
    keys: Arc<KeyClient>,
    vault_url: String,
    api_version: String,
}

impl std::fmt::Debug for KeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClient")
            .field("vault_url", &self.vault_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl KeyVaultClient {
    /// Create a client from `KeyVault:Uri` and `KeyVaultClientApiVersion`
    ///
    /// # Errors
    /// Returns an error if the vault URI is missing or invalid, or a client cannot be created
    pub fn new(configuration: &ServiceConfiguration) -> Result<Self> {
        let vault_url = match pact_endpoint() {
            Some(endpoint) => {
                info!(
                    "Pact mode enabled: routing Azure Key Vault requests to {}",
                    endpoint
                );
                endpoint
            }
            None => configuration.key_vault_uri()?,
        };
        let api_version = configuration.key_vault_api_version()?;
        Self::with_credential(
            &vault_url,
            &api_version,
            default_credential()?,
            default_retry_options(),
        )
    }

    /// Create a client for an explicit vault URL, credential and retry policy
    ///
    /// # Errors
    /// Returns an error if the vault URL is rejected by the SDK clients
    pub fn with_credential(
        vault_url: &str,
        api_version: &str,
        credential: Arc<dyn TokenCredential>,
        retry: RetryOptions,
    ) -> Result<Self> {
        let mut vault_url = vault_url.trim().to_string();
        if !vault_url.ends_with('/') {
            vault_url.push('/');
        }
        info!(vault_url = %vault_url, api_version, "Initializing Azure Key Vault clients");

        let client_options = ClientOptions {
            retry: Some(retry),
            ..Default::default()
        };

        let certificates = CertificateClient::new(
            &vault_url,
            Arc::clone(&credential),
            Some(CertificateClientOptions {
                api_version: api_version.to_string(),
                client_options: client_options.clone(),
                ..Default::default()
            }),
        )
        .context("Failed to create Azure Key Vault CertificateClient")?;
        let secrets = SecretClient::new(
            &vault_url,
            Arc::clone(&credential),
            Some(SecretClientOptions {
                api_version: api_version.to_string(),
                client_options: client_options.clone(),
                ..Default::default()
            }),
        )
        .context("Failed to create Azure Key Vault SecretClient")?;
        let keys = KeyClient::new(
            &vault_url,
            credential,
            Some(KeyClientOptions {
                api_version: api_version.to_string(),
                client_options,
                ..Default::default()
            }),
        )
        .context("Failed to create Azure Key Vault KeyClient")?;

        Ok(Self {
            certificates: Arc::new(certificates),
            secrets: Arc::new(secrets),
            keys: Arc::new(keys),
            vault_url,
            api_version: api_version.to_string(),
        })
    }

    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Public certificate (DER) at `version`, latest when `None`
    ///
    /// # Errors
    /// Returns an error for authentication, transport and unexpected status failures
    pub async fn get_certificate(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<Certificate>> {
        let options = CertificateClientGetCertificateOptions {
            certificate_version: version_option(version),
            ..Default::default()
        };
        let lookup = self
            .call::<CertificateBundle, _>("get_certificate", name, cancel, async {
                let response = self
                    .certificates
                    .get_certificate(name, Some(options))
                    .await?;
                Ok::<_, azure_core::Error>(response.into_raw_body().collect().await?.to_vec())
            })
            .await?;

        match lookup {
            Lookup::Found(bundle) => Ok(FetchResponse::found(bundle.into_certificate(name)?)),
            Lookup::Missing(raw) => Ok(FetchResponse::missing(raw)),
        }
    }

    /// Certificate plus private key, read from the certificate's backing secret
    ///
    /// # Errors
    /// Returns an error for authentication, transport and unexpected status failures,
    /// or when the secret's content type is not PKCS#12 or PEM
    pub async fn download_certificate(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<DownloadedCertificate>> {
        let options = CertificateClientGetCertificateOptions {
            certificate_version: version_option(version),
            ..Default::default()
        };
        let certificate = match self
            .call::<CertificateBundle, _>("download_certificate", name, cancel, async {
                let response = self
                    .certificates
                    .get_certificate(name, Some(options))
                    .await?;
                Ok::<_, azure_core::Error>(response.into_raw_body().collect().await?.to_vec())
            })
            .await?
        {
            Lookup::Found(bundle) => bundle,
            Lookup::Missing(raw) => return Ok(FetchResponse::missing(raw)),
        };

        let (secret_name, secret_version) = certificate
            .sid
            .as_deref()
            .and_then(parse_object_id)
            .unwrap_or_else(|| (name.to_string(), version_option(version)));
        let options = SecretClientGetSecretOptions {
            secret_version,
            ..Default::default()
        };
        let secret = match self
            .call::<SecretBundle, _>("download_certificate", name, cancel, async {
                let response = self
                    .secrets
                    .get_secret(&secret_name, Some(options))
                    .await?;
                Ok::<_, azure_core::Error>(response.into_raw_body().collect().await?.to_vec())
            })
            .await?
        {
            Lookup::Found(bundle) => bundle,
            Lookup::Missing(raw) => return Ok(FetchResponse::missing(raw)),
        };

        Ok(FetchResponse::found(certificate.into_download(name, secret)?))
    }

    /// Secret value at `version`, latest when `None`
    ///
    /// # Errors
    /// Returns an error for authentication, transport and unexpected status failures
    pub async fn get_secret(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<VaultSecret>> {
        let options = SecretClientGetSecretOptions {
            secret_version: version_option(version),
            ..Default::default()
        };
        let lookup = self
            .call::<SecretBundle, _>("get_secret", name, cancel, async {
                let response = self.secrets.get_secret(name, Some(options)).await?;
                Ok::<_, azure_core::Error>(response.into_raw_body().collect().await?.to_vec())
            })
            .await?;

        match lookup {
            Lookup::Found(bundle) => Ok(FetchResponse::found(bundle.into_secret(name))),
            Lookup::Missing(raw) => Ok(FetchResponse::missing(raw)),
        }
    }

    /// Public key material at `version`, latest when `None`
    ///
    /// # Errors
    /// Returns an error for authentication, transport and unexpected status failures
    pub async fn get_key(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<VaultKey>> {
        let options = KeyClientGetKeyOptions {
            key_version: version_option(version),
            ..Default::default()
        };
        let lookup = self
            .call::<KeyBundle, _>("get_key", name, cancel, async {
                let response = self.keys.get_key(name, Some(options)).await?;
                Ok::<_, azure_core::Error>(response.into_raw_body().collect().await?.to_vec())
            })
            .await?;

        match lookup {
            Lookup::Found(bundle) => Ok(FetchResponse::found(bundle.into_key(name))),
            Lookup::Missing(raw) => Ok(FetchResponse::missing(raw)),
        }
    }

    /// Run one SDK call under a span, racing `cancel`, and parse its body
    async fn call<T, F>(
        &self,
        operation: &'static str,
        name: &str,
        cancel: &CancellationToken,
        request: F,
    ) -> Result<Lookup<T>>
    where
        T: DeserializeOwned,
        F: Future<Output = azure_core::Result<Vec<u8>>>,
    {
        let span = tracing::debug_span!("azure.keyvault.get", operation, object.name = name);
        let start = Instant::now();

        let outcome = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ServiceError::Cancelled),
                result = request => Ok(result),
            }
        }
        .instrument(span)
        .await;
        metrics::observe_provider_request_duration(operation, start.elapsed().as_secs_f64());

        match outcome? {
            Ok(body) => serde_json::from_slice::<T>(&body)
                .map(Lookup::Found)
                .map_err(ServiceError::from),
            Err(e) if e.http_status() == Some(StatusCode::NotFound) => {
                debug!(operation, name, "Key Vault object not found");
                Ok(Lookup::Missing(RawResponse::not_found()))
            }
            Err(e) => {
                Err(anyhow!("Azure Key Vault {operation} failed for '{name}': {e}").into())
            }
        }
    }
}

fn version_option(version: Option<&str>) -> Option<String> {
    version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn pact_endpoint() -> Option<String> {
    std::env::var("PACT_MODE").ok()?;
    std::env::var("AZURE_KEY_VAULT_ENDPOINT").ok()
}

#[async_trait]
impl ResourceFetcher<Certificate> for KeyVaultClient {
    async fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<Certificate>> {
        self.get_certificate(name, version, cancel).await
    }
}

#[async_trait]
impl ResourceFetcher<DownloadedCertificate> for KeyVaultClient {
    async fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<DownloadedCertificate>> {
        self.download_certificate(name, version, cancel).await
    }
}

#[async_trait]
impl ResourceFetcher<VaultSecret> for KeyVaultClient {
    async fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<VaultSecret>> {
        self.get_secret(name, version, cancel).await
    }
}

#[async_trait]
impl ResourceFetcher<VaultKey> for KeyVaultClient {
    async fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse<VaultKey>> {
        self.get_key(name, version, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::azure::credential::StaticTokenCredential;

    #[test]
    fn test_vault_url_gets_trailing_slash() {
        let client = KeyVaultClient::with_credential(
            "https://my-vault.vault.azure.net",
            "7.5",
            Arc::new(StaticTokenCredential::new("t")),
            default_retry_options(),
        )
        .unwrap();
        assert_eq!(client.vault_url(), "https://my-vault.vault.azure.net/");
        assert_eq!(client.api_version(), "7.5");
    }

    #[test]
    fn test_version_option_ignores_blank() {
        assert_eq!(version_option(None), None);
        assert_eq!(version_option(Some(" ")), None);
        assert_eq!(version_option(Some("abc")), Some("abc".to_string()));
    }
}
