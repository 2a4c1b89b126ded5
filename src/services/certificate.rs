//! # Certificate Service
//!
//! Cached access to vault certificates.
//!
//! Public certificates and downloaded certificates (with private key) are
//! cached separately, each keyed by certificate name only.

use crate::cache::NamedResourceCache;
use crate::config::ServiceConfiguration;
use crate::error::Result;
use crate::models::{Certificate, DownloadedCertificate};
use crate::provider::azure::KeyVaultClient;
use crate::provider::ResourceFetcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE: &str = "CertificateService";

/// Read-through certificate cache over a vault fetcher
pub struct CertificateService {
    certificates: Arc<dyn ResourceFetcher<Certificate>>,
    downloads: Arc<dyn ResourceFetcher<DownloadedCertificate>>,
    certificate_cache: NamedResourceCache<Certificate>,
    download_cache: NamedResourceCache<DownloadedCertificate>,
}

impl std::fmt::Debug for CertificateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateService")
            .field("certificate_cache", &self.certificate_cache)
            .field("download_cache", &self.download_cache)
            .finish_non_exhaustive()
    }
}

impl CertificateService {
    /// Create a service over one fetcher serving both certificates and downloads
    pub fn new<F>(fetcher: Arc<F>) -> Self
    where
        F: ResourceFetcher<Certificate> + ResourceFetcher<DownloadedCertificate> + 'static,
    {
        let shared: Arc<F> = Arc::clone(&fetcher);
        Self::with_fetchers(shared, fetcher)
    }

    /// Create a service over separate fetchers
    pub fn with_fetchers(
        certificates: Arc<dyn ResourceFetcher<Certificate>>,
        downloads: Arc<dyn ResourceFetcher<DownloadedCertificate>>,
    ) -> Self {
        Self {
            certificates,
            downloads,
            certificate_cache: NamedResourceCache::new("certificateName"),
            download_cache: NamedResourceCache::new("certificateName"),
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

    /// Latest version of the public certificate `certificate_name`
    ///
    /// # Errors
    /// - `InvalidArgument` when the name is blank
    /// - `NotFound` when the vault has no such certificate
    /// - `EmptyPayload` when the certificate has no content
    /// - `Cancelled` when `cancel` fires first
    pub async fn get_certificate(
        &self,
        certificate_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Certificate> {
        info!(
            service = SERVICE,
            operation = "get_certificate",
            name = certificate_name,
            "{SERVICE} get_certificate certificateName={certificate_name}"
        );

        self.certificate_cache
            .get_or_fetch(self.certificates.as_ref(), certificate_name, None, cancel)
            .await
            .inspect_err(|e| error!(service = SERVICE, operation = "get_certificate", name = certificate_name, error = %e, "{e}"))
    }

    /// Certificate with private key; `version` is only used on a cache miss
    ///
    /// # Errors
    /// - `InvalidArgument` when the name is blank
    /// - `NotFound` when the vault has no such certificate
    /// - `EmptyPayload` when the backing secret has no content
    /// - `Cancelled` when `cancel` fires first
    pub async fn download_certificate(
        &self,
        certificate_name: &str,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DownloadedCertificate> {
        let shown_version = version.unwrap_or_default();
        info!(
            service = SERVICE,
            operation = "download_certificate",
            name = certificate_name,
            version = shown_version,
            "{SERVICE} download_certificate certificateName={certificate_name} version={shown_version}"
        );

        self.download_cache
            .get_or_fetch(self.downloads.as_ref(), certificate_name, version, cancel)
            .await
            .inspect_err(|e| error!(service = SERVICE, operation = "download_certificate", name = certificate_name, error = %e, "{e}"))
    }
}
