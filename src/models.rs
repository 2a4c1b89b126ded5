//! # Vault Models
//!
//! Values served by the certificate and Key Vault services.

use crate::cache::CacheableResource;
use crate::error::{ResourceKind, Result};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

const EMPTY_CERTIFICATE: &str = "Certificate contents are empty.";

/// Public certificate resolved from the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub name: String,
    pub version: Option<String>,
    /// DER-encoded X.509 certificate
    pub cer: Vec<u8>,
    pub friendly_name: String,
    pub enabled: bool,
}

/// Fields parsed out of a certificate's DER
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetails {
    pub subject: String,
    pub issuer: String,
    /// Colon-separated hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Upper-case hex SHA-256 of the DER
    pub thumbprint: String,
}

impl Certificate {
    /// Parse the DER
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid X.509 certificate
    pub fn details(&self) -> Result<CertificateDetails> {
        let (_, parsed) = x509_parser::parse_x509_certificate(&self.cer)
            .map_err(|e| anyhow!("Certificate '{}' is not valid DER: {e}", self.name))?;

        let validity = parsed.validity();
        let timestamp = |secs: i64| {
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| anyhow!("Certificate '{}' has an out-of-range validity", self.name))
        };

        Ok(CertificateDetails {
            subject: parsed.subject().to_string(),
            issuer: parsed.issuer().to_string(),
            serial: parsed.raw_serial_as_string(),
            not_before: timestamp(validity.not_before.timestamp())?,
            not_after: timestamp(validity.not_after.timestamp())?,
            thumbprint: self.thumbprint(),
        })
    }

    /// Upper-case hex SHA-256 of the DER
    #[must_use]
    pub fn thumbprint(&self) -> String {
        Sha256::digest(&self.cer)
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }
}

impl CacheableResource for Certificate {
    const KIND: ResourceKind = ResourceKind::Certificate;

    fn is_empty_payload(&self) -> bool {
        self.cer.is_empty()
    }

    fn empty_payload_message() -> &'static str {
        EMPTY_CERTIFICATE
    }

    fn validate(&self) -> Result<()> {
        self.details().map(|_| ())
    }
}

/// Certificate together with its private key, as stored in the backing secret
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedCertificate {
    pub name: String,
    pub version: Option<String>,
    /// `application/x-pkcs12` or `application/x-pem-file`
    pub content_type: String,
    /// PFX bytes, or the PEM text as bytes
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for DownloadedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedCertificate")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl DownloadedCertificate {
    #[must_use]
    pub fn is_pem(&self) -> bool {
        self.content_type == PEM_CONTENT_TYPE
    }
}

impl CacheableResource for DownloadedCertificate {
    const KIND: ResourceKind = ResourceKind::Certificate;

    fn is_empty_payload(&self) -> bool {
        self.bytes.is_empty()
    }

    fn empty_payload_message() -> &'static str {
        EMPTY_CERTIFICATE
    }
}

/// Content type of PKCS#12 certificate secrets
pub const PKCS12_CONTENT_TYPE: &str = "application/x-pkcs12";

/// Content type of PEM certificate secrets
pub const PEM_CONTENT_TYPE: &str = "application/x-pem-file";

/// Secret resolved from the vault
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSecret {
    pub name: String,
    pub version: Option<String>,
    pub value: String,
    pub content_type: Option<String>,
    pub enabled: bool,
    pub id: String,
}

impl std::fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecret")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("content_type", &self.content_type)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl CacheableResource for VaultSecret {
    const KIND: ResourceKind = ResourceKind::Secret;
}

/// Public half of a vault key; binary members stay base64url-encoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonWebKey {
    pub kty: String,
    pub key_ops: Vec<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// Key resolved from the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultKey {
    pub name: String,
    pub version: Option<String>,
    pub id: String,
    pub key: JsonWebKey,
    pub enabled: bool,
}

impl CacheableResource for VaultKey {
    const KIND: ResourceKind = ResourceKind::Key;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> Vec<u8> {
        let certified = rcgen::generate_simple_self_signed(vec!["vault.example".to_string()])
            .unwrap();
        certified.cert.der().to_vec()
    }

    #[test]
    fn test_details_from_self_signed() {
        let certificate = Certificate {
            name: "web".to_string(),
            version: None,
            cer: self_signed(),
            friendly_name: "web".to_string(),
            enabled: true,
        };

        let details = certificate.details().unwrap();
        assert!(details.not_before < details.not_after);
        assert_eq!(details.thumbprint.len(), 64);
        assert_eq!(details.thumbprint, certificate.thumbprint());
        assert!(certificate.validate().is_ok());
    }

    #[test]
    fn test_garbage_der_fails_validation() {
        let certificate = Certificate {
            name: "broken".to_string(),
            version: None,
            cer: vec![1, 2, 3],
            friendly_name: "broken".to_string(),
            enabled: true,
        };
        assert!(certificate.validate().is_err());
        assert!(!certificate.is_empty_payload());
    }

    #[test]
    fn test_secret_debug_hides_value() {
        let secret = VaultSecret {
            name: "db".to_string(),
            version: Some("1".to_string()),
            value: "hunter2".to_string(),
            content_type: None,
            enabled: true,
            id: "https://v/secrets/db/1".to_string(),
        };
        assert!(!format!("{secret:?}").contains("hunter2"));
    }
}
