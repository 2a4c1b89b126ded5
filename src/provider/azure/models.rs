//! Key Vault response payloads
//!
//! Only the fields the services read are modelled; unknown fields are ignored.
//!
//! References:
//! - [Get Certificate](https://learn.microsoft.com/rest/api/keyvault/certificates/get-certificate/get-certificate)
//! - [Get Secret](https://learn.microsoft.com/rest/api/keyvault/secrets/get-secret/get-secret)
//! - [Get Key](https://learn.microsoft.com/rest/api/keyvault/keys/get-key/get-key)

use crate::error::Result;
use crate::models::{
    Certificate, DownloadedCertificate, JsonWebKey, VaultKey, VaultSecret, PEM_CONTENT_TYPE,
    PKCS12_CONTENT_TYPE,
};
use anyhow::{anyhow, Context};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

/// Object attributes shared by certificates, secrets and keys
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributes {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Not-before, Unix seconds
    #[serde(default)]
    pub nbf: Option<i64>,
    /// Expiry, Unix seconds
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
}

/// `GET certificates/{name}/{version}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBundle {
    /// `https://{vault}/certificates/{name}/{version}`
    pub id: String,
    /// Secret backing the certificate: `https://{vault}/secrets/{name}/{version}`
    #[serde(default)]
    pub sid: Option<String>,
    /// Base64 DER of the public certificate
    #[serde(default)]
    pub cer: Option<String>,
    /// Base64url SHA-1 thumbprint
    #[serde(default)]
    pub x5t: Option<String>,
    #[serde(default)]
    pub attributes: ObjectAttributes,
}

/// `GET secrets/{name}/{version}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    /// `https://{vault}/secrets/{name}/{version}`
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Set when the secret backs a certificate
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub attributes: ObjectAttributes,
}

/// `GET keys/{name}/{version}` response
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBundle {
    pub key: JsonWebKeyPayload,
    #[serde(default)]
    pub attributes: ObjectAttributes,
}

/// JSON Web Key as returned by Key Vault; binary members are base64url strings
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKeyPayload {
    /// `https://{vault}/keys/{name}/{version}`
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub key_ops: Vec<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

impl CertificateBundle {
    /// Version segment of `id`
    #[must_use]
    pub fn version(&self) -> Option<String> {
        parse_object_id(&self.id).and_then(|(_, v)| v)
    }

    /// Public certificate named `name`; a missing `cer` yields empty contents
    ///
    /// # Errors
    /// Returns an error if `cer` is not base64
    pub fn into_certificate(self, name: &str) -> Result<Certificate> {
        let cer = match self.cer.as_deref() {
            Some(encoded) => decode_base64(encoded).context("Certificate 'cer' is not base64")?,
            None => Vec::new(),
        };
        Ok(Certificate {
            name: name.to_string(),
            version: self.version(),
            cer,
            friendly_name: name.to_string(),
            enabled: self.attributes.enabled.unwrap_or(true),
        })
    }

    /// Downloaded certificate from this bundle and its backing `secret`
    ///
    /// The secret holds base64 PKCS#12 (the default) or PEM text.
    ///
    /// # Errors
    /// Returns an error for any other content type, or PKCS#12 that is not base64
    pub fn into_download(self, name: &str, secret: SecretBundle) -> Result<DownloadedCertificate> {
        let content_type = secret
            .content_type
            .unwrap_or_else(|| PKCS12_CONTENT_TYPE.to_string());
        let value = secret.value.unwrap_or_default();
        let bytes = match content_type.as_str() {
            PKCS12_CONTENT_TYPE => {
                decode_base64(&value).context("PKCS#12 certificate secret is not base64")?
            }
            PEM_CONTENT_TYPE => value.into_bytes(),
            other => {
                return Err(anyhow!(
                    "Unsupported certificate content type '{other}' for certificate: {name}"
                )
                .into())
            }
        };
        Ok(DownloadedCertificate {
            name: name.to_string(),
            version: self.version(),
            content_type,
            bytes,
        })
    }
}

impl SecretBundle {
    #[must_use]
    pub fn into_secret(self, name: &str) -> VaultSecret {
        VaultSecret {
            name: name.to_string(),
            version: parse_object_id(&self.id).and_then(|(_, v)| v),
            value: self.value.unwrap_or_default(),
            content_type: self.content_type,
            enabled: self.attributes.enabled.unwrap_or(true),
            id: self.id,
        }
    }
}

impl KeyBundle {
    #[must_use]
    pub fn into_key(self, name: &str) -> VaultKey {
        let version = parse_object_id(&self.key.kid).and_then(|(_, v)| v);
        let jwk = self.key;
        VaultKey {
            name: name.to_string(),
            version,
            id: jwk.kid,
            key: JsonWebKey {
                kty: jwk.kty,
                key_ops: jwk.key_ops,
                n: jwk.n,
                e: jwk.e,
                crv: jwk.crv,
                x: jwk.x,
                y: jwk.y,
            },
            enabled: self.attributes.enabled.unwrap_or(true),
        }
    }
}

/// Key Vault returns standard base64 for secrets and base64url for some binary fields
fn decode_base64(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let trimmed = encoded.trim();
    general_purpose::STANDARD
        .decode(trimmed)
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')))
}

/// Name and version from an object id such as `https://vault/secrets/{name}/{version}`
#[must_use]
pub fn parse_object_id(id: &str) -> Option<(String, Option<String>)> {
    let path = id.split_once("://").map_or(id, |(_, rest)| rest);
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let mut segments = path.trim_end_matches('/').split('/').skip(1);

    let _collection = segments.next()?;
    let name = segments.next().filter(|s| !s.is_empty())?.to_string();
    let version = segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some((name, version))
}
