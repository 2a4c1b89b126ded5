//! # Configuration Accessor
//!
//! Typed access to a [`ConfigurationSource`].
//!
//! Optional accessors return `None` for absent values, required accessors fail
//! with [`ServiceError::InvalidArgument`] when a value is absent or blank.
//! Every failure is logged before it is returned.

use super::environment::Environment;
use super::source::{ConfigurationSource, ReloadToken, KEY_DELIMITER};
use crate::constants::{
    CERTIFICATE_THUMBPRINT_KEY, DEFAULT_KEY_VAULT_API_VERSION, KEY_VAULT_API_VERSION_KEY,
    KEY_VAULT_URI_KEY,
};
use crate::error::{require_non_blank, Result, ServiceError};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

/// A node of the configuration tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSection {
    /// Full colon-delimited path, e.g. `KeyVault:Certificates`
    pub path: String,
    /// Last path segment, e.g. `Certificates`
    pub key: String,
    /// Value stored at `path`, if any
    pub value: Option<String>,
}

/// Typed accessor over a configuration source
#[derive(Clone)]
pub struct ServiceConfiguration {
    source: Arc<dyn ConfigurationSource>,
    environment: Environment,
}

impl std::fmt::Debug for ServiceConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfiguration")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ServiceConfiguration {
    /// Create an accessor, reading the environment from the process
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidArgument`] if `KeyVault:Certificates:Thumbprint` is not configured
    pub fn new(source: Arc<dyn ConfigurationSource>) -> Result<Self> {
        Self::with_environment(source, Environment::from_env())
    }

    /// Create an accessor for an explicit environment
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidArgument`] if `KeyVault:Certificates:Thumbprint` is not configured
    pub fn with_environment(
        source: Arc<dyn ConfigurationSource>,
        environment: Environment,
    ) -> Result<Self> {
        let configuration = Self {
            source,
            environment,
        };
        configuration.get_required_value(CERTIFICATE_THUMBPRINT_KEY)?;
        debug!(environment = %environment, "Configuration accessor ready");
        Ok(configuration)
    }

    /// Current execution environment
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Indexer-style lookup, same as [`Self::get_value`]
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key)
    }

    /// Raw string value
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.source
            .get(key)
            .inspect_err(|e| error!(key, error = %e, "Failed to read configuration value"))
    }

    /// String value that must be present and not blank
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidArgument`] naming `key` when absent or blank
    pub fn get_required_value(&self, key: &str) -> Result<String> {
        let value = self.get_value(key)?.unwrap_or_default();
        require_non_blank(&value, key)
            .inspect_err(|e| error!(key, error = %e, "Required configuration value missing"))?;
        Ok(value)
    }

    /// Integer value; `None` when absent, blank or not an integer
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn get_int_value(&self, key: &str) -> Result<Option<i32>> {
        let Some(value) = self.get_value(key)? else {
            return Ok(None);
        };
        if value.trim().is_empty() {
            return Ok(None);
        }
        Ok(value.trim().parse().ok())
    }

    /// Base64-decoded bytes of a required value
    ///
    /// # Errors
    /// - [`ServiceError::InvalidArgument`] when the value is absent or blank
    /// - [`ServiceError::Format`] when the value is not valid base64
    pub fn get_required_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let value = self.get_required_value(key)?;
        general_purpose::STANDARD
            .decode(value.trim())
            .map_err(ServiceError::from)
            .inspect_err(|e| error!(key, error = %e, "Configuration value is not valid base64"))
    }

    /// Top-level sections
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn children(&self) -> Result<Vec<ConfigSection>> {
        self.children_of(None)
    }

    /// Immediate children of `path`, or the top level when `None`
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn children_of(&self, path: Option<&str>) -> Result<Vec<ConfigSection>> {
        let wanted: Vec<String> = path
            .map(|p| p.split(KEY_DELIMITER).map(str::to_lowercase).collect())
            .unwrap_or_default();
        let mut segments = BTreeMap::new();

        for key in self.source.keys()? {
            let mut parts = key.split(KEY_DELIMITER);
            let under_path = wanted
                .iter()
                .all(|w| parts.next().is_some_and(|part| part.to_lowercase() == *w));
            if !under_path {
                continue;
            }
            if let Some(segment) = parts.next().filter(|s| !s.is_empty()) {
                segments
                    .entry(segment.to_lowercase())
                    .or_insert_with(|| segment.to_string());
            }
        }

        segments
            .into_values()
            .map(|segment| {
                let child = match path {
                    Some(path) => format!("{path}{KEY_DELIMITER}{segment}"),
                    None => segment,
                };
                self.section(&child)
            })
            .collect()
    }

    /// Section at `key`; exists even when nothing is stored there
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn section(&self, key: &str) -> Result<ConfigSection> {
        Ok(ConfigSection {
            path: key.to_string(),
            key: key
                .rsplit(KEY_DELIMITER)
                .next()
                .unwrap_or(key)
                .to_string(),
            value: self.get_value(key)?,
        })
    }

    /// Token that fires when the underlying source changes
    #[must_use]
    pub fn reload_token(&self) -> ReloadToken {
        self.source.reload_token()
    }

    /// Key Vault base URL from `KeyVault:Uri`
    ///
    /// A bare vault name expands to `https://{name}.vault.azure.net/`.
    /// The result always ends with `/`.
    ///
    /// # Errors
    /// Returns an error if the value is missing or is not an absolute URL
    pub fn key_vault_uri(&self) -> Result<String> {
        let raw = self.get_required_value(KEY_VAULT_URI_KEY)?;
        let raw = raw.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}.vault.azure.net/")
        };

        let url = Url::parse(&candidate)
            .map_err(|e| ServiceError::configuration(KEY_VAULT_URI_KEY, e.to_string()))
            .inspect_err(|e| error!(error = %e, "Invalid Key Vault URI"))?;

        let mut uri = url.to_string();
        if !uri.ends_with('/') {
            uri.push('/');
        }
        Ok(uri)
    }

    /// Key Vault REST API version from `KeyVaultClientApiVersion`
    ///
    /// Accepts `7.5` or the `V7_5` spelling; defaults to `7.5`.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read
    pub fn key_vault_api_version(&self) -> Result<String> {
        let Some(raw) = self
            .get_value(KEY_VAULT_API_VERSION_KEY)?
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(DEFAULT_KEY_VAULT_API_VERSION.to_string());
        };

        let raw = raw.trim();
        let version = raw
            .strip_prefix('V')
            .or_else(|| raw.strip_prefix('v'))
            .map_or_else(|| raw.to_string(), |v| v.replace('_', "."));
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigSource;

    fn configuration(pairs: &[(&str, &str)]) -> Result<ServiceConfiguration> {
        let mut all = vec![(CERTIFICATE_THUMBPRINT_KEY, "ABC123")];
        all.extend_from_slice(pairs);
        ServiceConfiguration::with_environment(
            Arc::new(MemoryConfigSource::from_pairs(all)),
            Environment::Production,
        )
    }

    #[test]
    fn test_thumbprint_is_required() {
        let err = ServiceConfiguration::with_environment(
            Arc::new(MemoryConfigSource::new()),
            Environment::Production,
        )
        .unwrap_err();

        match err {
            ServiceError::InvalidArgument(key) => assert_eq!(key, CERTIFICATE_THUMBPRINT_KEY),
            other => panic!("Expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_children_and_sections() {
        let config = configuration(&[
            ("KeyVault:Uri", "https://vault.example/"),
            ("Logging:Level", "Info"),
        ])
        .unwrap();

        let top: Vec<String> = config.children().unwrap().into_iter().map(|s| s.key).collect();
        assert_eq!(top, vec!["KeyVault".to_string(), "Logging".to_string()]);

        let vault: Vec<String> = config
            .children_of(Some("KeyVault"))
            .unwrap()
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(
            vault,
            vec!["KeyVault:Certificates".to_string(), "KeyVault:Uri".to_string()]
        );

        let section = config.section("KeyVault:Uri").unwrap();
        assert_eq!(section.key, "Uri");
        assert_eq!(section.value.as_deref(), Some("https://vault.example/"));
    }

    #[test]
    fn test_children_of_keys_that_change_length_when_lowercased() {
        let config = configuration(&[("ẞẞ:a", "1"), ("ẞẞx:b", "2"), ("İ:Child", "3")]).unwrap();

        let under: Vec<String> = config
            .children_of(Some("ẞẞ"))
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(under, vec!["a".to_string()]);

        let dotted: Vec<String> = config
            .children_of(Some("i\u{307}"))
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(dotted, vec!["Child".to_string()]);
    }

    #[test]
    fn test_key_vault_uri_from_name() {
        let config = configuration(&[("KeyVault:Uri", "my-vault")]).unwrap();
        assert_eq!(
            config.key_vault_uri().unwrap(),
            "https://my-vault.vault.azure.net/"
        );

        let config = configuration(&[("KeyVault:Uri", "http://localhost:1234")]).unwrap();
        assert_eq!(config.key_vault_uri().unwrap(), "http://localhost:1234/");
    }

    #[test]
    fn test_key_vault_api_version_spellings() {
        let config = configuration(&[]).unwrap();
        assert_eq!(config.key_vault_api_version().unwrap(), "7.5");

        let config = configuration(&[(KEY_VAULT_API_VERSION_KEY, "V7_4")]).unwrap();
        assert_eq!(config.key_vault_api_version().unwrap(), "7.4");

        let config = configuration(&[(KEY_VAULT_API_VERSION_KEY, "7.3")]).unwrap();
        assert_eq!(config.key_vault_api_version().unwrap(), "7.3");
    }
}
