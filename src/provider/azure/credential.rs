//! # Key Vault Credentials
//!
//! Token credentials handed to the Key Vault SDK clients.
//!
//! - `PACT_MODE` set: [`StaticTokenCredential`] with a fixed test token
//! - `AZURE_ACCESS_TOKEN` set: [`StaticTokenCredential`] with that token
//! - otherwise `ManagedIdentityCredential`, with `AZURE_CLIENT_ID` selecting a
//!   user-assigned identity

use crate::constants::PACT_ACCESS_TOKEN;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, ManagedIdentityCredentialOptions, UserAssignedId};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

/// TokenCredential returning a fixed token
///
/// Used for Pact testing and for tokens injected through the environment.
pub struct StaticTokenCredential {
    token: Secret,
}

impl std::fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenCredential").finish_non_exhaustive()
    }
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        Ok(AccessToken::new(
            self.token.clone(),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

/// Pick the credential for the current process
///
/// # Errors
/// Returns an error if the managed identity credential cannot be created
pub fn default_credential() -> Result<Arc<dyn TokenCredential>> {
    if std::env::var("PACT_MODE").is_ok() {
        debug!("Pact mode: using mock Azure credential");
        return Ok(Arc::new(StaticTokenCredential::new(PACT_ACCESS_TOKEN)));
    }
    if let Ok(token) = std::env::var("AZURE_ACCESS_TOKEN") {
        info!("Using Key Vault access token from AZURE_ACCESS_TOKEN");
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }

    let options = match std::env::var("AZURE_CLIENT_ID") {
        Ok(client_id) => {
            info!(client_id = %client_id, "Using user-assigned managed identity");
            Some(ManagedIdentityCredentialOptions {
                user_assigned_id: Some(UserAssignedId::ClientId(client_id)),
                ..Default::default()
            })
        }
        Err(_) => {
            info!("Using system-assigned managed identity");
            None
        }
    };
    let credential = ManagedIdentityCredential::new(options)
        .context("Failed to create ManagedIdentityCredential")?;
    Ok(credential)
}
