//! # Execution Environment
//!
//! Which deployment the process is running in. Read once from
//! `SERVICE_ENVIRONMENT`, falling back to `AZURE_FUNCTIONS_ENVIRONMENT`.

use crate::constants::{ENVIRONMENT_VAR, FUNCTIONS_ENVIRONMENT_VAR};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    Local,
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    /// Resolve the environment from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the environment through `lookup`
    ///
    /// Unknown values fall back to [`Environment::Production`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let Some(raw) = [ENVIRONMENT_VAR, FUNCTIONS_ENVIRONMENT_VAR]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| !value.trim().is_empty())
        else {
            return Self::default();
        };

        raw.parse().unwrap_or_else(|()| {
            warn!(environment = %raw, "Unknown environment, assuming Production");
            Self::default()
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Local => "Local",
            Environment::Development => "Development",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
        }
    }

    #[must_use]
    pub fn is_local(self) -> bool {
        self == Environment::Local
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
