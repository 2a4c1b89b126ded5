//! # Process Settings
//!
//! Process-level settings loaded from environment variables.

use super::environment::Environment;
use crate::constants::DEFAULT_PORT;

/// Process-level settings for the binary
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// HTTP port for the logging endpoints, metrics and probes
    pub port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE), used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// Expose `/metrics`
    pub enable_metrics: bool,
    /// Optional JSON settings file layered under the environment
    pub settings_file: Option<String>,
    /// Optional `.env` file layered under the environment
    pub dotenv_file: Option<String>,
    /// Execution environment
    pub environment: Environment,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: true,
            enable_metrics: true,
            settings_file: None,
            dotenv_file: None,
            environment: Environment::default(),
        }
    }
}

impl ServiceSettings {
    /// Load settings from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_var_or_default("PORT", DEFAULT_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", true),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
            settings_file: std::env::var("SETTINGS_FILE").ok(),
            dotenv_file: std::env::var("DOTENV_FILE").ok(),
            environment: Environment::from_env(),
        }
    }

    /// True when logs should be emitted as JSON
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
