//! # Constants
//!
//! Shared constants used throughout the services.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for the logging endpoints, metrics and probes
pub const DEFAULT_PORT: u16 = 7071;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "vault_services=info,tower_http=info";

/// Base URL used by the HTTP client base when running in the `Local` environment
pub const LOCAL_BASE_URL: &str = "https://localhost/";

/// Configuration key holding the HTTP client base URL (absolute) or path suffix (relative)
pub const SERVICE_URL_KEY: &str = "ServiceUrl";

/// Configuration key holding the service address used outside the `Local` environment
pub const SERVICE_ADDRESS_KEY: &str = "ServiceAddress";

/// Configuration key that must be present for the configuration accessor to start
pub const CERTIFICATE_THUMBPRINT_KEY: &str = "KeyVault:Certificates:Thumbprint";

/// Configuration key holding the Key Vault URI (or bare vault name)
pub const KEY_VAULT_URI_KEY: &str = "KeyVault:Uri";

/// Configuration key selecting the Key Vault REST API version
pub const KEY_VAULT_API_VERSION_KEY: &str = "KeyVaultClientApiVersion";

/// Key Vault REST API version used when none is configured
pub const DEFAULT_KEY_VAULT_API_VERSION: &str = "7.5";

/// Token handed out by the static credential in Pact mode
pub const PACT_ACCESS_TOKEN: &str = "test-token";

/// Key Vault client retry: initial delay (milliseconds)
pub const DEFAULT_RETRY_DELAY_MS: i64 = 1000;

/// Key Vault client retry: maximum delay (milliseconds)
pub const DEFAULT_RETRY_MAX_DELAY_MS: i64 = 1000;

/// Key Vault client retry: maximum number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Environment variable selecting the execution environment
pub const ENVIRONMENT_VAR: &str = "SERVICE_ENVIRONMENT";

/// Fallback environment variable set by the Functions host
pub const FUNCTIONS_ENVIRONMENT_VAR: &str = "AZURE_FUNCTIONS_ENVIRONMENT";

/// Value logged by the metric line of the logging endpoints
pub const LOG_METRIC_VALUE: f64 = 100.0;
