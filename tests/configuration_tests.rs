//! Configuration accessor over layered sources

mod common;

use common::configuration;
use std::io::Write;
use std::sync::Arc;
use vault_services::config::{
    ConfigurationSource, EnvConfigSource, Environment, JsonFileConfigSource, LayeredConfigSource,
    MemoryConfigSource, ServiceConfiguration,
};
use vault_services::constants::CERTIFICATE_THUMBPRINT_KEY;
use vault_services::ServiceError;

#[test]
fn test_int_values() {
    let config = configuration(
        Environment::Production,
        &[("Port", "8080"), ("Retries", "abc"), ("Blank", "  ")],
    );

    assert_eq!(config.get_int_value("Port").unwrap(), Some(8080));
    assert_eq!(config.get_int_value("port").unwrap(), Some(8080));
    assert_eq!(config.get_int_value("Retries").unwrap(), None);
    assert_eq!(config.get_int_value("Blank").unwrap(), None);
    assert_eq!(config.get_int_value("Absent").unwrap(), None);
}

#[test]
fn test_required_bytes() {
    let config = configuration(
        Environment::Production,
        &[("Key", "not base64!"), ("Signing:Key", "aGVsbG8=")],
    );

    let err = config.get_required_bytes("Key").unwrap_err();
    assert!(matches!(err, ServiceError::Format(_)));

    assert_eq!(config.get_required_bytes("Signing:Key").unwrap(), b"hello");

    let err = config.get_required_bytes("Missing").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Value cannot be null or empty. (Parameter 'Missing')"
    );
}

#[test]
fn test_thumbprint_is_required_at_construction() {
    let source = Arc::new(MemoryConfigSource::from_pairs([("ServiceAddress", "https://x.example.com")]));
    let err = ServiceConfiguration::with_environment(source, Environment::Production).unwrap_err();
    assert!(
        matches!(err, ServiceError::InvalidArgument(ref key) if key == CERTIFICATE_THUMBPRINT_KEY)
    );
}

#[test]
fn test_json_file_under_memory_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "KeyVault": {{
                "Uri": "contoso",
                "Certificates": {{ "Thumbprint": "FROM-FILE" }}
            }},
            "Logging": {{ "Level": "Information", "Retention": 7 }}
        }}"#
    )
    .unwrap();

    let overrides = MemoryConfigSource::from_pairs([("Logging:Level", "Debug")]);
    let layered = LayeredConfigSource::new()
        .with(JsonFileConfigSource::new(file.path(), false).unwrap())
        .with(overrides);
    let config =
        ServiceConfiguration::with_environment(Arc::new(layered), Environment::Staging).unwrap();

    assert_eq!(config.get_value("Logging:Level").unwrap().as_deref(), Some("Debug"));
    assert_eq!(config.get_int_value("Logging:Retention").unwrap(), Some(7));
    assert_eq!(
        config.key_vault_uri().unwrap(),
        "https://contoso.vault.azure.net/"
    );

    let children: Vec<String> = config
        .children_of(Some("Logging"))
        .unwrap()
        .into_iter()
        .map(|section| section.key)
        .collect();
    assert_eq!(children.len(), 2);
    assert!(children[0].eq_ignore_ascii_case("Level"));
    assert!(children[1].eq_ignore_ascii_case("Retention"));
}

#[test]
fn test_environment_variables_use_double_underscore() {
    std::env::set_var("VAULT_SERVICES_IT_KeyVault__Certificates__Thumbprint", "FROM-ENV");
    std::env::set_var("VAULT_SERVICES_IT_KeyVaultClientApiVersion", "V7_4");

    let source = EnvConfigSource::new(Some("VAULT_SERVICES_IT_"));
    assert_eq!(
        source
            .get("KeyVault:Certificates:Thumbprint")
            .unwrap()
            .as_deref(),
        Some("FROM-ENV")
    );

    let config =
        ServiceConfiguration::with_environment(Arc::new(source), Environment::Production).unwrap();
    assert_eq!(config.key_vault_api_version().unwrap(), "7.4");
}

#[tokio::test]
async fn test_reload_token_fires_on_change() {
    let memory = Arc::new(MemoryConfigSource::from_pairs([(
        CERTIFICATE_THUMBPRINT_KEY,
        "ABC",
    )]));
    let layered = LayeredConfigSource::new().with_shared(memory.clone());
    let config =
        ServiceConfiguration::with_environment(Arc::new(layered), Environment::Local).unwrap();

    let mut token = config.reload_token();
    assert!(!token.has_changed());

    memory.set("ServiceUrl", "/api").unwrap();
    assert!(token.changed().await);
    assert_eq!(config.get("ServiceUrl").unwrap().as_deref(), Some("/api"));
}

#[cfg(unix)]
#[test]
fn test_environment_with_non_unicode_variables() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::env::set_var("VAULT_SERVICES_NU_Raw", OsStr::from_bytes(&[0xff, 0xfe]));
    std::env::set_var("VAULT_SERVICES_NU_Port", "8080");

    let source = EnvConfigSource::new(Some("VAULT_SERVICES_NU_"));
    assert_eq!(source.get("Definitely:Absent").unwrap(), None);
    assert_eq!(source.get("port").unwrap().as_deref(), Some("8080"));
    assert!(matches!(
        source.get("Raw").unwrap_err(),
        ServiceError::Configuration { .. }
    ));

    let keys = source.keys().unwrap();
    assert!(keys.contains(&"Port".to_string()));
    assert!(!keys.contains(&"Raw".to_string()));
}
