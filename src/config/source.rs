//! # Configuration Sources
//!
//! Key/value providers behind the configuration accessor.
//!
//! Keys are colon-delimited paths (`KeyVault:Certificates:Thumbprint`) and are
//! matched case-insensitively. Every source hands out a [`ReloadToken`] that
//! completes when the source's contents change.
//!
//! Sources:
//! - [`MemoryConfigSource`] - in-memory map, mutable at runtime
//! - [`EnvConfigSource`] - process environment, `A:B` read from `A__B`
//! - [`JsonFileConfigSource`] - JSON file read with `config`, flattened into colon paths
//! - [`DotenvConfigSource`] - `.env` file parsed with `dotenvy`
//! - [`LayeredConfigSource`] - stack of sources, later layers win

use crate::error::{Result, ServiceError};
use futures::future::select_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// Separator between path segments in configuration keys
pub const KEY_DELIMITER: &str = ":";

/// Separator used in environment variable and `.env` names in place of `:`
pub const ENV_KEY_DELIMITER: &str = "__";

/// A key/value configuration provider
pub trait ConfigurationSource: Send + Sync + std::fmt::Debug {
    /// Value for `key`, or `None` when the source has no such key
    ///
    /// # Errors
    /// Returns [`ServiceError::Configuration`] when the source cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// All keys this source currently holds
    ///
    /// # Errors
    /// Returns [`ServiceError::Configuration`] when the source cannot be read
    fn keys(&self) -> Result<Vec<String>>;

    /// Token that completes when this source's contents change
    fn reload_token(&self) -> ReloadToken;
}

/// Change notification handed out by configuration sources
///
/// A token merged from several sources fires when any of them changes.
#[derive(Debug, Clone)]
pub struct ReloadToken {
    receivers: Vec<watch::Receiver<u64>>,
}

impl ReloadToken {
    fn single(receiver: watch::Receiver<u64>) -> Self {
        Self {
            receivers: vec![receiver],
        }
    }

    /// Combine tokens into one that fires on any change
    pub fn merge(tokens: impl IntoIterator<Item = ReloadToken>) -> Self {
        Self {
            receivers: tokens.into_iter().flat_map(|t| t.receivers).collect(),
        }
    }

    /// True when a change happened since the token was created or last awaited
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.receivers
            .iter()
            .any(|rx| rx.has_changed().unwrap_or(false))
    }

    /// Wait for the next change
    ///
    /// Returns `false` when there is nothing left to watch.
    pub async fn changed(&mut self) -> bool {
        if self.receivers.is_empty() {
            return false;
        }
        let waits = self.receivers.iter_mut().map(|rx| Box::pin(rx.changed()));
        let (result, _, _) = select_all(waits).await;
        result.is_ok()
    }
}

/// Case-insensitive flat key/value store with change notification
///
/// Shared by the map-backed sources.
#[derive(Debug)]
struct FlatStore {
    entries: RwLock<BTreeMap<String, (String, String)>>,
    changes: watch::Sender<u64>,
}

impl FlatStore {
    fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            entries: RwLock::new(index(pairs)),
            changes,
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|e| poisoned(key, &e))?;
        Ok(entries
            .get(&key.to_lowercase())
            .map(|(_, value)| value.clone()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|e| poisoned("*", &e))?;
        Ok(entries.values().map(|(key, _)| key.clone()).collect())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| poisoned(key, &e))?
            .insert(key.to_lowercase(), (key.to_string(), value.to_string()));
        self.notify();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .entries
            .write()
            .map_err(|e| poisoned(key, &e))?
            .remove(&key.to_lowercase())
            .is_some();
        if removed {
            self.notify();
        }
        Ok(removed)
    }

    fn replace(&self, pairs: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        *self.entries.write().map_err(|e| poisoned("*", &e))? = index(pairs);
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    fn reload_token(&self) -> ReloadToken {
        ReloadToken::single(self.changes.subscribe())
    }
}

fn index(pairs: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, (String, String)> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), (key, value)))
        .collect()
}

fn poisoned(key: &str, error: &impl std::fmt::Display) -> ServiceError {
    ServiceError::configuration(key, format!("configuration store unavailable: {error}"))
}

/// `A__B` to `A:B`
fn from_env_name(name: &str) -> String {
    name.replace(ENV_KEY_DELIMITER, KEY_DELIMITER)
}

/// `A:B` to `A__B`
fn to_env_name(key: &str) -> String {
    key.replace(KEY_DELIMITER, ENV_KEY_DELIMITER)
}

/// In-memory configuration
#[derive(Debug)]
pub struct MemoryConfigSource {
    store: FlatStore,
}

impl Default for MemoryConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: FlatStore::new(std::iter::empty()),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            store: FlatStore::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into()))),
        }
    }

    /// Set `key` and notify reload tokens
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set(key, value)
    }

    /// Remove `key`, returning whether it was present
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.store.remove(key)
    }
}

impl ConfigurationSource for MemoryConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    fn reload_token(&self) -> ReloadToken {
        self.store.reload_token()
    }
}

/// Process environment
///
/// `KeyVault:Uri` is read from `KeyVault__Uri` (or `{prefix}KeyVault__Uri`).
#[derive(Debug)]
pub struct EnvConfigSource {
    prefix: Option<String>,
    changes: watch::Sender<u64>,
}

impl Default for EnvConfigSource {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EnvConfigSource {
    #[must_use]
    pub fn new(prefix: Option<&str>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            prefix: prefix.map(str::to_string),
            changes,
        }
    }

    fn variable_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix.as_deref().unwrap_or(""), to_env_name(key))
    }
}

/// Process environment entries whose name and value are both valid UTF-8
fn unicode_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(name, value)| {
        match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                debug!(variable = ?name, "Skipping environment variable that is not valid UTF-8");
                None
            }
        }
    })
}

impl ConfigurationSource for EnvConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let name = self.variable_name(key);
        if let Some(value) = std::env::var_os(&name) {
            return value.into_string().map(Some).map_err(|_| {
                ServiceError::configuration(key, format!("{name} is not valid UTF-8"))
            });
        }
        // Environment names are case-sensitive on most platforms
        let wanted = name.to_lowercase();
        Ok(unicode_vars()
            .find(|(candidate, _)| candidate.to_lowercase() == wanted)
            .map(|(_, value)| value))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let prefix = self.prefix.as_deref().unwrap_or("");
        Ok(unicode_vars()
            .filter_map(|(name, _)| name.strip_prefix(prefix).map(from_env_name))
            .collect())
    }

    fn reload_token(&self) -> ReloadToken {
        ReloadToken::single(self.changes.subscribe())
    }
}

/// JSON file flattened into colon-delimited keys
///
/// `{"KeyVault": {"Uri": "..."}}` yields `KeyVault:Uri`; array elements are
/// addressed by index (`Hosts:0`).
#[derive(Debug)]
pub struct JsonFileConfigSource {
    path: PathBuf,
    optional: bool,
    store: FlatStore,
}

impl JsonFileConfigSource {
    /// Load `path`
    ///
    /// # Errors
    /// Returns an error if the file is missing (unless `optional`) or is not valid JSON
    pub fn new(path: impl AsRef<Path>, optional: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let pairs = Self::load(&path, optional)?;
        info!(path = %path.display(), keys = pairs.len(), "Loaded JSON configuration");
        Ok(Self {
            path,
            optional,
            store: FlatStore::new(pairs),
        })
    }

    /// Re-read the file and notify reload tokens
    ///
    /// # Errors
    /// Returns an error if the file can no longer be read or parsed
    pub fn reload(&self) -> Result<()> {
        let pairs = Self::load(&self.path, self.optional)?;
        debug!(path = %self.path.display(), "Reloaded JSON configuration");
        self.store.replace(pairs)
    }

    fn load(path: &Path, optional: bool) -> Result<Vec<(String, String)>> {
        let document: serde_json::Value = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Json)
                    .required(!optional),
            )
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| ServiceError::configuration(path.display().to_string(), e.to_string()))?;

        let mut pairs = Vec::new();
        flatten_json(None, &document, &mut pairs);
        Ok(pairs)
    }
}

impl ConfigurationSource for JsonFileConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    fn reload_token(&self) -> ReloadToken {
        self.store.reload_token()
    }
}

fn flatten_json(prefix: Option<&str>, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    let join = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}{KEY_DELIMITER}{segment}"),
        None => segment.to_string(),
    };

    match value {
        serde_json::Value::Object(map) => {
            for (segment, child) in map {
                flatten_json(Some(&join(segment)), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(Some(&join(&index.to_string())), child, out);
            }
        }
        scalar => {
            if let Some(key) = prefix {
                let value = match scalar {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                out.push((key.to_string(), value));
            }
        }
    }
}

/// `.env` file, with `A__B` names exposed as `A:B`
#[derive(Debug)]
pub struct DotenvConfigSource {
    path: PathBuf,
    store: FlatStore,
}

impl DotenvConfigSource {
    /// Parse `path` without touching the process environment
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let pairs = Self::load(&path)?;
        info!(path = %path.display(), keys = pairs.len(), "Loaded dotenv configuration");
        Ok(Self {
            path,
            store: FlatStore::new(pairs),
        })
    }

    /// Re-read the file and notify reload tokens
    ///
    /// # Errors
    /// Returns an error if the file can no longer be read or parsed
    pub fn reload(&self) -> Result<()> {
        self.store.replace(Self::load(&self.path)?)
    }

    fn load(path: &Path) -> Result<Vec<(String, String)>> {
        let key = path.display().to_string();
        dotenvy::from_path_iter(path)
            .map_err(|e| ServiceError::configuration(key.clone(), e.to_string()))?
            .map(|item| {
                item.map(|(name, value)| (from_env_name(&name), value))
                    .map_err(|e| ServiceError::configuration(key.clone(), e.to_string()))
            })
            .collect()
    }
}

impl ConfigurationSource for DotenvConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    fn reload_token(&self) -> ReloadToken {
        self.store.reload_token()
    }
}

/// Ordered stack of sources; the last source holding a key wins
#[derive(Debug, Default)]
pub struct LayeredConfigSource {
    layers: Vec<Arc<dyn ConfigurationSource>>,
}

impl LayeredConfigSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer on top of the existing ones
    #[must_use]
    pub fn with(mut self, source: impl ConfigurationSource + 'static) -> Self {
        self.layers.push(Arc::new(source));
        self
    }

    /// Add a shared layer on top of the existing ones
    #[must_use]
    pub fn with_shared(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.layers.push(source);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ConfigurationSource for LayeredConfigSource {
    fn get(&self, key: &str) -> Result<Option<String>> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut seen = BTreeMap::new();
        for layer in &self.layers {
            for key in layer.keys()? {
                seen.entry(key.to_lowercase()).or_insert(key);
            }
        }
        Ok(seen.into_values().collect())
    }

    fn reload_token(&self) -> ReloadToken {
        ReloadToken::merge(self.layers.iter().map(|layer| layer.reload_token()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_lookup_is_case_insensitive() {
        let source = MemoryConfigSource::from_pairs([("KeyVault:Uri", "https://vault/")]);
        assert_eq!(
            source.get("keyvault:uri").unwrap().as_deref(),
            Some("https://vault/")
        );
        assert_eq!(source.keys().unwrap(), vec!["KeyVault:Uri".to_string()]);
    }

    #[test]
    fn test_memory_set_fires_reload_token() {
        let source = MemoryConfigSource::new();
        let token = source.reload_token();
        assert!(!token.has_changed());

        source.set("Port", "8080").unwrap();
        assert!(token.has_changed());
    }

    #[tokio::test]
    async fn test_merged_token_fires_for_any_layer() {
        let first = Arc::new(MemoryConfigSource::new());
        let second = Arc::new(MemoryConfigSource::new());
        let layered = LayeredConfigSource::new()
            .with_shared(Arc::clone(&first) as Arc<dyn ConfigurationSource>)
            .with_shared(Arc::clone(&second) as Arc<dyn ConfigurationSource>);

        let mut token = layered.reload_token();
        second.set("A", "1").unwrap();
        assert!(token.changed().await);
    }

    #[test]
    fn test_json_file_is_flattened() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"KeyVault": {{"Uri": "https://vault/", "Retries": 2}}, "Hosts": ["a", "b"]}}"#
        )
        .unwrap();

        let source = JsonFileConfigSource::new(file.path(), false).unwrap();
        assert_eq!(
            source.get("KeyVault:Uri").unwrap().as_deref(),
            Some("https://vault/")
        );
        assert_eq!(source.get("KeyVault:Retries").unwrap().as_deref(), Some("2"));
        assert_eq!(source.get("Hosts:1").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_missing_optional_json_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileConfigSource::new(dir.path().join("absent.json"), true).unwrap();
        assert!(source.keys().unwrap().is_empty());

        assert!(JsonFileConfigSource::new(dir.path().join("absent.json"), false).is_err());
    }

    #[test]
    fn test_dotenv_maps_double_underscore() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "KeyVault__Certificates__Thumbprint=ABC123").unwrap();
        writeln!(file, "Port=8080").unwrap();

        let source = DotenvConfigSource::new(file.path()).unwrap();
        assert_eq!(
            source
                .get("KeyVault:Certificates:Thumbprint")
                .unwrap()
                .as_deref(),
            Some("ABC123")
        );
        assert_eq!(source.get("Port").unwrap().as_deref(), Some("8080"));
    }

    #[test]
    fn test_later_layer_wins() {
        let layered = LayeredConfigSource::new()
            .with(MemoryConfigSource::from_pairs([("Port", "7071"), ("Name", "base")]))
            .with(MemoryConfigSource::from_pairs([("port", "8080")]));

        assert_eq!(layered.get("Port").unwrap().as_deref(), Some("8080"));
        assert_eq!(layered.get("Name").unwrap().as_deref(), Some("base"));
        assert_eq!(layered.keys().unwrap().len(), 2);
    }
}
