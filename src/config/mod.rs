//! # Configuration
//!
//! Layered key/value configuration, the typed accessor over it, and the
//! process settings used by the binary.

pub mod accessor;
pub mod environment;
pub mod settings;
pub mod source;

pub use accessor::{ConfigSection, ServiceConfiguration};
pub use environment::Environment;
pub use settings::ServiceSettings;
pub use source::{
    ConfigurationSource, DotenvConfigSource, EnvConfigSource, JsonFileConfigSource,
    LayeredConfigSource, MemoryConfigSource, ReloadToken,
};
