mod convert;
mod source;

pub use convert::{ConfigValue, FromConfigValue};

use source::Source;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No source provides the requested key.
    Missing(String),
    /// A source provides the key but it does not parse as the requested
    /// type.
    WrongType { key: String, expected: &'static str },
    /// A config file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A config file or inline snippet is not valid yaml.
    Invalid { origin: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "missing configuration key `{key}`")
            }
            ConfigError::WrongType { key, expected } => {
                write!(f, "configuration key `{key}` is not a valid {expected}")
            }
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            ConfigError::Invalid { origin, message } => {
                write!(f, "malformed yaml in {origin}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Layered application configuration.
///
/// A lookup walks a priority chain until a source answers: programmatic
/// overrides first, then the process environment
/// (`server.request_queue_size` answers to `SERVER_REQUEST_QUEUE_SIZE`),
/// then the profile document, then the base document. Yaml files are kept
/// as parsed trees and navigated by dot-path on demand; numeric segments
/// index into sequences (`server.listen_addresses.1`).
pub struct KeelConfig {
    // highest priority first
    sources: Vec<Source>,
    profile: String,
}

impl KeelConfig {
    /// Load `application.yaml` and `application-{profile}.yaml` from the
    /// working directory.
    ///
    /// The profile argument yields to `KEEL_PROFILE` when that is set.
    /// `.env` and `.env.{profile}` seed the process environment first,
    /// never clobbering variables that are already set.
    pub fn load(default_profile: &str) -> Result<Self, ConfigError> {
        let profile =
            std::env::var("KEEL_PROFILE").unwrap_or_else(|_| default_profile.to_owned());
        let _ = dotenvy::dotenv();
        let _ = dotenvy::from_filename(format!(".env.{profile}"));
        let mut config = Self {
            sources: vec![Source::Overrides(HashMap::new()), Source::Environment],
            profile,
        };
        let profile_file = format!("application-{}.yaml", config.profile);
        for path in [Path::new(&profile_file), Path::new("application.yaml")] {
            if let Some(document) = source::optional_document(path)? {
                config.sources.push(Source::Document(document));
            }
        }
        tracing::debug!(
            profile = %config.profile,
            sources = config.sources.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load one yaml file, which must exist. The environment is not
    /// consulted.
    pub fn from_yaml_file(
        path: impl AsRef<Path>,
        profile: &str,
    ) -> Result<Self, ConfigError> {
        let document = source::required_document(path.as_ref())?;
        Ok(Self {
            sources: vec![
                Source::Overrides(HashMap::new()),
                Source::Document(document),
            ],
            profile: profile.to_owned(),
        })
    }

    /// Build from an inline yaml snippet, hermetically (useful for tests).
    pub fn from_yaml_str(text: &str, profile: &str) -> Result<Self, ConfigError> {
        let document = source::parse_document(text, "<inline>")?;
        Ok(Self {
            sources: vec![
                Source::Overrides(HashMap::new()),
                Source::Document(document),
            ],
            profile: profile.to_owned(),
        })
    }

    /// An empty configuration (useful for tests).
    pub fn empty() -> Self {
        Self {
            sources: vec![Source::Overrides(HashMap::new())],
            profile: "test".to_owned(),
        }
    }

    /// Override a key programmatically; wins over every other source.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        if let Some(Source::Overrides(map)) = self.sources.first_mut() {
            map.insert(key.to_owned(), value);
        }
    }

    /// Get a typed value for the given dot-separated key.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when no source answers,
    /// [`ConfigError::WrongType`] when the value does not parse as `V`.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::Missing(key.to_owned()))?;
        V::parse(&value).ok_or_else(|| ConfigError::WrongType {
            key: key.to_owned(),
            expected: V::EXPECTED,
        })
    }

    /// Get a typed value, falling back to a default when the key is
    /// missing or malformed.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Whether any source answers for the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    fn lookup(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|source| source.lookup(key))
    }
}

impl fmt::Debug for KeelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeelConfig")
            .field("profile", &self.profile)
            .field("sources", &self.sources.len())
            .finish()
    }
}
