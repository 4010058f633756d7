//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Analytics cache settings.
    pub cache: CacheConfig,
    /// Metrics endpoint settings.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// ```
    /// use footfall_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.cache.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                Err(_) => errors.push(ValidationError::new(
                    "server.bind",
                    format!("invalid port '{}': must be a number 1-65535", port),
                )),
                Ok(_) => {}
            },
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: footfall_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        errors
    }
}

/// Where cached analytics live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process cache; nothing is shared with other services.
    #[default]
    Memory,
    /// Redis server, shared with other consumers of the scalar keys.
    Redis,
}

/// Minimum cache TTL in seconds.
pub const MIN_CACHE_TTL: u64 = 1;
/// Maximum cache TTL in seconds (one week).
pub const MAX_CACHE_TTL: u64 = 7 * 24 * 3600;

/// Analytics cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Lifetime of every cache entry, in seconds.
    ///
    /// Defaults to [`DEFAULT_TTL`](footfall_analytics::cache::DEFAULT_TTL)
    /// (one hour). Any other value is an operator override: every entry the
    /// service writes, primary and fan-out alike, then lives this long
    /// instead.
    pub ttl_secs: u64,
    /// Connection URL, required for the redis backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    /// Entry limit for the memory backend.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_secs: footfall_analytics::cache::DEFAULT_TTL.as_secs(),
            redis_url: None,
            max_capacity: footfall_analytics::cache::DEFAULT_MAX_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(MIN_CACHE_TTL..=MAX_CACHE_TTL).contains(&self.ttl_secs) {
            errors.push(ValidationError::new(
                "cache.ttl_secs",
                format!(
                    "ttl {} is out of range ({}-{} seconds)",
                    self.ttl_secs, MIN_CACHE_TTL, MAX_CACHE_TTL
                ),
            ));
        }

        if self.max_capacity == 0 {
            errors.push(ValidationError::new(
                "cache.max_capacity",
                "max capacity must be greater than 0",
            ));
        }

        if self.backend == CacheBackend::Redis {
            match self.redis_url.as_deref() {
                None | Some("") => errors.push(ValidationError::new(
                    "cache.redis_url",
                    "redis_url is required when backend is 'redis'",
                )),
                Some(url) if !(url.starts_with("redis://") || url.starts_with("rediss://")) => {
                    errors.push(ValidationError::new(
                        "cache.redis_url",
                        format!(
                            "invalid redis url '{}': must start with redis:// or rediss://",
                            url
                        ),
                    ))
                }
                Some(_) => {}
            }
        }

        errors
    }

    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

/// Prometheus metrics endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `cache.redis_url`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("footfall")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, footfall_store::default_db_path());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let config = Config {
            server: ServerConfig {
                bind: "0.0.0.0:9090".to_string(),
            },
            storage: StorageConfig {
                path: PathBuf::from("/tmp/footfall.db"),
            },
            cache: CacheConfig {
                backend: CacheBackend::Redis,
                ttl_secs: 600,
                redis_url: Some("redis://127.0.0.1:6379".to_string()),
                max_capacity: 500,
            },
            metrics: MetricsConfig { enabled: false },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/footfall.db"));
        assert_eq!(loaded.cache.backend, CacheBackend::Redis);
        assert_eq!(loaded.cache.ttl_secs, 600);
        assert_eq!(
            loaded.cache.redis_url.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
        assert!(!loaded.metrics.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [cache]
            ttl_secs = 120
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/server.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[cache\nbackend = ").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let toml = r#"
            [cache]
            backend = "memcached"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_server_bind_validation() {
        let cases = [
            ("", "cannot be empty"),
            ("localhost", "expected format"),
            ("127.0.0.1:0", "port cannot be 0"),
            ("127.0.0.1:http", "invalid port"),
        ];
        for (bind, expected) in cases {
            let config = ServerConfig {
                bind: bind.to_string(),
            };
            let errors = config.validate();
            assert_eq!(errors.len(), 1, "bind {:?}", bind);
            assert!(errors[0].message.contains(expected), "bind {:?}", bind);
        }

        let ok = ServerConfig {
            bind: "[::1]:8080".to_string(),
        };
        assert!(ok.validate().is_empty());
    }

    #[test]
    fn test_cache_validation() {
        let zero_ttl = CacheConfig {
            ttl_secs: 0,
            ..Default::default()
        };
        let errors = zero_ttl.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "cache.ttl_secs");

        let no_url = CacheConfig {
            backend: CacheBackend::Redis,
            ..Default::default()
        };
        let errors = no_url.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("required"));

        let bad_url = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: Some("http://localhost".to_string()),
            ..Default::default()
        };
        let errors = bad_url.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("redis://"));

        let zero_capacity = CacheConfig {
            max_capacity: 0,
            ..Default::default()
        };
        assert_eq!(zero_capacity.validate().len(), 1);
    }

    #[test]
    fn test_config_validation_error_display() {
        let config = Config {
            server: ServerConfig {
                bind: String::new(),
            },
            cache: CacheConfig {
                ttl_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Configuration validation failed"));
        assert!(message.contains("server.bind"));
        assert!(message.contains("cache.ttl_secs"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("footfall/server.toml"));
    }
}
