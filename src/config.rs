use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_interval_secs() -> u64 {
    30
}

/// Remote document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the document store, e.g. "http://localhost:8080"
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    /// Run one sync pass after every write command (default: false)
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    /// Period of the background sync loop
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            auto_sync: false,
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl SyncConfig {
    /// Returns true if sync is configured (has both server_url and api_key)
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite cache
    pub database_path: ConfigValue<PathBuf>,
    /// Name recorded as creator and reviewer on records
    pub operator: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    operator: Option<String>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path =
            ConfigValue::new(Self::default_data_dir().join("erp.db"), ConfigSource::Default);
        let mut operator = ConfigValue::new("admin".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Relative paths are relative to the config file
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(name) = file_config.operator {
                operator = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        if let Ok(db_path) = std::env::var("ERP_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("ERP_OPERATOR") {
            operator = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("ERP_SYNC_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("ERP_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }

        Ok(Self {
            database_path,
            operator,
            config_file,
            sync,
        })
    }

    /// Platform config directory plus `erp/` (e.g. ~/.config/erp on Linux).
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("erp")
    }

    /// Platform data directory plus `erp/` (e.g. ~/.local/share/erp on Linux).
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("erp")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load(Some(temp_dir.path().join("missing.yaml"))).unwrap();

        assert!(config.database_path.value.ends_with("erp.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert_eq!(config.operator.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.retry_base_ms, 500);
        assert_eq!(config.sync.retry_max_ms, 60_000);
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file_resolves_relative_db_path() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/school.db").unwrap();
        writeln!(file, "operator: bursar").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: http://localhost:8080").unwrap();
        writeln!(file, "  api_key: secret").unwrap();
        writeln!(file, "  auto_sync: true").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.database_path.value, temp_dir.path().join("data/school.db"));
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.operator.value, "bursar");
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.sync.is_configured());
        assert!(config.sync.auto_sync);
        // Unset sync fields keep their defaults
        assert_eq!(config.sync.interval_secs, 30);
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "operator: fromfile").unwrap();

        std::env::set_var("ERP_OPERATOR", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.operator.value, "fromenv");
        assert_eq!(config.operator.source, ConfigSource::Environment);

        std::env::remove_var("ERP_OPERATOR");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
