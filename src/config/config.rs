//! Config file handling

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ReqchainError, Result};

/// Overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "REQCHAIN_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";
const CACHE_FILE: &str = "cache.json";
const COOKIE_FILE: &str = "cookies.json";

/// Where a store keeps its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

impl FromStr for StorageBackend {
    type Err = ReqchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            other => Err(ReqchainError::Config(format!(
                "unknown storage backend '{}' (expected memory or file)",
                other
            ))),
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub cache: StorageBackend,
    pub cookies: StorageBackend,
    /// Directory for file backends; the config directory when unset
    pub dir: Option<PathBuf>,
}

/// reqchain configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub config_dir: PathBuf,
    /// `[defaults] strict`
    pub strict: bool,
    /// `[defaults] timeout`, e.g. `"30s"`
    pub timeout: Option<Duration>,
    /// `[defaults] placeholder`: lenient-mode text for undefined variables
    pub placeholder: Option<String>,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dir(Self::default_config_dir())
    }
}

impl Config {
    fn with_dir(config_dir: PathBuf) -> Self {
        Self {
            config_dir,
            strict: false,
            timeout: None,
            placeholder: None,
            storage: StorageConfig::default(),
        }
    }

    /// Load configuration from the config file (TOML format)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_dir())
    }

    /// Missing file means defaults
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join(CONFIG_FILE);
        if !config_file.exists() {
            return Ok(Self::with_dir(config_dir.to_path_buf()));
        }

        let content = std::fs::read_to_string(&config_file)
            .map_err(|e| ReqchainError::Config(format!("Failed to read config: {}", e)))?;
        Self::parse(&content, config_dir)
    }

    pub fn parse(content: &str, config_dir: &Path) -> Result<Self> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| ReqchainError::Config(format!("Invalid config TOML: {}", e)))?;

        let defaults = toml_value.get("defaults");
        let strict = defaults
            .and_then(|d| d.get("strict"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let timeout = match defaults.and_then(|d| d.get("timeout")) {
            None => None,
            Some(toml::Value::String(s)) => Some(humantime::parse_duration(s).map_err(|e| {
                ReqchainError::Config(format!("Invalid timeout '{}': {}", s, e))
            })?),
            Some(toml::Value::Integer(secs)) if *secs > 0 => Some(Duration::from_secs(*secs as u64)),
            Some(other) => {
                return Err(ReqchainError::Config(format!("Invalid timeout: {}", other)));
            }
        };

        let placeholder = defaults
            .and_then(|d| d.get("placeholder"))
            .and_then(|v| v.as_str())
            .map(String::from);

        let storage_section = toml_value.get("storage");
        let backend = |key: &str| -> Result<StorageBackend> {
            storage_section
                .and_then(|s| s.get(key))
                .and_then(|v| v.as_str())
                .map(str::parse)
                .transpose()
                .map(Option::unwrap_or_default)
        };
        let storage = StorageConfig {
            cache: backend("cache")?,
            cookies: backend("cookies")?,
            dir: storage_section
                .and_then(|s| s.get("dir"))
                .and_then(|v| v.as_str())
                .map(|dir| {
                    let path = PathBuf::from(dir);
                    // Relative paths are relative to the config dir
                    if path.is_absolute() {
                        path
                    } else {
                        config_dir.join(path)
                    }
                }),
        };

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            strict,
            timeout,
            placeholder,
            storage,
        })
    }

    /// Get the default config directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|p| p.join("reqchain"))
            .unwrap_or_else(|| PathBuf::from(".reqchain"))
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| self.config_dir.clone())
    }

    pub fn cache_file(&self) -> PathBuf {
        self.storage_dir().join(CACHE_FILE)
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.storage_dir().join(COOKIE_FILE)
    }
}
