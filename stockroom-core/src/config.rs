//! Configuration management

use crate::error::{ErrorContext, StockroomError, StockroomResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level client configuration, stored as TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StockroomConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the warehouse REST backend, e.g. `http://localhost:3000/api`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_seconds: 30,
            user_agent: format!("stockroom/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where the durable store lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the durable store; `~` expands to the home directory
    pub data_dir: String,
    /// File name of the durable store inside `data_dir`
    pub durable_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.stockroom".to_string(),
            durable_file: "local-storage.json".to_string(),
        }
    }
}

impl StorageConfig {
    /// Absolute path of the durable store file
    pub fn durable_path(&self) -> PathBuf {
        expand_home(&self.data_dir).join(&self.durable_file)
    }
}

/// Authorization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Role names treated as administrators (case-insensitive)
    pub admin_role_names: Vec<String>,
    /// Role ids treated as administrators
    pub admin_role_ids: Vec<i64>,
    /// Where unauthenticated visitors are sent
    pub sign_in_path: String,
    /// Where visitors lacking a permission are sent
    pub home_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_role_names: vec!["admin".to_string(), "warehouse_manager".to_string()],
            admin_role_ids: vec![1],
            sign_in_path: "/sign-in".to_string(),
            home_path: "/".to_string(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path {
        "~" => "",
        _ => match path.strip_prefix("~/") {
            Some(rest) => rest,
            None => return PathBuf::from(path),
        },
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

impl StockroomConfig {
    /// Default config location: `<config dir>/stockroom/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stockroom")
            .join("config.toml")
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> StockroomResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StockroomError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: StockroomConfig = toml::from_str(&content).map_err(|e| StockroomError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> StockroomResult<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> StockroomResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| StockroomError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| StockroomError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> StockroomResult<()> {
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(StockroomError::Config {
                message: format!("api.base_url is not a valid URL: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use an absolute URL such as http://localhost:3000/api"),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(crate::validation_error!(
                "api.timeout_seconds",
                "request timeout must be greater than 0"
            ));
        }

        for (field, value) in [
            ("auth.sign_in_path", &self.auth.sign_in_path),
            ("auth.home_path", &self.auth.home_path),
        ] {
            if !value.starts_with('/') {
                return Err(crate::validation_error!(field, "route must start with '/'"));
            }
        }

        if self.storage.durable_file.is_empty() {
            return Err(crate::validation_error!(
                "storage.durable_file",
                "file name must not be empty"
            ));
        }

        Ok(())
    }
}
