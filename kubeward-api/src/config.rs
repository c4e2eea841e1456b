//! Configuration management for Kubeward
//!
//! Settings are resolved from, highest priority first:
//! 1. Environment variables (`KUBEWARD_*`)
//! 2. Configuration file (TOML format)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KubewardConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub kubernetes: KubernetesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite:///var/lib/kubeward/kubeward.db")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Enable JSON file logging in addition to the console
    pub file_logging_enabled: bool,
}

/// Bearer token verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer
    pub jwt_secret: String,
}

/// Cluster client and background sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Lifetime of a cached cluster client
    pub client_cache_ttl_secs: u64,
    /// Upper bound on connect and version probes
    pub connect_timeout_secs: u64,
    /// Background namespace sync workers
    pub sync_workers: usize,
    /// Pending sync jobs before new ones are dropped
    pub sync_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:///var/lib/kubeward/kubeward.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("/var/log/kubeward"),
            file_logging_enabled: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            client_cache_ttl_secs: 600,
            connect_timeout_secs: 10,
            sync_workers: 4,
            sync_queue_capacity: 256,
        }
    }
}

impl KubewardConfig {
    /// Load configuration from the first config file found, then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.clone(), e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("KUBEWARD_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("/etc/kubeward/config.toml")),
            Some(PathBuf::from("./kubeward.toml")),
        ];

        paths.into_iter()
            .flatten()
            .find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server
        if let Some(host) = var("KUBEWARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("KUBEWARD_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        // Database
        if let Some(url) = var("KUBEWARD_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = var("KUBEWARD_DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.max_connections = max;
        }

        // Logging
        if let Some(level) = var("KUBEWARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(path) = var("KUBEWARD_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(path);
        }
        if let Some(enabled) = var("KUBEWARD_FILE_LOGGING") {
            self.logging.file_logging_enabled = enabled.parse().unwrap_or(false);
        }

        // Auth
        if let Some(secret) = var("KUBEWARD_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        // Kubernetes
        if let Some(ttl) = var("KUBEWARD_CLIENT_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.kubernetes.client_cache_ttl_secs = ttl;
        }
        if let Some(timeout) = var("KUBEWARD_CONNECT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.kubernetes.connect_timeout_secs = timeout;
        }
        if let Some(workers) = var("KUBEWARD_SYNC_WORKERS").and_then(|v| v.parse().ok()) {
            self.kubernetes.sync_workers = workers;
        }
        if let Some(capacity) = var("KUBEWARD_SYNC_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.kubernetes.sync_queue_capacity = capacity;
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("Port cannot be 0".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("Database URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "Database max_connections must be at least 1".to_string()
            ));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "JWT secret must be at least 32 bytes".to_string()
            ));
        }

        let k8s = &self.kubernetes;
        if k8s.client_cache_ttl_secs == 0 || k8s.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Client cache TTL and connect timeout must be non-zero".to_string()
            ));
        }
        if k8s.sync_workers == 0 || k8s.sync_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "Sync workers and queue capacity must be non-zero".to_string()
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
