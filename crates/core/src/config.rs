//! Configuration management for the AutoDPIA tooling.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.autodpia/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. Workspace state (token, local templates) lives in `.autodpia/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default AutoDPIA server endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Known storage backends.
pub const KNOWN_BACKENDS: [&str; 2] = ["remote", "local"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .autodpia/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Base URL of the AutoDPIA API
    pub server_url: String,

    /// Template storage backend ("remote" or "local")
    pub backend: String,

    /// Bearer token override (otherwise read from the token file)
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Interval between task polls in milliseconds
    pub poll_interval_ms: u64,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
    storage: Option<StorageConfig>,
    tasks: Option<TasksConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    url: Option<String>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageConfig {
    backend: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TasksConfig {
    #[serde(rename = "pollIntervalMs")]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            backend: "remote".to_string(),
            token: None,
            request_timeout_secs: 30,
            poll_interval_ms: 1000,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `AUTODPIA_WORKSPACE`: Override workspace path
    /// - `AUTODPIA_CONFIG`: Path to config file
    /// - `AUTODPIA_SERVER`: API base URL
    /// - `AUTODPIA_BACKEND`: Storage backend
    /// - `AUTODPIA_TOKEN`: Bearer token
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use autodpia_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Server: {}", config.server_url);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("AUTODPIA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("AUTODPIA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.autodpia_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(server) = std::env::var("AUTODPIA_SERVER") {
            config.server_url = server;
        }

        if let Ok(backend) = std::env::var("AUTODPIA_BACKEND") {
            config.backend = backend;
        }

        config.token = std::env::var("AUTODPIA_TOKEN").ok().filter(|t| !t.is_empty());

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(server) = config_file.server {
            if let Some(url) = server.url {
                result.server_url = url;
            }
            if let Some(timeout) = server.timeout_secs {
                result.request_timeout_secs = timeout;
            }
        }

        if let Some(backend) = config_file.storage.and_then(|s| s.backend) {
            result.backend = backend;
        }

        if let Some(interval) = config_file.tasks.and_then(|t| t.poll_interval_ms) {
            result.poll_interval_ms = interval;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        server_url: Option<String>,
        backend: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(server_url) = server_url {
            self.server_url = server_url;
        }

        if let Some(backend) = backend {
            self.backend = backend;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .autodpia directory.
    pub fn autodpia_dir(&self) -> PathBuf {
        self.workspace.join(".autodpia")
    }

    /// Ensure the .autodpia directory exists.
    pub fn ensure_autodpia_dir(&self) -> AppResult<()> {
        let dir = self.autodpia_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .autodpia directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the stored session token.
    pub fn token_path(&self) -> PathBuf {
        self.autodpia_dir().join("token")
    }

    /// Path of the working copy kept between commands.
    pub fn working_copy_path(&self) -> PathBuf {
        self.autodpia_dir().join("working.json")
    }

    /// Directory holding templates for the local backend.
    pub fn templates_dir(&self) -> PathBuf {
        self.autodpia_dir().join("templates")
    }

    /// Validate the backend choice and server URL.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_BACKENDS.contains(&self.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown backend: {}. Supported: {}",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if self.backend == "remote"
            && !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://"))
        {
            return Err(AppError::Config(format!(
                "Server URL must start with http:// or https://: {}",
                self.server_url
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "Task poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
