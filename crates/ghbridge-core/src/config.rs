//! Configuration management for ghbridge.
//!
//! Handles loading and saving configuration from TOML files.
//! Config files are stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/ghbridge/config.toml`
//! - **Windows**: `%APPDATA%\ghbridge\config.toml`
//!
//! Credentials are never stored here; the config only names the
//! environment variables they are read from.
//!
//! # Example
//!
//! ```ignore
//! use ghbridge_core::config::Config;
//!
//! let mut config = Config::load()?;
//! config.set("server.read_timeout_secs", "120")?;
//! config.save()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::GITHUB_TOKEN_ENV;
use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "ghbridge";

/// Default GitHub MCP server image.
pub const DEFAULT_IMAGE: &str = "ghcr.io/github/github-mcp-server";

/// Default container name. Fixed so at most one worker runs per host.
pub const DEFAULT_CONTAINER_NAME: &str = "github-mcp-server";

/// Default environment variable holding the model proxy API key.
pub const MODEL_API_KEY_ENV: &str = "AIPROXY_API_KEY";

// =============================================================================
// Configuration structures
// =============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker process (MCP server) configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model proxy configuration
    #[serde(default)]
    pub model: ModelConfig,
}

/// How to launch and talk to the MCP worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Program to execute
    pub command: String,
    /// Container image passed to `docker run`
    pub image: String,
    /// Fixed container name, removed on stop. Empty means no name
    pub container_name: String,
    /// Environment variable holding the GitHub token
    pub token_env: String,
    /// Extra `docker run` options inserted before the image
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
    /// Full argument list, replacing the generated `docker run` arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Deadline for each response line, in seconds
    pub read_timeout_secs: u64,
    /// Grace period before the worker is killed on stop, in seconds
    pub shutdown_timeout_secs: u64,
    /// Client name announced during the handshake
    pub client_name: String,
    /// Client version announced during the handshake
    pub client_version: String,
}

/// Model proxy (OpenAI-compatible chat completions) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Proxy base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model identifier forwarded to the proxy
    pub model_id: String,
    /// Environment variable holding the proxy API key
    pub api_key_env: String,
    /// Completion token limit
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Use the proxy's `/stream` route
    pub stream: bool,
    /// Value for the `X-Request-ID` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Value for the `X-Feature` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "docker".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            token_env: GITHUB_TOKEN_ENV.to_string(),
            extra_args: Vec::new(),
            args: None,
            read_timeout_secs: 60,
            shutdown_timeout_secs: 5,
            client_name: "ghbridge".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            model_id: "bedrock/claude-sonnet-4".to_string(),
            api_key_env: MODEL_API_KEY_ENV.to_string(),
            max_tokens: 30000,
            temperature: 0.7,
            stream: false,
            request_id: None,
            feature: None,
        }
    }
}

impl ServerConfig {
    /// Arguments passed to `command`.
    ///
    /// Without an explicit `args` override this is
    /// `run -i [--name NAME] -e TOKEN_ENV [extra_args...] IMAGE`. The token
    /// is referenced by name so its value never shows up in `ps` output.
    pub fn worker_args(&self) -> Vec<String> {
        if let Some(args) = &self.args {
            return args.clone();
        }

        let mut args = vec!["run".to_string(), "-i".to_string()];
        if let Some(name) = self.container() {
            args.push("--name".to_string());
            args.push(name.to_string());
        }
        args.push("-e".to_string());
        args.push(self.token_env.clone());
        args.extend(self.extra_args.iter().cloned());
        args.push(self.image.clone());
        args
    }

    /// Container name, treating an empty string as unset.
    pub fn container(&self) -> Option<&str> {
        Some(self.container_name.as_str()).filter(|name| !name.is_empty())
    }

    /// Container to remove when the worker stops.
    ///
    /// Only the generated `docker run` arguments carry `--name`, so an
    /// `args` override never owns a container.
    pub fn managed_container(&self) -> Option<&str> {
        match self.args {
            Some(_) => None,
            None => self.container(),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl ModelConfig {
    /// Full chat completions endpoint URL.
    pub fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.stream {
            format!("{}/stream/chat/completions", base)
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `server.image`, `model.model_id`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match section {
            "server" => {
                let config = &mut self.server;
                match field {
                    "command" => config.command = value.to_string(),
                    "image" => config.image = value.to_string(),
                    "container_name" | "container" => config.container_name = value.to_string(),
                    "token_env" => config.token_env = value.to_string(),
                    "read_timeout_secs" | "read_timeout" => {
                        config.read_timeout_secs = parse_value(key, value)?
                    }
                    "shutdown_timeout_secs" | "shutdown_timeout" => {
                        config.shutdown_timeout_secs = parse_value(key, value)?
                    }
                    "client_name" => config.client_name = value.to_string(),
                    "client_version" => config.client_version = value.to_string(),
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown server config field: {}",
                            field
                        )))
                    }
                }
            }
            "model" => {
                let config = &mut self.model;
                match field {
                    "base_url" | "url" => config.base_url = value.to_string(),
                    "model_id" | "model" => config.model_id = value.to_string(),
                    "api_key_env" => config.api_key_env = value.to_string(),
                    "max_tokens" => config.max_tokens = parse_value(key, value)?,
                    "temperature" => config.temperature = parse_value(key, value)?,
                    "stream" => config.stream = parse_value(key, value)?,
                    "request_id" => config.request_id = Some(value.to_string()),
                    "feature" => config.feature = Some(value.to_string()),
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown model config field: {}",
                            field
                        )))
                    }
                }
            }
            _ => {
                return Err(Error::Config(format!("Unknown config section: {}", section)));
            }
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `server.image`, `model.model_id`)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match section {
            "server" => {
                let config = &self.server;
                match field {
                    "command" => Ok(Some(config.command.clone())),
                    "image" => Ok(Some(config.image.clone())),
                    "container_name" | "container" => Ok(config.container().map(str::to_string)),
                    "token_env" => Ok(Some(config.token_env.clone())),
                    "read_timeout_secs" | "read_timeout" => {
                        Ok(Some(config.read_timeout_secs.to_string()))
                    }
                    "shutdown_timeout_secs" | "shutdown_timeout" => {
                        Ok(Some(config.shutdown_timeout_secs.to_string()))
                    }
                    "client_name" => Ok(Some(config.client_name.clone())),
                    "client_version" => Ok(Some(config.client_version.clone())),
                    _ => Err(Error::Config(format!(
                        "Unknown server config field: {}",
                        field
                    ))),
                }
            }
            "model" => {
                let config = &self.model;
                match field {
                    "base_url" | "url" => Ok(Some(config.base_url.clone())),
                    "model_id" | "model" => Ok(Some(config.model_id.clone())),
                    "api_key_env" => Ok(Some(config.api_key_env.clone())),
                    "max_tokens" => Ok(Some(config.max_tokens.to_string())),
                    "temperature" => Ok(Some(config.temperature.to_string())),
                    "stream" => Ok(Some(config.stream.to_string())),
                    "request_id" => Ok(config.request_id.clone()),
                    "feature" => Ok(config.feature.clone()),
                    _ => Err(Error::Config(format!(
                        "Unknown model config field: {}",
                        field
                    ))),
                }
            }
            _ => Err(Error::Config(format!("Unknown config section: {}", section))),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != 2 {
        return Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: section.field",
            key
        )));
    }
    Ok((parts[0], parts[1]))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value '{}' for {}", value, key)))
}

// =============================================================================
// Tests
// =============================================================================
