//! Configuration management for Posture components

use posture_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default agent configuration path
pub const DEFAULT_AGENT_CONFIG: &str = "/etc/posture/agent.toml";

/// Default server configuration path
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/posture/server.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent settings (only used by posture-agent)
    #[serde(default)]
    pub agent: AgentConfig,

    /// Evidence probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Server settings (only used by posture-server)
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (POSTURE_ prefix)
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge values from an arbitrary variable source
    pub fn merge_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Agent settings
        if let Some(val) = lookup("POSTURE_ENDPOINT") {
            self.agent.endpoint = val;
        }
        if let Some(val) = lookup("POSTURE_API_KEY") {
            self.agent.api_key = Some(val.clone());
            self.server.api_key = Some(val);
        }
        if let Some(val) = lookup("POSTURE_HOSTNAME") {
            self.agent.hostname = Some(val);
        }
        if let Some(val) = lookup("POSTURE_CHECKS_DIR") {
            self.agent.checks_dir = Some(val);
        }
        if let Some(val) = lookup("POSTURE_MAX_WORKERS") {
            if let Ok(n) = val.parse() {
                self.agent.max_workers = n;
            }
        }

        // Probe settings
        if let Some(val) = lookup("POSTURE_PROBE_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.probe.timeout_seconds = n;
            }
        }

        // Server settings
        if let Some(val) = lookup("POSTURE_BIND") {
            self.server.bind = val;
        }

        // Logging
        if let Some(val) = lookup("POSTURE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("POSTURE_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }
}

/// Agent-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Ingestion server base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Shared API key sent as X-Api-Key
    pub api_key: Option<String>,

    /// Override for the reported hostname
    pub hostname: Option<String>,

    /// Directory of additional YAML check definitions
    pub checks_dir: Option<String>,

    /// Concurrent check workers (0 = number of CPUs)
    #[serde(default)]
    pub max_workers: usize,

    /// Submission attempts before giving up
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_endpoint() -> String {
    String::from("http://localhost:8080")
}

fn default_submit_attempts() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            hostname: None,
            checks_dir: None,
            max_workers: 0,
            submit_attempts: default_submit_attempts(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    /// Worker count with the CPU default applied
    pub fn effective_workers(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_workers
        }
    }
}

/// Evidence probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Timeout for every spawned command, in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_probe_timeout(),
        }
    }
}

/// Ingestion server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Required X-Api-Key value; unset disables the check
    pub api_key: Option<String>,

    /// Optimistic upsert attempts per ingestion
    #[serde(default = "default_ingest_attempts")]
    pub ingest_attempts: u32,
}

fn default_bind() -> String {
    String::from("0.0.0.0:8080")
}

fn default_ingest_attempts() -> u32 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: None,
            ingest_attempts: default_ingest_attempts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.agent.endpoint = endpoint.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.agent.api_key = Some(key.clone());
        self.config.server.api_key = Some(key);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.agent.hostname = Some(hostname.into());
        self
    }

    pub fn checks_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.agent.checks_dir = Some(dir.into());
        self
    }

    pub fn probe_timeout(mut self, seconds: u64) -> Self {
        self.config.probe.timeout_seconds = seconds;
        self
    }

    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.server.bind = addr.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
