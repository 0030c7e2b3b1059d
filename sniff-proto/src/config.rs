/// Listener configuration, loaded from TOML and overridden from the command line.
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid bind address {0:?}: expected an IPv4 or IPv6 address")]
    BindAddr(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// ── Listener config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ListenerConfig {
    #[serde(default)]
    pub listener: ListenSection,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ListenSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LimitsConfig {
    /// Bytes read from each connection before it is closed.
    #[serde(default = "default_recv_size")]
    pub recv_size: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_sec: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            recv_size: default_recv_size(),
            max_connections: default_max_connections(),
            read_timeout_sec: default_read_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    /// Only print connections where a hostname was found.
    #[serde(default)]
    pub quiet: bool,
    /// One JSON object per line instead of plain text.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ListenerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Address to bind, from `listener.bind_addr` and `listener.port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .listener
            .bind_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::BindAddr(self.listener.bind_addr.clone()))?;
        Ok(SocketAddr::new(ip, self.listener.port))
    }

    /// Check the whole config and return the address to bind.
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        if self.limits.recv_size == 0 {
            return Err(ConfigError::Zero("limits.recv_size"));
        }
        if self.limits.max_connections == 0 {
            return Err(ConfigError::Zero("limits.max_connections"));
        }
        self.socket_addr()
    }
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_bind_addr() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    443
}
fn default_recv_size() -> usize {
    4096
}
fn default_max_connections() -> u32 {
    256
}
fn default_read_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

// ── Loaders ──────────────────────────────────────────────────────────

pub fn load_listener_config(path: &Path) -> Result<ListenerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = ListenerConfig::from_toml_str(&content)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}
