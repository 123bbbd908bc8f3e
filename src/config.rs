//! Proxy configuration.
//!
//! Loaded once at startup from a YAML file and passed down explicitly.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//!   buffer_size: 4096
//! proxy:
//!   target_host: "http://example.com/"
//!   target_port: 80
//! pool:
//!   min_threads: 3
//!   max_threads: 20
//!   idle_timeout_secs: 3
//! log:
//!   level: info
//! plugins:
//!   - kind: deny_path
//!     prefix: /admin
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::proxy::builtin::PluginConfig;

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Upper bound for a single socket read.
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            buffer_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Bare host or URL; scheme and path are stripped on load.
    pub target_host: String,
    #[serde(default = "default_target_port")]
    pub target_port: u16,
}

fn default_target_port() -> u16 {
    80
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_threads: usize,
    pub max_threads: usize,
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_threads: 3,
            max_threads: 20,
            idle_timeout_secs: 3,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    None,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
            LogLevel::None => LevelFilter::OFF,
        }
    }
}

impl Config {
    /// Loads from `$FORWARDER_CONFIG` (or `./config.yaml`), then applies the
    /// `LISTEN` override.
    pub fn load() -> Result<Self> {
        let path = std::env::var("FORWARDER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::from_file(Path::new(&path))?;

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
            cfg.validate()?;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        cfg.proxy.normalize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.proxy.target_host.is_empty() {
            problems.push("proxy.target_host must not be empty".to_string());
        }
        if self.server.listen_addr.parse::<SocketAddr>().is_err() {
            problems.push(format!(
                "server.listen_addr {:?} is not a socket address",
                self.server.listen_addr
            ));
        }
        if self.server.buffer_size == 0 {
            problems.push("server.buffer_size must be positive".to_string());
        }
        if self.pool.max_threads == 0 {
            problems.push("pool.max_threads must be at least 1".to_string());
        }
        if self.pool.min_threads > self.pool.max_threads {
            problems.push(format!(
                "pool.min_threads ({}) exceeds pool.max_threads ({})",
                self.pool.min_threads, self.pool.max_threads
            ));
        }
        if self.pool.idle_timeout_secs == 0 {
            problems.push("pool.idle_timeout_secs must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Bad config: {}", problems.join(", "))
        }
    }
}

impl ProxyConfig {
    // "http://api.internal:8081/v1" -> host "api.internal", port 8081
    fn normalize(&mut self) -> Result<()> {
        let raw = self.target_host.trim();
        if !raw.contains("://") {
            self.target_host = raw.split('/').next().unwrap_or_default().to_string();
            return Ok(());
        }

        let url = url::Url::parse(raw)
            .with_context(|| format!("Invalid proxy.target_host {raw:?}"))?;
        let host = url.host_str().context("proxy.target_host is missing a host")?;

        self.target_host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        if let Some(port) = url.port() {
            self.target_port = port;
        }
        Ok(())
    }
}
