//! Server configuration.
//!
//! Every field has a default, so the server runs without a file. A YAML
//! file can be given on the command line, and `LISTEN` overrides the
//! listen address either way.

use anyhow::{Context, ensure};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Depth of the kernel accept queue.
    pub backlog: i32,
    /// Size of the connection slot pool. The listener keeps one slot for
    /// itself, so at most `max_connections - 1` clients are served at once.
    pub max_connections: usize,
    /// Readiness events handled per loop iteration.
    pub max_events: usize,
    /// Capacity of each connection's request and response buffers.
    pub header_capacity: usize,
    /// Capacity of each connection's token list.
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticFilesConfig {
    /// Directory request targets are resolved under.
    pub root: PathBuf,
    /// Value of the `Server` response header.
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            static_files: StaticFilesConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8081".to_string(),
            backlog: 10,
            max_connections: libc::SOMAXCONN as usize,
            max_events: 20,
            header_capacity: 4096,
            max_tokens: 128,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            server_name: "httpc".to_string(),
        }
    }
}

impl Config {
    /// Defaults plus the `LISTEN` environment override.
    pub fn load() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Reads a YAML file, then applies the `LISTEN` environment override.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut cfg = Self::from_yaml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("LISTEN") {
            self.server.listen_addr = addr;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let server = &self.server;
        ensure!(server.backlog > 0, "backlog must be positive");
        ensure!(
            server.max_connections >= 2,
            "max_connections must leave room for the listener and one client"
        );
        ensure!(server.max_events > 0, "max_events must be positive");
        ensure!(
            server.header_capacity >= 64,
            "header_capacity must be at least 64 bytes"
        );
        ensure!(
            server.max_tokens >= 3,
            "max_tokens must hold a request line"
        );
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {}", self.server.listen_addr))
    }
}
