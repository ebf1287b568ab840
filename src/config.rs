// src/config.rs

//! Manages broker configuration: loading from a TOML file, applying
//! environment overrides, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

/// The fallback offset between a node's public API port and its RPC port,
/// used when no explicit entry exists in `rpc_map` (8000 → 50051).
pub const RPC_PORT_OFFSET: u16 = 42051;

/// Cluster membership and partitioning settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterConfig {
    /// Public addresses of the peer nodes, excluding this node.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// This node's public address. Its port is also the HTTP listen port.
    #[serde(default = "default_self_host")]
    pub self_host: String,
    /// The port this node's inter-node RPC endpoint listens on.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    /// If false, every node serves every request and mutations are
    /// broadcast to all peers.
    #[serde(default = "default_partitioning_enabled")]
    pub partitioning_enabled: bool,
    /// Number of nodes holding each topic/queue, primary included.
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    /// Explicit public-address → RPC-address table. Entries here take
    /// precedence over the port-offset fallback.
    #[serde(default)]
    pub rpc_map: HashMap<String, String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            self_host: default_self_host(),
            rpc_port: default_rpc_port(),
            partitioning_enabled: default_partitioning_enabled(),
            replication_factor: default_replication_factor(),
            rpc_map: HashMap::new(),
        }
    }
}

/// Token issuance settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing key for access tokens.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_token_expire_minutes")]
    pub token_expire_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            token_expire_minutes: default_token_expire_minutes(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// The validated broker configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Interface the HTTP and RPC listeners bind to.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Location of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            log_level: default_log_level(),
            database_path: default_database_path(),
            cluster: ClusterConfig::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_database_path() -> String {
    "citrinemq.db".to_string()
}
fn default_self_host() -> String {
    "localhost:8000".to_string()
}
fn default_rpc_port() -> u16 {
    50051
}
fn default_partitioning_enabled() -> bool {
    true
}
fn default_replication_factor() -> usize {
    2
}
fn default_secret_key() -> String {
    "citrine-dev-secret".to_string()
}
fn default_token_expire_minutes() -> i64 {
    60
}
fn default_metrics_port() -> u16 {
    9600
}

impl Config {
    /// Parses a configuration file.
    pub fn from_file(path: &str) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        Ok(config)
    }

    /// Loads the configuration: the TOML file if present, then environment
    /// overrides, then validation. A missing file is not an error; the
    /// defaults plus the environment describe a working single node.
    pub fn load(path: &str) -> Result<Config> {
        let mut config = if Path::new(path).exists() {
            Config::from_file(path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the environment variables understood by the cluster launcher.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(nodes) = env::var("CLUSTER_NODES") {
            self.cluster.nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(self_host) = env::var("SELF_HOST") {
            self.cluster.self_host = self_host;
        }
        if let Ok(port) = env::var("GRPC_PORT") {
            self.cluster.rpc_port = port
                .parse()
                .map_err(|_| anyhow!("GRPC_PORT is not a valid port: '{port}'"))?;
        }
        if let Ok(enabled) = env::var("PARTITIONING_ENABLED") {
            self.cluster.partitioning_enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Ok(factor) = env::var("PARTITION_REPLICATION_FACTOR") {
            self.cluster.replication_factor = factor
                .parse()
                .map_err(|_| anyhow!("PARTITION_REPLICATION_FACTOR is not a number: '{factor}'"))?;
        }
        if let Ok(secret) = env::var("SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Ok(minutes) = env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.auth.token_expire_minutes = minutes.parse().map_err(|_| {
                anyhow!("ACCESS_TOKEN_EXPIRE_MINUTES is not a number: '{minutes}'")
            })?;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            // Accept both a bare path and a sqlite:// URL.
            self.database_path = url
                .strip_prefix("sqlite://")
                .unwrap_or(url.as_str())
                .to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.replication_factor < 1 {
            return Err(anyhow!("cluster.replication_factor must be at least 1"));
        }
        parse_port(&self.cluster.self_host)
            .ok_or_else(|| anyhow!("cluster.self_host must be host:port"))?;
        for node in &self.cluster.nodes {
            parse_port(node).ok_or_else(|| anyhow!("cluster node '{node}' must be host:port"))?;
        }
        if self.auth.secret_key == default_secret_key() {
            warn!("auth.secret_key is the built-in default; set SECRET_KEY in production");
        }
        Ok(())
    }

    /// The HTTP listen port, taken from the public address.
    pub fn api_port(&self) -> u16 {
        parse_port(&self.cluster.self_host).unwrap_or(8000)
    }

    /// Overrides the public API port, keeping the host part.
    pub fn set_api_port(&mut self, port: u16) {
        let host = self
            .cluster
            .self_host
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| self.cluster.self_host.clone());
        self.cluster.self_host = format!("{host}:{port}");
    }

    /// Resolves a peer's public address to its RPC address: the configured
    /// table first, else the fixed port offset.
    pub fn rpc_addr_for(&self, public_addr: &str) -> Option<String> {
        if let Some(mapped) = self.cluster.rpc_map.get(public_addr) {
            return Some(mapped.clone());
        }
        let (host, port) = public_addr.rsplit_once(':')?;
        let port: u16 = port.parse().ok()?;
        Some(format!("{host}:{}", port.checked_add(RPC_PORT_OFFSET)?))
    }
}

fn parse_port(addr: &str) -> Option<u16> {
    addr.rsplit_once(':')?.1.parse().ok()
}
