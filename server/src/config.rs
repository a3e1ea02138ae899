use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// Only flags that were given (directly or through their env var) are layered
// over the file, so the value defaults live in `Config::default`.
/// Pulse realtime server
#[derive(Parser, Serialize, Clone, Debug)]
#[command(name = "pulse-server", version, about = "Pulse realtime presence and fan-out server")]
pub struct Cli {
    /// Port to listen on [default: 1985]
    #[arg(long, env = "PULSE_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "PULSE_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./pulse.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PULSE_JSON_LOGS")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys) [default: ./data]
    #[arg(long, env = "PULSE_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub config: String,
    pub json_logs: bool,
    pub generate_config: bool,
    pub data_dir: String,

    /// Socket timing ([realtime] section)
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Status feed intervals ([status] section)
    #[serde(default)]
    pub status: StatusConfig,

    /// Per event kind kill-switches ([dynamic_updates] section)
    #[serde(default)]
    pub dynamic_updates: HashMap<String, bool>,
}

/// Timing of the realtime socket lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Time a fresh socket has to select a channel (default: 2000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

impl RealtimeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

/// Sampling intervals of the two status feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Host resource feed interval in seconds (default: 6)
    #[serde(default = "default_short_interval")]
    pub short_interval_secs: u64,

    /// Database aggregate feed interval in seconds (default: 60)
    #[serde(default = "default_long_interval")]
    pub long_interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            short_interval_secs: 6,
            long_interval_secs: 60,
        }
    }
}

impl StatusConfig {
    pub fn short_interval(&self) -> Duration {
        Duration::from_secs(self.short_interval_secs.max(1))
    }

    pub fn long_interval(&self) -> Duration {
        Duration::from_secs(self.long_interval_secs.max(1))
    }
}

fn default_short_interval() -> u64 {
    6
}

fn default_long_interval() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1985,
            bind_address: "0.0.0.0".to_string(),
            config: "./pulse.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            realtime: RealtimeConfig::default(),
            status: StatusConfig::default(),
            dynamic_updates: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PULSE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self, figment::Error> {
        Self::figment(&cli.config)
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Defaults, TOML and environment layers. Nested keys use `__`,
    /// e.g. `PULSE_REALTIME__CONNECT_TIMEOUT_MS=5000`.
    fn figment(config_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PULSE_").split("__"))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Pulse Realtime Server Configuration
# Place this file at ./pulse.toml or specify with --config <path>
# All settings can be overridden via environment variables (PULSE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 1985)
# port = 1985

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# ---- Realtime Sockets ----
# [realtime]

# A new socket must send connect-main or connect-status within this window
# connect_timeout_ms = 2000

# Keepalive: ping every N seconds, close if no pong within M seconds
# ping_interval_secs = 30
# pong_timeout_secs = 10

# ---- Status Feeds ----
# [status]

# Host resources (CPU, memory, load) sampling interval
# short_interval_secs = 6

# Database row counts and connection totals sampling interval
# long_interval_secs = 60

# ---- Dynamic Updates ----
# [dynamic_updates]
# Kinds not listed stay enabled. Set false to stop pushing a kind.
# message-new = true
# message-edit = true
# message-delete = true
# chat-membership-change = true
# chat-settings-change = true
# user-settings-change = true
# presence-change = true
# status-resources = true
# status-database = true
"#
    .to_string()
}
