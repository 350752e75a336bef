use relay_hub::{HubConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// File config (figment-deserialized from defaults / relay.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   relay.toml:      [session]
//                    idle_timeout_secs = 30
//
//   env var:         RELAY_SESSION__IDLE_TIMEOUT_SECS=30   (double underscore = nesting)
//
//   CLI:             relay serve --port 9000   (host/port only)

pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub hub: HubFileConfig,
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// Listener and HTTP knobs (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Largest inbound WebSocket message accepted, in KiB.
    #[serde(default = "default_max_frame_kb")]
    pub max_frame_kb: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            static_dir: default_static_dir(),
            max_frame_kb: default_max_frame_kb(),
        }
    }
}

/// Hub knobs (lives under `[hub]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubFileConfig {
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

impl Default for HubFileConfig {
    fn default() -> Self {
        Self {
            command_capacity: default_command_capacity(),
        }
    }
}

/// Per-connection knobs (lives under `[session]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionFileConfig {
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// 0 disables the idle timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionFileConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_max_frame_kb() -> usize {
    64
}
fn default_command_capacity() -> usize {
    1024
}
fn default_mailbox_capacity() -> usize {
    256
}
fn default_idle_timeout_secs() -> u64 {
    60
}

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

/// Build a figment that layers: defaults → relay.toml → RELAY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `RELAY_SERVER__PORT=9000`  →  `server.port = 9000`
///   `RELAY_SESSION__MAILBOX_CAPACITY=64`  →  `session.mailbox_capacity = 64`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let toml_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(toml_path))
        .merge(Env::prefixed("RELAY_").split("__"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid listen address {host}:{port}")]
    Address { host: String, port: u16 },
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Directory served at `/`
    pub static_dir: PathBuf,
    pub max_frame_bytes: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Result<Self, ConfigError> {
        if fc.max_frame_kb == 0 {
            return Err(ConfigError::Zero("server.max_frame_kb"));
        }

        let host = fc.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = fc.port.unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{}:{}", host, port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Address { host, port })?;

        Ok(Self {
            listen_addr,
            static_dir: fc.static_dir.clone(),
            max_frame_bytes: fc.max_frame_kb * 1024,
        })
    }
}

/// Everything the server needs at runtime.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub session: SessionConfig,
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self, ConfigError> {
        if fc.hub.command_capacity == 0 {
            return Err(ConfigError::Zero("hub.command_capacity"));
        }
        if fc.session.mailbox_capacity == 0 {
            return Err(ConfigError::Zero("session.mailbox_capacity"));
        }

        Ok(Self {
            server: ServerConfig::from_file(&fc.server)?,
            hub: HubConfig {
                command_capacity: fc.hub.command_capacity,
            },
            session: SessionConfig {
                mailbox_capacity: fc.session.mailbox_capacity,
                idle_timeout: if fc.session.idle_timeout_secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(fc.session.idle_timeout_secs))
                },
            },
        })
    }
}
