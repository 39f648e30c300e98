//! Configuration for the canned-reply server and client.
//!
//! The server supports both command-line arguments and a TOML configuration
//! file. CLI arguments take precedence over config file values. With neither,
//! both programs use the fixed endpoints `0.0.0.0:8080` and `127.0.0.1:8080`.

use crate::response::ResponseKind;
use clap::Parser;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Default server bind address.
pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

/// Default client target address.
pub const DEFAULT_CONNECT: &str = "127.0.0.1:8080";

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 10;

/// Message the client sends when none is given.
pub const DEFAULT_MESSAGE: &str = "Hello, Server!";

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(version)]
#[command(about = "Accepts TCP connections and answers each with a fixed response", long_about = None)]
pub struct ServerArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of pending connections queued by the OS
    #[arg(short = 'b', long)]
    pub backlog: Option<i32>,

    /// Which fixed response to send
    #[arg(short = 'r', long, value_enum)]
    pub response: Option<ResponseKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(version)]
#[command(about = "Sends one message to the server and prints the reply", long_about = None)]
pub struct ClientArgs {
    /// Server address to connect to
    #[arg(short = 'a', long, default_value = DEFAULT_CONNECT)]
    pub connect: String,

    /// Message to send
    #[arg(short = 'm', long, default_value = DEFAULT_MESSAGE)]
    pub message: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening endpoint configuration
#[derive(Debug, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
        }
    }
}

/// Response configuration
#[derive(Debug, Deserialize, Default)]
pub struct ResponseConfig {
    #[serde(default)]
    pub kind: ResponseKind,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub backlog: i32,
    pub response: ResponseKind,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            backlog: DEFAULT_BACKLOG,
            response: ResponseKind::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: ServerArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let backlog = cli.backlog.unwrap_or(toml_config.server.backlog);
        if backlog < 1 {
            return Err(ConfigError::InvalidBacklog(backlog));
        }

        Ok(Config {
            listen: parse_addr(&listen)?,
            backlog,
            response: cli.response.unwrap_or(toml_config.response.kind),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect: SocketAddr,
    pub message: String,
    pub log_level: String,
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ClientArgs::parse())
    }

    pub fn from_args(cli: ClientArgs) -> Result<Self, ConfigError> {
        Ok(ClientConfig {
            connect: parse_addr(&cli.connect)?,
            message: cli.message,
            log_level: cli.log_level,
        })
    }
}

fn parse_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse()
        .map_err(|e| ConfigError::InvalidAddress(addr.to_string(), e))
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidAddress(String, std::net::AddrParseError),
    InvalidBacklog(i32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidAddress(addr, e) => {
                write!(f, "Invalid socket address '{}': {}", addr, e)
            }
            ConfigError::InvalidBacklog(backlog) => {
                write!(f, "Invalid backlog {}: must be at least 1", backlog)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
