//! Relay configuration.
//!
//! Defaults reproduce the reference behavior: TCP port 5900, at most 5
//! concurrent clients, 256-byte messages, IPv6 listener (IPv4 clients reach
//! it through mapped addresses on dual-stack hosts).
//!
//! Precedence, lowest to highest: built-in defaults, config file, `CHATTER_*`
//! environment variables, CLI flags (applied by the binaries).

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Default TCP port for the relay.
pub const DEFAULT_PORT: u16 = 5900;

/// Default maximum number of concurrent clients.
pub const DEFAULT_MAX_CLIENTS: usize = 5;

/// Default maximum message size in bytes (one read = one message).
pub const DEFAULT_MAX_MESSAGE: usize = 256;

/// Address family the listening socket binds under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrFamily {
    /// Bind `0.0.0.0`.
    V4,
    /// Bind `[::]`. On dual-stack hosts this also accepts mapped IPv4.
    #[default]
    V6,
}

impl AddrFamily {
    /// Returns the wildcard address for this family.
    pub fn unspecified(&self) -> IpAddr {
        match self {
            AddrFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddrFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl FromStr for AddrFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(AddrFamily::V4),
            "v6" | "ipv6" | "6" => Ok(AddrFamily::V6),
            other => Err(ConfigError::InvalidFieldValue {
                field: "family".to_string(),
                value: other.to_string(),
                expected: "v4 or v6".to_string(),
            }),
        }
    }
}

/// Configuration for a relay server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// TCP port to listen on. Port 0 binds an ephemeral port.
    pub port: u16,

    /// Maximum concurrent clients; also the listen backlog, so overflow
    /// connections queue in the kernel instead of being accepted.
    pub max_clients: usize,

    /// Maximum message size in bytes per read.
    pub max_message: usize,

    /// Address family of the listening socket.
    pub family: AddrFamily,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_message: DEFAULT_MAX_MESSAGE,
            family: AddrFamily::default(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `CHATTER_PORT`, `CHATTER_MAX_CLIENTS`, `CHATTER_MAX_MESSAGE`
    /// and `CHATTER_FAMILY` overrides from the environment. Unparseable
    /// values are logged and ignored rather than fatal.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = env::var("CHATTER_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid CHATTER_PORT"),
            }
        }
        if let Ok(max) = env::var("CHATTER_MAX_CLIENTS") {
            match max.parse() {
                Ok(m) if m > 0 => self.max_clients = m,
                _ => warn!(value = %max, "Ignoring invalid CHATTER_MAX_CLIENTS"),
            }
        }
        if let Ok(max) = env::var("CHATTER_MAX_MESSAGE") {
            match max.parse() {
                Ok(m) if m > 0 => self.max_message = m,
                _ => warn!(value = %max, "Ignoring invalid CHATTER_MAX_MESSAGE"),
            }
        }
        if let Ok(family) = env::var("CHATTER_FAMILY") {
            match family.parse() {
                Ok(f) => self.family = f,
                Err(_) => warn!(value = %family, "Ignoring invalid CHATTER_FAMILY"),
            }
        }
        self
    }

    /// Validates field ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "max_clients".to_string(),
                value: "0".to_string(),
                expected: "at least 1".to_string(),
            });
        }
        if self.max_message == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "max_message".to_string(),
                value: "0".to_string(),
                expected: "at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the socket address the server should bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.family.unspecified(), self.port)
    }
}
