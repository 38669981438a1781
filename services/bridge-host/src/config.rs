//! Bridge-host configuration loading.
//!
//! TOML is the sole config source. Default config path:
//! `/etc/exthost-bridge/bridge-host.toml`.
//!
//! # Required fields
//! None — every field has a default suitable for local development.

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (deserialized from TOML)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub listen: ListenConfig,
    pub keep_alive_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Unix domain socket path, used everywhere except Windows.
    pub unix_path: String,
    /// Loopback TCP port, used on Windows (spec.md §1: the extension
    /// host communicates over a named pipe or loopback socket the OS
    /// determines; this core treats that choice as a config knob).
    pub tcp_port: u16,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    listen: Option<RawListenConfig>,
    keep_alive_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawListenConfig {
    unix_path: Option<String>,
    tcp_port: Option<u16>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    match path {
        Some(p) => load_config_from_path(p),
        None => {
            let default = Path::new("/etc/exthost-bridge/bridge-host.toml");
            if default.exists() {
                load_config_from_path(default)
            } else {
                load_config_from_str("")
            }
        }
    }
}

pub fn load_config_from_str(toml_str: &str) -> Result<BridgeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let listen = match raw.listen {
        Some(l) => ListenConfig {
            unix_path: l.unix_path.unwrap_or_else(|| "/tmp/exthost-bridge.sock".to_owned()),
            tcp_port: l.tcp_port.unwrap_or(33417),
        },
        None => ListenConfig {
            unix_path: "/tmp/exthost-bridge.sock".to_owned(),
            tcp_port: 33417,
        },
    };

    Ok(BridgeConfig {
        listen,
        keep_alive_enabled: raw.keep_alive_enabled.unwrap_or(true),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_all_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.listen.tcp_port, 33417);
        assert!(cfg.keep_alive_enabled);
    }

    #[test]
    fn overrides_are_honored() {
        let cfg = load_config_from_str(
            r#"
            keep_alive_enabled = false

            [listen]
            unix_path = "/run/exthost-bridge.sock"
            tcp_port = 9000
            "#,
        )
        .unwrap();
        assert!(!cfg.keep_alive_enabled);
        assert_eq!(cfg.listen.tcp_port, 9000);
        assert_eq!(cfg.listen.unix_path, "/run/exthost-bridge.sock");
    }
}
