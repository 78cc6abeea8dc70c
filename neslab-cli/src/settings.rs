//! Persistent settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use neslab_link::{LinkConfig, TransportKind, DEFAULT_BAUD_RATE};
use neslab_protocol::{Address, Interface};
use neslab_sim::VirtualChillerConfig;
use serde::{Deserialize, Serialize};

/// Saved connection and simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Serial port used when no transport is given on the command line
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate for serial links
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// TCP address of a serial-to-Ethernet adapter
    #[serde(default)]
    pub tcp: Option<String>,
    /// Serial response timeout in milliseconds
    #[serde(default = "default_serial_timeout")]
    pub serial_timeout_ms: u64,
    /// TCP response timeout in milliseconds
    #[serde(default = "default_tcp_timeout")]
    pub tcp_timeout_ms: u64,
    #[serde(default)]
    pub interface: Interface,
    #[serde(default)]
    pub address: Address,
    /// Listen address for `simulate`
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Virtual chiller served by `simulate`
    #[serde(default)]
    pub simulator: VirtualChillerConfig,
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_serial_timeout() -> u64 {
    TransportKind::Serial.default_timeout().as_millis() as u64
}

fn default_tcp_timeout() -> u64 {
    TransportKind::Tcp.default_timeout().as_millis() as u64
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud(),
            tcp: None,
            serial_timeout_ms: default_serial_timeout(),
            tcp_timeout_ms: default_tcp_timeout(),
            interface: Interface::default(),
            address: Address::default(),
            listen: default_listen(),
            simulator: VirtualChillerConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for neslab
    /// Uses $XDG_CONFIG_HOME/neslab on Linux/macOS, falls back to ~/.config/neslab
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("neslab"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("neslab"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Link settings for a transport kind
    pub fn link_config(&self, kind: TransportKind) -> LinkConfig {
        let timeout_ms = match kind {
            TransportKind::Serial => self.serial_timeout_ms,
            TransportKind::Tcp => self.tcp_timeout_ms,
        };
        LinkConfig {
            timeout: Duration::from_millis(timeout_ms),
            interface: self.interface,
            address: self.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("neslab-settings-{}-{}", std::process::id(), name))
            .join("settings.json")
    }

    #[test]
    fn test_defaults_match_link_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(
            settings.link_config(TransportKind::Serial),
            LinkConfig::default()
        );
        assert_eq!(
            settings.link_config(TransportKind::Tcp),
            LinkConfig::for_transport(TransportKind::Tcp)
        );
    }

    #[test]
    fn test_save_and_load() {
        let path = scratch_file("roundtrip");
        let settings = Settings {
            port: Some("/dev/ttyUSB0".to_string()),
            interface: Interface::MultiDrop,
            address: Address::new(0x00, 0x05),
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = scratch_file("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "tcp": "10.0.0.7:4001" }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.tcp.as_deref(), Some("10.0.0.7:4001"));
        assert_eq!(settings.tcp_timeout_ms, 2000);
        assert_eq!(settings.listen, "127.0.0.1:5000");

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = scratch_file("missing");
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
