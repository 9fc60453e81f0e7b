//! Configuration file management.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gamalta_core::SessionConfig;
use serde::{Deserialize, Serialize};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default device name or address
    #[serde(default)]
    pub device: Option<String>,

    /// Default output format ("text" or "json")
    #[serde(default)]
    pub format: Option<String>,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Delay between frames in milliseconds
    #[serde(default)]
    pub pacing_ms: Option<u64>,

    /// Handshake step timeout in seconds
    #[serde(default)]
    pub handshake_timeout_secs: Option<u64>,

    /// Login password, if changed from the factory default
    #[serde(default)]
    pub password: Option<String>,

    /// Device aliases (friendly name -> device address)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Last successfully connected device (auto-updated)
    #[serde(default)]
    pub last_device: Option<String>,

    /// Name of the last connected device (for display)
    #[serde(default)]
    pub last_device_name: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gamalta")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from a specific file, or return default if it is missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Build the session configuration, applying any overrides from the file.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut session = SessionConfig::default();
        if let Some(ms) = self.pacing_ms {
            session = session.pacing(Duration::from_millis(ms));
        }
        if let Some(secs) = self.handshake_timeout_secs {
            session = session.handshake_timeout(Duration::from_secs(secs));
        }
        if let Some(password) = &self.password {
            session = session.password(password.clone());
        }
        session
            .validate()
            .context("Invalid session settings in config file")?;
        Ok(session)
    }
}

/// Resolve device from arg, env var, or config.
/// Also resolves aliases: if the device matches an alias name, returns the address.
/// Falls back to last_device if no default device is set.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .map(|d| resolve_alias(&d, config))
        .or_else(|| config.device.clone())
        .or_else(|| config.last_device.clone())
}

/// Resolve an alias to its device address, or return the original if not an alias.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    config
        .aliases
        .get(device)
        .cloned()
        .unwrap_or_else(|| device.to_string())
}

/// Update the last connected device in config.
/// This is called after a successful connection.
pub fn update_last_device(identifier: &str, name: Option<&str>) -> Result<()> {
    let mut config = Config::load();
    if config.last_device.as_deref() == Some(identifier) && name.is_none() {
        return Ok(());
    }
    config.last_device = Some(identifier.to_string());
    if name.is_some() {
        config.last_device_name = name.map(|n| n.to_string());
    }
    config.save()
}

/// Resolve timeout: use provided value, fall back to config, then default
pub fn resolve_timeout(cmd_timeout: u64, config: &Config, default: u64) -> u64 {
    // clap fills in the default, so only a differing value was typed explicitly
    if cmd_timeout != default {
        cmd_timeout
    } else {
        config.timeout.unwrap_or(default)
    }
}
