//! Master server configuration.
//!
//! Loaded from a JSON file (`config.json` by default). Every field has a
//! default, so a partial file only overrides what it names:
//!
//! ```json
//! {
//!     "max_servers_per_ip": 14,
//!     "server_timeout_interval": 360.0,
//!     "admins": [ { "name": "root", "password": "secret" } ]
//! }
//! ```

use log::warn;
use protocol::VersionInfo;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Longest key accepted by keyed BLAKE2b.
pub const MAX_HASH_KEY_LEN: usize = 64;
/// Longest personalization string accepted by BLAKE2b.
pub const MAX_HASH_PERSONAL_LEN: usize = 16;
/// Largest BLAKE2b output.
pub const MAX_HASH_LENGTH: usize = 64;
/// Longest interval or timeout a config may set (30 days).
pub const MAX_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Credentials of one administrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminEntry {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrent registrations allowed from one IP address.
    pub max_servers_per_ip: usize,
    /// Seconds between registry sweeps.
    pub cleanup_interval: f32,
    /// Seconds a server may stay silent before it is dropped.
    pub server_timeout_interval: f32,
    /// Lifetime of server and admin challenges, in seconds.
    pub challenge_timeout_interval: f32,
    pub admin_hash_length: usize,
    pub admin_hash_key: String,
    pub admin_hash_personal: String,
    #[serde(deserialize_with = "deserialize_version")]
    pub server_min_version: VersionInfo,
    #[serde(deserialize_with = "deserialize_version")]
    pub client_min_version: VersionInfo,
    pub admins: Vec<AdminEntry>,
    /// Packets a single IP may send per rate window.
    pub packet_rate_limit: u32,
    /// Length of the rate window, in seconds.
    pub rate_limit_interval: f32,
    /// Seconds an IP stays banned after exceeding the packet rate.
    pub rate_limit_ban_time: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_servers_per_ip: 14,
            cleanup_interval: 10.0,
            server_timeout_interval: 360.0,
            challenge_timeout_interval: 15.0,
            admin_hash_length: 64,
            admin_hash_key: "Half-Life".to_string(),
            admin_hash_personal: "Freeman".to_string(),
            server_min_version: VersionInfo::new(0, 19, Some(2)),
            client_min_version: VersionInfo::new(0, 19, Some(4)),
            admins: Vec::new(),
            packet_rate_limit: 100,
            rate_limit_interval: 1.0,
            rate_limit_ban_time: 60.0,
        }
    }
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<VersionInfo, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

impl Config {
    /// Loads and validates a config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load_file`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using default settings",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load_file(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("cleanup_interval", self.cleanup_interval),
            ("server_timeout_interval", self.server_timeout_interval),
            ("challenge_timeout_interval", self.challenge_timeout_interval),
            ("rate_limit_interval", self.rate_limit_interval),
            ("rate_limit_ban_time", self.rate_limit_ban_time),
        ];
        for (field, seconds) in intervals {
            match Duration::try_from_secs_f32(seconds) {
                Ok(duration) if !duration.is_zero() && duration <= MAX_INTERVAL => {}
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field,
                        reason: format!(
                            "{seconds} is not within (0, {}] seconds",
                            MAX_INTERVAL.as_secs()
                        ),
                    })
                }
            }
        }

        if self.max_servers_per_ip == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_servers_per_ip",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.packet_rate_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "packet_rate_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(1..=MAX_HASH_LENGTH).contains(&self.admin_hash_length) {
            return Err(ConfigError::InvalidValue {
                field: "admin_hash_length",
                reason: format!("{} is outside 1..={MAX_HASH_LENGTH}", self.admin_hash_length),
            });
        }
        if self.admin_hash_key.len() > MAX_HASH_KEY_LEN {
            return Err(ConfigError::InvalidValue {
                field: "admin_hash_key",
                reason: format!("longer than {MAX_HASH_KEY_LEN} bytes"),
            });
        }
        if self.admin_hash_personal.len() > MAX_HASH_PERSONAL_LEN {
            return Err(ConfigError::InvalidValue {
                field: "admin_hash_personal",
                reason: format!("longer than {MAX_HASH_PERSONAL_LEN} bytes"),
            });
        }
        Ok(())
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs_f32(self.cleanup_interval)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.server_timeout_interval)
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.challenge_timeout_interval)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs_f32(self.rate_limit_interval)
    }

    pub fn rate_limit_ban_time(&self) -> Duration {
        Duration::from_secs_f32(self.rate_limit_ban_time)
    }
}
