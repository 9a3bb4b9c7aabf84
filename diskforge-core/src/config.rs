//! Runtime configuration for the safety guard.
//!
//! Configuration can only make the guard stricter: it adds protected and
//! important mountpoints on top of the platform baseline and controls whether
//! incomplete system drive detection raises the risk level.

use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "DISKFORGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Mountpoints treated like `/`: any device holding one is critical.
    pub extra_protected_mountpoints: Vec<String>,
    /// Mountpoints that raise a device to at least `high`.
    pub extra_important_mountpoints: Vec<String>,
    /// Raise `low` devices to `high` when system drive detection was
    /// incomplete.
    pub escalate_degraded_detection: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            extra_protected_mountpoints: Vec::new(),
            extra_important_mountpoints: Vec::new(),
            escalate_degraded_detection: true,
        }
    }
}

impl GuardConfig {
    /// Loads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` if given, else the file named by [`CONFIG_ENV`], else
    /// returns the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => env::var_os(CONFIG_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        };

        match path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}
