//! Configuration file support for CapRock.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/caprock/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub limits: Limits,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Bounds applied by the registries
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_liquid_name_max")]
    pub liquid_name_max: usize,

    #[serde(default = "default_drink_name_max")]
    pub drink_name_max: usize,

    #[serde(default = "default_profile_name_max")]
    pub profile_name_max: usize,

    #[serde(default = "default_max_liquids_per_drink")]
    pub max_liquids_per_drink: usize,

    #[serde(default = "default_max_liquids")]
    pub max_liquids: usize,

    #[serde(default = "default_max_drinks")]
    pub max_drinks: usize,

    #[serde(default = "default_max_profiles")]
    pub max_profiles: usize,

    /// Smallest container fill and the fill increment, in fl oz
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,

    /// Container capacity in fl oz
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,

    /// Hours after which a fully decayed consumption record is pruned
    #[serde(default = "default_session_hours")]
    pub session_hours: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            liquid_name_max: default_liquid_name_max(),
            drink_name_max: default_drink_name_max(),
            profile_name_max: default_profile_name_max(),
            max_liquids_per_drink: default_max_liquids_per_drink(),
            max_liquids: default_max_liquids(),
            max_drinks: default_max_drinks(),
            max_profiles: default_max_profiles(),
            volume_step: default_volume_step(),
            max_volume: default_max_volume(),
            session_hours: default_session_hours(),
        }
    }
}

impl Limits {
    /// Session window as a chrono duration
    pub fn session_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session_hours))
    }

    /// Reject limits the registries cannot honour
    pub fn validate(&self) -> Result<()> {
        if !(self.volume_step > 0.0) {
            return Err(Error::Config("volume_step must be positive".into()));
        }
        if self.max_volume < self.volume_step {
            return Err(Error::Config(
                "max_volume must be at least one volume_step".into(),
            ));
        }
        let steps = self.max_volume / self.volume_step;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(Error::Config(
                "max_volume must be a multiple of volume_step".into(),
            ));
        }
        let counts = [
            ("liquid_name_max", self.liquid_name_max),
            ("drink_name_max", self.drink_name_max),
            ("profile_name_max", self.profile_name_max),
            ("max_liquids_per_drink", self.max_liquids_per_drink),
            ("max_liquids", self.max_liquids),
            ("max_drinks", self.max_drinks),
            ("max_profiles", self.max_profiles),
        ];
        for (key, value) in counts {
            if value == 0 {
                return Err(Error::Config(format!("{} must be non-zero", key)));
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("caprock")
}

fn default_liquid_name_max() -> usize {
    24
}

fn default_drink_name_max() -> usize {
    24
}

fn default_profile_name_max() -> usize {
    12
}

fn default_max_liquids_per_drink() -> usize {
    4
}

fn default_max_liquids() -> usize {
    64
}

fn default_max_drinks() -> usize {
    16
}

fn default_max_profiles() -> usize {
    8
}

fn default_volume_step() -> f64 {
    0.5
}

fn default_max_volume() -> f64 {
    16.0
}

fn default_session_hours() -> u32 {
    8
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(config_path) if config_path.exists() => Self::load_from(&config_path),
            path => {
                tracing::info!("No config file found at {:?}, using defaults", path);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.limits.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("caprock").join("config.toml"))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
