use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Host-level configuration, loaded from `config.toml` under the platform
/// config directory. A missing file means defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Logical clock rate in ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    /// Forces the scheduler mode instead of running the capability probe.
    /// Useful on staging hosts where the probe is known to misreport.
    #[serde(default)]
    pub region_capable_override: Option<bool>,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_tick_rate() -> u32 {
    20
}

fn default_log_file() -> String {
    "blockhost.log".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            region_capable_override: None,
            log_file: default_log_file(),
        }
    }
}

impl HostConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("blockhost")
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".blockhost")
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using default config");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: HostConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config with tick rate {}", config.tick_rate);
        Ok(config)
    }

    /// Wall-clock length of one logical tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
