//! Engine configuration
//!
//! Loaded from an optional TOML file, then overridden by `SONATA_*`
//! environment variables (`SONATA_HIBERNATION_DELAY_MS=5000`,
//! `SONATA_WIDENER__WET_MIX=0.3`).

use serde::{Deserialize, Serialize};
use sonata_audio::effects::WidenerSettings;
use sonata_audio::EqualizerPreset;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values parsed but are out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pause length after which resources are released (ms)
    #[serde(default = "default_hibernation_delay_ms")]
    pub hibernation_delay_ms: u64,

    /// End-of-stream poll interval while playing (ms)
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    /// Initial output volume, linear 0.0 - 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub stereo_widening: bool,

    /// Initial equalizer preset name
    #[serde(default = "default_equalizer_preset")]
    pub equalizer_preset: String,

    #[serde(default)]
    pub widener: WidenerSettings,
}

fn default_hibernation_delay_ms() -> u64 {
    30_000
}

fn default_watchdog_interval_ms() -> u64 {
    10_000
}

fn default_volume() -> f32 {
    1.0
}

fn default_equalizer_preset() -> String {
    "Flat".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hibernation_delay_ms: default_hibernation_delay_ms(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            volume: default_volume(),
            stereo_widening: false,
            equalizer_preset: default_equalizer_preset(),
            widener: WidenerSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `path` (if it exists) and the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = config::Config::builder();

        if let Some(path) = path.filter(|p| p.exists()) {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SONATA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hibernation_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "hibernation_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.watchdog_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume must be within 0.0 - 1.0, got {}",
                self.volume
            )));
        }
        if !(0.0..=1.0).contains(&self.widener.wet_mix) {
            return Err(ConfigError::Invalid(format!(
                "widener.wet_mix must be within 0.0 - 1.0, got {}",
                self.widener.wet_mix
            )));
        }
        if EqualizerPreset::by_name(&self.equalizer_preset).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown equalizer preset '{}'",
                self.equalizer_preset
            )));
        }
        Ok(())
    }

    pub fn hibernation_delay(&self) -> Duration {
        Duration::from_millis(self.hibernation_delay_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }
}
