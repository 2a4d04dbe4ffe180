//! Engine configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tessel_core::RenderConfig;
use tessel_synth::{Bus, Tuning};

use crate::error::ConfigError;

/// Accepted sample rates in Hz.
pub const SAMPLE_RATE_RANGE: (f64, f64) = (8000.0, 384_000.0);

/// Accepted block sizes in samples.
pub const BLOCK_SIZE_RANGE: (usize, usize) = (1, 8192);

/// Accepted number of voice pairs.
pub const POLYPHONY_RANGE: (usize, usize) = (1, 64);

/// Accepted drift seeds.
pub const INACCURACY_SEED_RANGE: (f64, f64) = (0.0, 1.0);

/// Settings needed to build a ready-to-render [`Bus`].
///
/// Every key is optional; missing keys take their defaults.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 48000.0
/// block_size = 256
/// polyphony = 8
/// tuning = "432hz-inaccurate-5-synced"
/// inaccuracy_seed = 0.25
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: f64,

    /// Samples rendered per round.
    pub block_size: usize,

    /// Number of modulator/carrier voice pairs.
    pub polyphony: usize,

    /// Tuning name, see [`Tuning::name`].
    pub tuning: String,

    /// Starting point of the drift sequences.
    pub inaccuracy_seed: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 128,
            polyphony: 16,
            tuning: Tuning::Hz440.name().to_string(),
            inaccuracy_seed: 0.5,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;

        tracing::info!(
            path = %path.display(),
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            polyphony = config.polyphony,
            tuning = %config.tuning,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;

        tracing::debug!(path = %path.display(), "engine config saved");

        Ok(())
    }

    /// Check every setting against its range and resolve the tuning name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = self.check();

        if let Err(err) = &result {
            tracing::warn!(error = %err, "invalid engine config");
        }

        result
    }

    fn check(&self) -> Result<(), ConfigError> {
        check_range("sample_rate", self.sample_rate, SAMPLE_RATE_RANGE)?;
        check_range(
            "block_size",
            self.block_size as f64,
            (BLOCK_SIZE_RANGE.0 as f64, BLOCK_SIZE_RANGE.1 as f64),
        )?;
        check_range(
            "polyphony",
            self.polyphony as f64,
            (POLYPHONY_RANGE.0 as f64, POLYPHONY_RANGE.1 as f64),
        )?;
        check_range("inaccuracy_seed", self.inaccuracy_seed, INACCURACY_SEED_RANGE)?;
        self.tuning()?;

        Ok(())
    }

    /// The configured tuning.
    pub fn tuning(&self) -> Result<Tuning, ConfigError> {
        self.tuning
            .parse()
            .map_err(|_| ConfigError::UnknownTuning(self.tuning.clone()))
    }

    /// Sample rate and block size for the render path.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::new(self.sample_rate, self.block_size)
    }

    /// Validate the configuration and build a silent bus with the configured
    /// tuning applied to both roles.
    pub fn build_bus(&self) -> Result<Bus, ConfigError> {
        self.validate()?;

        let mut bus = Bus::new(self.render_config(), self.polyphony, self.inaccuracy_seed);
        bus.set_tuning(self.tuning()?);

        Ok(bus)
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
