use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fit::profile::PROFILE_VERSION;
use crate::logging::LogConfig;
use crate::tolerance::ToleranceConfig;
use crate::zwift::ValidationMode;

/// Environment variable that pins the Zwift validation mode
pub const ZWIFT_VALIDATION_ENV: &str = "KAIORD_ZWIFT_VALIDATION";

/// Converter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Round-trip tolerances per metric
    pub tolerances: ToleranceConfig,

    /// Zwift adapter settings
    pub zwift: ZwiftSettings,

    /// TCX adapter settings
    pub tcx: TcxSettings,

    /// FIT adapter settings
    pub fit: FitSettings,

    /// Logging for the command-line tool
    pub logging: LogConfig,
}

/// Zwift adapter settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZwiftSettings {
    /// Pinned validation mode; `None` detects the platform once
    pub validation: Option<ValidationMode>,
}

/// TCX adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcxSettings {
    /// Run the structural check on writer output
    pub validate_output: bool,
}

impl Default for TcxSettings {
    fn default() -> Self {
        Self {
            validate_output: true,
        }
    }
}

/// FIT adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Profile version written into the file header
    pub profile_version: u16,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            profile_version: PROFILE_VERSION,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ConverterConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kaiord")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults, then apply environment overrides
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        let mut config = match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "Config file not loaded, using defaults"
                );
                Self::default()
            }
        };

        if let Ok(value) = std::env::var(ZWIFT_VALIDATION_ENV) {
            if let Err(err) = config.apply_zwift_override(&value) {
                tracing::warn!("{}", err);
            }
        }

        config
    }

    /// Apply a `KAIORD_ZWIFT_VALIDATION` value.
    pub fn apply_zwift_override(&mut self, value: &str) -> Result<()> {
        let mode = value.parse::<ValidationMode>().map_err(anyhow::Error::msg)?;
        self.zwift.validation = Some(mode);
        Ok(())
    }

    /// The Zwift validation mode to construct validators with.
    pub fn zwift_validation_mode(&self) -> ValidationMode {
        self.zwift.validation.unwrap_or_else(ValidationMode::detect)
    }
}
