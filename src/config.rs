use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::baseline::{DEFAULT_SPECTRAL_SIGMA, MAX_SPECTRAL_SIGMA};
use crate::pipeline::tracker::TrackerParams;
use crate::pipeline::transmission::DEFAULT_WINDOW;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "FIBERX_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "fiberx.json";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("integration time must be at least 1 ms")]
    IntegrationTime,
    #[error("sample period must be at least 1 ms")]
    SamplePeriod,
    #[error("spectral sigma must be within 0..={max}, got {0}", max = MAX_SPECTRAL_SIGMA)]
    SpectralSigma(f64),
    #[error("transmission window must be at least 1 sample")]
    Window,
    #[error(transparent)]
    Tracker(#[from] crate::pipeline::error::TrackerError),
}

/// Acquisition timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Detector integration time, also the device read period (ms).
    pub integration_time_ms: u32,
    /// Feature-tracking tick period (ms).
    pub sample_period_ms: u32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            integration_time_ms: 200,
            sample_period_ms: 1000,
        }
    }
}

/// Spectral smoothing and truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub spectral_sigma: f64,
    pub transmission_window: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            spectral_sigma: DEFAULT_SPECTRAL_SIGMA,
            transmission_window: DEFAULT_WINDOW,
        }
    }
}

/// Where captures and results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderSettings {
    pub dark: PathBuf,
    pub bright: PathBuf,
    pub results: PathBuf,
}

impl Default for FolderSettings {
    fn default() -> Self {
        let root = Path::new("data");
        Self {
            dark: root.join("dark"),
            bright: root.join("bright"),
            results: root.join("results"),
        }
    }
}

/// Everything the operator can tune, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub acquisition: AcquisitionSettings,
    pub processing: ProcessingSettings,
    pub tracking: TrackerParams,
    pub folders: FolderSettings,
}

impl Settings {
    /// `$FIBERX_CONFIG` or `./fiberx.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text).context("parsing settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(s) => {
                log::info!("Loaded settings from {}", path.display());
                s
            }
            Err(e) => {
                log::warn!("Ignoring settings {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialising settings")?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.integration_time_ms == 0 {
            return Err(ConfigError::IntegrationTime);
        }
        if self.acquisition.sample_period_ms == 0 {
            return Err(ConfigError::SamplePeriod);
        }
        if !(0.0..=MAX_SPECTRAL_SIGMA).contains(&self.processing.spectral_sigma) {
            return Err(ConfigError::SpectralSigma(self.processing.spectral_sigma));
        }
        if self.processing.transmission_window == 0 {
            return Err(ConfigError::Window);
        }
        self.tracking.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.acquisition.integration_time_ms, 200);
        assert_eq!(s.acquisition.sample_period_ms, 1000);
        assert_eq!(s.tracking.centroid_half_window, 25.0);
        assert_eq!(s.processing.transmission_window, 3000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"tracking": {"fixed_position": 650.0}}"#).unwrap();
        assert_eq!(s.tracking.fixed_position, 650.0);
        assert_eq!(s.tracking.area_high, 700.0);
        assert_eq!(s.acquisition, AcquisitionSettings::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut s = Settings::default();
        s.acquisition.sample_period_ms = 0;
        assert_eq!(s.validate(), Err(ConfigError::SamplePeriod));

        let mut s = Settings::default();
        s.tracking.area_low = 800.0;
        assert!(matches!(s.validate(), Err(ConfigError::Tracker(_))));
    }

    #[test]
    fn test_sigma_upper_bounds() {
        let s: Settings = serde_json::from_str(r#"{"tracking": {"series_sigma": 1e300}}"#).unwrap();
        assert!(matches!(s.validate(), Err(ConfigError::Tracker(_))));

        let mut s = Settings::default();
        s.processing.spectral_sigma = 1e9;
        assert_eq!(s.validate(), Err(ConfigError::SpectralSigma(1e9)));
        s.processing.spectral_sigma = f64::NAN;
        assert!(s.validate().is_err());
        s.processing.spectral_sigma = MAX_SPECTRAL_SIGMA;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("fiberx-settings-{}.json", std::process::id()));
        let mut s = Settings::default();
        s.acquisition.integration_time_ms = 50;
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        std::fs::remove_file(&path).ok();
    }
}
