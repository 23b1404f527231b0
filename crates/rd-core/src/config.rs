use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Feature-extraction parameters.
///
/// These values are fixed at training time and embedded in the model
/// artifact; inference always reuses the embedded copy so both paths agree.
///
/// # Example
/// ```
/// use rd_core::config::FeatureConfig;
/// let feature = FeatureConfig::default();
/// assert_eq!(feature.sample_rate, 8000);
/// assert_eq!(feature.samples_per_clip(), 16000);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Target sample rate in Hz. Input audio is resampled to this rate.
    pub sample_rate: u32,
    /// Clip duration in seconds. Longer input is truncated.
    pub duration_secs: f32,
    /// Number of MFCC coefficients per frame.
    pub n_mfcc: usize,
    /// Fixed number of time steps in the output tensor.
    pub time_steps: usize,
    /// FFT window size in samples.
    pub n_fft: usize,
    /// Hop between analysis frames in samples.
    pub hop_length: usize,
    /// Number of mel filterbank bands.
    pub n_mels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            duration_secs: 2.0,
            n_mfcc: 13,
            time_steps: 64,
            n_fft: 512,
            hop_length: 250,
            n_mels: 40,
        }
    }
}

impl FeatureConfig {
    /// Number of samples in one full-duration clip.
    #[must_use]
    pub fn samples_per_clip(&self) -> usize {
        (self.sample_rate as f32 * self.duration_secs) as usize
    }

    /// Flat length of one feature tensor (time_steps × n_mfcc).
    #[must_use]
    pub fn tensor_len(&self) -> usize {
        self.time_steps * self.n_mfcc
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if any parameter is out of range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sample_rate == 0 {
            return Err(CoreError::Config("sample_rate must be > 0".into()));
        }
        if self.duration_secs <= 0.0 {
            return Err(CoreError::Config("duration_secs must be > 0".into()));
        }
        if self.n_fft == 0 || self.hop_length == 0 {
            return Err(CoreError::Config("n_fft and hop_length must be > 0".into()));
        }
        if self.n_mfcc > self.n_mels {
            return Err(CoreError::Config(format!(
                "n_mfcc ({}) cannot exceed n_mels ({})",
                self.n_mfcc, self.n_mels
            )));
        }
        // The CNN applies a 3×3 valid convolution then a 2×2 pool.
        if self.time_steps < 4 || self.n_mfcc < 4 {
            return Err(CoreError::Config(
                "time_steps and n_mfcc must be at least 4".into(),
            ));
        }
        Ok(())
    }
}

/// Training hyperparameters.
///
/// # Example
/// ```
/// use rd_core::config::TrainConfig;
/// let training = TrainConfig::default();
/// assert_eq!(training.epochs, 50);
/// assert_eq!(training.batch_size, 8);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of full passes over the training set.
    pub epochs: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// AdamW learning rate.
    pub learning_rate: f64,
    /// Fraction of the dataset held out for validation [0.0, 0.5].
    pub validation_split: f32,
    /// Number of training samples used to calibrate quantization ranges.
    pub calibration_samples: usize,
    /// RNG seed for shuffling and the train/validation split.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 8,
            learning_rate: 1e-3,
            validation_split: 0.2,
            calibration_samples: 100,
            seed: 42,
        }
    }
}

/// Top-level configuration, loadable from TOML.
///
/// Every field has a sane default; a missing or partial file is fine.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Feature-extraction parameters.
    pub feature: FeatureConfig,
    /// Training hyperparameters.
    pub training: TrainConfig,
}

impl Config {
    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;
        config.feature.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise the defaults.
    ///
    /// # Errors
    /// Returns an error if a path is given and cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.feature.validate().is_ok());
        assert_eq!(config.feature.tensor_len(), 64 * 13);
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string(&config).expect("serialize");
        let back: Config = toml::from_str(&text).expect("parse");
        assert_eq!(back, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let back: Config = toml::from_str("[feature]\nsample_rate = 16000\n").expect("parse");
        assert_eq!(back.feature.sample_rate, 16000);
        assert_eq!(back.feature.n_mfcc, 13);
        assert_eq!(back.training.epochs, 50);
    }

    #[test]
    fn rejects_mfcc_above_mels() {
        let feature = FeatureConfig {
            n_mfcc: 50,
            n_mels: 40,
            ..FeatureConfig::default()
        };
        assert!(feature.validate().is_err());
    }
}
