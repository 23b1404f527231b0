use std::path::Path;

use anyhow::{Context, Result};
use rd_audio::decode::decode_file;
use rd_audio::mfcc::MfccExtractor;
use rd_audio::resample::resample_linear;
use rd_core::config::FeatureConfig;

use crate::artifact::ModelArtifact;
use crate::interpreter;

/// One classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the winning class.
    pub class_index: usize,
    /// Name of the winning class, from the artifact.
    pub class_name: String,
    /// Probability of the winning class, in [0, 1].
    pub confidence: f32,
    /// Full probability vector, one entry per class.
    pub probabilities: Vec<f32>,
}

/// Inference handle around a loaded model artifact.
///
/// Explicitly constructed and passed around — several detectors can coexist
/// in one process (different models, tests). The artifact's embedded
/// feature parameters and normalization statistics are the only ones used,
/// so inference cannot drift from training.
///
/// # Example
/// ```no_run
/// use rd_model::detector::Detector;
/// let mut detector = Detector::load("tiger_audio_model.bin").unwrap();
/// let prediction = detector.classify_file("roar.wav").unwrap();
/// println!("{} ({:.2})", prediction.class_name, prediction.confidence);
/// ```
pub struct Detector {
    artifact: ModelArtifact,
    extractor: MfccExtractor,
}

impl Detector {
    /// Load an artifact from disk and build the matching extractor.
    ///
    /// # Errors
    /// Returns an error if the file is missing, corrupt, or from an
    /// unsupported format version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let artifact = ModelArtifact::load(path)
            .with_context(|| format!("Cannot load model artifact: {}", path.display()))?;
        Ok(Self::from_artifact(artifact))
    }

    /// Wrap an already-deserialized artifact.
    #[must_use]
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        let extractor = MfccExtractor::new(&artifact.feature);
        Self {
            artifact,
            extractor,
        }
    }

    /// Feature parameters the model was trained with.
    #[must_use]
    pub fn feature_config(&self) -> &FeatureConfig {
        &self.artifact.feature
    }

    /// Classify mono samples at any sample rate.
    ///
    /// Resamples to the trained rate, extracts the fixed-shape tensor,
    /// applies the artifact's stored normalization, and runs the int8
    /// network.
    ///
    /// # Errors
    /// Returns an error if the quantized forward pass rejects the input.
    pub fn classify_samples(&mut self, samples: &[f32], sample_rate: u32) -> Result<Prediction> {
        let feature = self.artifact.feature.clone();
        let samples = resample_linear(samples, sample_rate, feature.sample_rate);
        let mut tensor = self.extractor.extract(&samples);
        tensor.normalize(&self.artifact.norm);

        let probabilities = interpreter::run(&self.artifact.net, &feature, &tensor)?;
        let (class_index, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .context("model produced no outputs")?;

        let class_name = self
            .artifact
            .class_names
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| format!("class-{class_index}"));

        Ok(Prediction {
            class_index,
            class_name,
            confidence,
            probabilities,
        })
    }

    /// Decode an audio file and classify it.
    ///
    /// Unlike dataset scanning, a failure here is fatal to the invocation.
    ///
    /// # Errors
    /// Returns an error if the file cannot be decoded or classified.
    pub fn classify_file(&mut self, path: impl AsRef<Path>) -> Result<Prediction> {
        let (samples, sample_rate) = decode_file(path)?;
        self.classify_samples(&samples, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::QuantizedNet;
    use crate::quantize::QuantParams;
    use crate::train::{Dataset, train};
    use rd_audio::wav::write_wav_i16;
    use rd_core::config::TrainConfig;
    use rd_core::label::Label;
    use rd_core::tensor::NormStats;

    fn tone(freq: f32, sample_rate: u32, duration_secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                (i as f32 * freq * 2.0 * std::f32::consts::PI / sample_rate as f32).sin() * 0.6
            })
            .collect()
    }

    /// Train a small model on synthetic tones: high tones are "Tiger",
    /// low rumbles are "Non-Tiger".
    fn trained_artifact(feature: &FeatureConfig) -> ModelArtifact {
        let mut extractor = MfccExtractor::new(feature);
        let mut dataset = Dataset::new();
        for freq in [900.0, 1000.0, 1100.0] {
            let tensor = extractor.extract(&tone(freq, feature.sample_rate, 1.0));
            dataset.push(tensor, Label::Tiger);
        }
        for freq in [100.0, 150.0, 200.0] {
            let tensor = extractor.extract(&tone(freq, feature.sample_rate, 1.0));
            dataset.push(tensor, Label::NonTiger);
        }
        let config = TrainConfig {
            epochs: 3,
            batch_size: 2,
            calibration_samples: 6,
            ..TrainConfig::default()
        };
        train(dataset, feature, &config).expect("train")
    }

    #[test]
    fn end_to_end_silence_clip_yields_a_valid_prediction() {
        let feature = FeatureConfig {
            duration_secs: 1.0,
            ..FeatureConfig::default()
        };
        let artifact = trained_artifact(&feature);

        let dir = tempfile::tempdir().expect("tempdir");
        let model_path = dir.path().join("model.bin");
        artifact.save(&model_path).expect("save artifact");
        assert!(std::fs::metadata(&model_path).expect("stat").len() > 0);

        let mut detector = Detector::load(&model_path).expect("load");
        let silence = vec![0.0f32; feature.samples_per_clip()];
        let prediction = detector
            .classify_samples(&silence, feature.sample_rate)
            .expect("classify");

        assert!(["Non-Tiger", "Tiger"].contains(&prediction.class_name.as_str()));
        assert!((0.0..=1.0).contains(&prediction.confidence));
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    /// Small hand-built net whose logits move with the quantized input, so
    /// a change in the applied normalization is visible in the output.
    fn input_sensitive_net() -> QuantizedNet {
        QuantizedNet {
            conv_filters: 1,
            kernel_size: 3,
            hidden_units: 1,
            num_classes: 2,
            input: QuantParams::unit_input(),
            conv_w: vec![1; 9],
            conv_w_scale: 0.05,
            conv_b: vec![0],
            conv_out: QuantParams::from_range(0.0, 5.0),
            fc1_w: vec![127],
            fc1_w_scale: 0.02,
            fc1_b: vec![0],
            fc1_out: QuantParams::from_range(0.0, 5.0),
            fc2_w: vec![64, -64],
            fc2_w_scale: 0.001,
            fc2_b: vec![0, 0],
        }
    }

    #[test]
    fn stored_normalization_stats_are_applied_at_inference() {
        let feature = FeatureConfig {
            time_steps: 4,
            n_mfcc: 4,
            duration_secs: 1.0,
            ..FeatureConfig::default()
        };
        let samples = tone(500.0, feature.sample_rate, 1.0);

        // Same net, same input; only the normalization stats differ. A tight
        // range clamps most coefficients to the [0, 1] bounds, a wide one
        // compresses them toward the middle, so the quantized inputs and
        // therefore the probability vectors must diverge.
        let tight = ModelArtifact::new(
            feature.clone(),
            NormStats {
                min: -200.0,
                max: 50.0,
            },
            input_sensitive_net(),
        );
        let wide = ModelArtifact::new(
            feature.clone(),
            NormStats {
                min: -2000.0,
                max: 2000.0,
            },
            input_sensitive_net(),
        );

        let a = Detector::from_artifact(tight)
            .classify_samples(&samples, feature.sample_rate)
            .expect("classify with tight stats");
        let b = Detector::from_artifact(wide)
            .classify_samples(&samples, feature.sample_rate)
            .expect("classify with wide stats");

        assert_ne!(
            a.probabilities, b.probabilities,
            "normalization stats did not reach the quantized input"
        );
    }

    #[test]
    fn classifies_a_wav_file_from_disk() {
        let feature = FeatureConfig {
            duration_secs: 1.0,
            ..FeatureConfig::default()
        };
        let artifact = trained_artifact(&feature);
        let mut detector = Detector::from_artifact(artifact);

        let dir = tempfile::tempdir().expect("tempdir");
        let wav_path = dir.path().join("clip.wav");
        write_wav_i16(&wav_path, &tone(1000.0, 8000, 1.0), 8000).expect("write wav");

        let prediction = detector.classify_file(&wav_path).expect("classify");
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert_eq!(prediction.probabilities.len(), 2);
    }

    #[test]
    fn missing_audio_file_is_fatal() {
        let feature = FeatureConfig {
            duration_secs: 1.0,
            ..FeatureConfig::default()
        };
        let artifact = trained_artifact(&feature);
        let mut detector = Detector::from_artifact(artifact);
        assert!(detector.classify_file("no-such-clip.wav").is_err());
    }
}
