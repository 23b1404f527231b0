use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap, loss};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rd_core::config::{FeatureConfig, TrainConfig};
use rd_core::label::Label;
use rd_core::tensor::{FeatureTensor, NormStats};
use rd_core::traits::ClipSource;
use rd_audio::mfcc::MfccExtractor;
use rd_audio::resample::resample_linear;

use crate::artifact::ModelArtifact;
use crate::cnn::RoarCnn;
use crate::error::ModelError;
use crate::quantize::{calibrate, quantize_model};

/// A labeled collection of feature tensors.
#[derive(Debug, Default)]
pub struct Dataset {
    /// Feature tensors, one per clip.
    pub tensors: Vec<FeatureTensor>,
    /// Class of each tensor, parallel to `tensors`.
    pub labels: Vec<Label>,
}

impl Dataset {
    /// Empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn push(&mut self, tensor: FeatureTensor, label: Label) {
        self.tensors.push(tensor);
        self.labels.push(label);
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// True if no samples were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Sample count per class, in label index order.
    #[must_use]
    pub fn class_counts(&self) -> [usize; Label::COUNT] {
        let mut counts = [0usize; Label::COUNT];
        for label in &self.labels {
            counts[label.index()] += 1;
        }
        counts
    }

    /// Drain every given clip source into a dataset.
    ///
    /// Clips are resampled to the configured rate and run through the MFCC
    /// extractor (in parallel). A failed clip is logged and skipped; it is
    /// the caller's job to decide whether the surviving counts are enough.
    pub fn from_sources(
        sources: &mut [&mut dyn ClipSource],
        feature: &FeatureConfig,
    ) -> Self {
        let mut clips = Vec::new();
        for source in sources.iter_mut() {
            while let Some(item) = source.next_clip() {
                match item {
                    Ok(clip) => clips.push(clip),
                    Err(e) => log::warn!("Skipping sample: {e:#}"),
                }
            }
        }

        let extracted: Vec<(FeatureTensor, Label)> = clips
            .into_par_iter()
            .map_init(
                || MfccExtractor::new(feature),
                |extractor, clip| {
                    let samples =
                        resample_linear(&clip.samples, clip.sample_rate, feature.sample_rate);
                    log::debug!("Extracted features from {}", clip.name);
                    (extractor.extract(&samples), clip.label)
                },
            )
            .collect();

        let mut dataset = Self::new();
        for (tensor, label) in extracted {
            dataset.push(tensor, label);
        }
        let counts = dataset.class_counts();
        log::info!(
            "Dataset: {} Tiger, {} Non-Tiger samples",
            counts[Label::Tiger.index()],
            counts[Label::NonTiger.index()]
        );
        dataset
    }
}

/// Train the CNN on `dataset` and return the quantized artifact.
///
/// Fails before any model construction if either class has no samples.
/// The dataset is normalized in place with its global min/max; those stats
/// end up in the artifact so inference applies the identical mapping.
///
/// # Errors
/// Returns [`ModelError::EmptyClass`] on insufficient data, or a training
/// error from candle.
pub fn train(
    mut dataset: Dataset,
    feature: &FeatureConfig,
    config: &TrainConfig,
) -> Result<ModelArtifact> {
    let counts = dataset.class_counts();
    for label in Label::ALL {
        if counts[label.index()] == 0 {
            return Err(ModelError::EmptyClass {
                class: label.name().to_string(),
            }
            .into());
        }
    }

    // Joint normalization to [0, 1] over the whole training set.
    let norm = NormStats::from_tensors(dataset.tensors.iter());
    for tensor in &mut dataset.tensors {
        tensor.normalize(&norm);
    }
    log::info!(
        "Normalized {} tensors (global range [{:.3}, {:.3}])",
        dataset.len(),
        norm.min,
        norm.max
    );

    let device = Device::Cpu;
    let mut rng = StdRng::seed_from_u64(config.seed);

    // Shuffled validation split.
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.shuffle(&mut rng);
    let n_val = ((dataset.len() as f32 * config.validation_split) as usize)
        .min(dataset.len().saturating_sub(1));
    let (val_idx, train_idx) = indices.split_at(n_val);
    let mut train_idx = train_idx.to_vec();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, candle_core::DType::F32, &device);
    let cnn = RoarCnn::new(feature, vb).context("building CNN")?;
    let mut optimizer = AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr: config.learning_rate,
            ..ParamsAdamW::default()
        },
    )
    .context("building optimizer")?;

    for epoch in 1..=config.epochs {
        train_idx.shuffle(&mut rng);

        let mut epoch_loss = 0.0f32;
        let mut seen = 0usize;
        for chunk in train_idx.chunks(config.batch_size.max(1)) {
            let (x, y) = batch(&dataset, chunk, feature, &device)?;
            let logits = cnn.forward(&x)?;
            let batch_loss = loss::cross_entropy(&logits, &y)?;
            optimizer.backward_step(&batch_loss)?;
            epoch_loss += batch_loss.to_scalar::<f32>()? * chunk.len() as f32;
            seen += chunk.len();
        }
        let epoch_loss = epoch_loss / seen.max(1) as f32;

        if val_idx.is_empty() {
            log::info!("Epoch {epoch}/{}: loss {epoch_loss:.4}", config.epochs);
        } else {
            let (vx, vy) = batch(&dataset, val_idx, feature, &device)?;
            let vlogits = cnn.forward(&vx)?;
            let vloss = loss::cross_entropy(&vlogits, &vy)?.to_scalar::<f32>()?;
            let predicted = vlogits.argmax(candle_core::D::Minus1)?.to_vec1::<u32>()?;
            let truth = vy.to_vec1::<u32>()?;
            let correct = predicted
                .iter()
                .zip(truth.iter())
                .filter(|(p, t)| p == t)
                .count();
            let acc = correct as f32 / truth.len() as f32;
            log::info!(
                "Epoch {epoch}/{}: loss {epoch_loss:.4}, val_loss {vloss:.4}, val_acc {acc:.2}",
                config.epochs
            );
        }
    }

    // Representative-data calibration over the first samples, then int8.
    let calibration = calibrate(
        &cnn,
        &dataset.tensors,
        feature,
        config.calibration_samples,
        &device,
    )?;
    let net = quantize_model(&cnn, &calibration, feature)?;
    Ok(ModelArtifact::new(feature.clone(), norm, net))
}

/// Assemble NCHW input and u32 target tensors for the given sample indices.
fn batch(
    dataset: &Dataset,
    indices: &[usize],
    feature: &FeatureConfig,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let mut x = Vec::with_capacity(indices.len() * feature.tensor_len());
    let mut y = Vec::with_capacity(indices.len());
    for &i in indices {
        x.extend_from_slice(dataset.tensors[i].as_slice());
        y.push(dataset.labels[i].index() as u32);
    }
    let x = Tensor::from_vec(
        x,
        (indices.len(), 1, feature.time_steps, feature.n_mfcc),
        device,
    )?;
    let y = Tensor::from_vec(y, indices.len(), device)?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rd_core::traits::LabeledClip;

    fn tiny_feature() -> FeatureConfig {
        FeatureConfig {
            time_steps: 16,
            n_mfcc: 8,
            ..FeatureConfig::default()
        }
    }

    fn tiny_train_config() -> TrainConfig {
        TrainConfig {
            epochs: 2,
            batch_size: 4,
            calibration_samples: 8,
            ..TrainConfig::default()
        }
    }

    fn patterned_tensor(feature: &FeatureConfig, label: Label, seed: usize) -> FeatureTensor {
        let mut tensor = FeatureTensor::zeroed(feature.time_steps, feature.n_mfcc);
        for t in 0..feature.time_steps {
            for m in 0..feature.n_mfcc {
                let base = if label == Label::Tiger { 4.0 } else { -4.0 };
                let v = base + ((t * 13 + m * 7 + seed) % 10) as f32 / 10.0;
                tensor.set(t, m, v);
            }
        }
        tensor
    }

    fn tiny_dataset(feature: &FeatureConfig, tigers: usize, others: usize) -> Dataset {
        let mut dataset = Dataset::new();
        for i in 0..tigers {
            dataset.push(patterned_tensor(feature, Label::Tiger, i), Label::Tiger);
        }
        for i in 0..others {
            dataset.push(patterned_tensor(feature, Label::NonTiger, i), Label::NonTiger);
        }
        dataset
    }

    #[test]
    fn training_produces_a_non_empty_artifact() {
        let feature = tiny_feature();
        let dataset = tiny_dataset(&feature, 4, 4);
        let artifact = train(dataset, &feature, &tiny_train_config()).expect("train");
        let bytes = artifact.to_bytes().expect("serialize");
        assert!(!bytes.is_empty());
        assert_eq!(artifact.net.conv_w.len(), 16 * 3 * 3);
        assert_eq!(artifact.feature, feature);
    }

    #[test]
    fn aborts_when_a_class_is_empty() {
        let feature = tiny_feature();
        let dataset = tiny_dataset(&feature, 3, 0);
        let err = train(dataset, &feature, &tiny_train_config()).expect_err("must fail");
        let model_err = err.downcast_ref::<ModelError>().expect("model error");
        assert!(matches!(model_err, ModelError::EmptyClass { class } if class == "Non-Tiger"));
    }

    #[test]
    fn aborts_on_a_fully_empty_dataset() {
        let feature = tiny_feature();
        assert!(train(Dataset::new(), &feature, &tiny_train_config()).is_err());
    }

    struct ScriptedSource {
        items: Vec<anyhow::Result<LabeledClip>>,
    }

    impl ClipSource for ScriptedSource {
        fn next_clip(&mut self) -> Option<anyhow::Result<LabeledClip>> {
            if self.items.is_empty() {
                None
            } else {
                Some(self.items.remove(0))
            }
        }
    }

    #[test]
    fn from_sources_skips_failed_clips() {
        let feature = FeatureConfig::default();
        let clip = |label| LabeledClip {
            samples: vec![0.1; 8000],
            sample_rate: 8000,
            label,
            name: "synthetic".into(),
        };
        let mut good = ScriptedSource {
            items: vec![
                Ok(clip(Label::Tiger)),
                Err(anyhow::anyhow!("corrupt file")),
                Ok(clip(Label::Tiger)),
            ],
        };
        let mut other = ScriptedSource {
            items: vec![Ok(clip(Label::NonTiger))],
        };

        let mut sources: Vec<&mut dyn ClipSource> = vec![&mut good, &mut other];
        let dataset = Dataset::from_sources(&mut sources, &feature);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.class_counts(), [1, 2]);
    }

    #[test]
    fn resamples_clips_to_the_configured_rate() {
        let feature = FeatureConfig::default();
        // 44.1 kHz input must land in the same fixed shape.
        let mut source = ScriptedSource {
            items: vec![Ok(LabeledClip {
                samples: vec![0.2; 44100],
                sample_rate: 44100,
                label: Label::Tiger,
                name: "hi-rate".into(),
            })],
        };
        let mut sources: Vec<&mut dyn ClipSource> = vec![&mut source];
        let dataset = Dataset::from_sources(&mut sources, &feature);
        assert_eq!(dataset.tensors[0].shape(), (64, 13, 1));
    }
}
