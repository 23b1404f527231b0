use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use rd_core::config::FeatureConfig;
use rd_core::tensor::FeatureTensor;
use serde::{Deserialize, Serialize};

use crate::artifact::QuantizedNet;
use crate::cnn::{CONV_FILTERS, HIDDEN_UNITS, KERNEL_SIZE, RoarCnn};
use crate::error::ModelError;
use rd_core::label::Label;

/// Affine int8 quantization parameters for one activation tensor.
///
/// `real = (q - zero_point) * scale`
///
/// # Example
/// ```
/// use rd_model::quantize::QuantParams;
/// let p = QuantParams::from_range(0.0, 2.55);
/// let q = p.quantize(1.0);
/// assert!((p.dequantize(q) - 1.0).abs() < 0.02);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    /// Step size between adjacent quantized values.
    pub scale: f32,
    /// The int8 value that represents real 0.0.
    pub zero_point: i32,
}

impl QuantParams {
    /// Parameters covering `[min, max]`, widened to include 0.0.
    #[must_use]
    pub fn from_range(min: f32, max: f32) -> Self {
        let min = min.min(0.0);
        let max = max.max(0.0);
        let scale = ((max - min) / 255.0).max(1e-8);
        let zero_point = (-128.0 - min / scale).round().clamp(-128.0, 127.0) as i32;
        Self { scale, zero_point }
    }

    /// Fixed parameters for inputs normalized to [0, 1].
    #[must_use]
    pub fn unit_input() -> Self {
        Self {
            scale: 1.0 / 255.0,
            zero_point: -128,
        }
    }

    /// Quantize one value, saturating at the int8 range.
    #[inline]
    #[must_use]
    pub fn quantize(&self, x: f32) -> i8 {
        ((x / self.scale).round() as i32 + self.zero_point).clamp(-128, 127) as i8
    }

    /// Dequantize one value.
    #[inline]
    #[must_use]
    pub fn dequantize(&self, q: i8) -> f32 {
        (i32::from(q) - self.zero_point) as f32 * self.scale
    }
}

/// Running min/max over observed activation values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Range {
    /// Smallest observed value.
    pub min: f32,
    /// Largest observed value.
    pub max: f32,
}

impl Range {
    /// Fold a batch of values into the range.
    pub fn observe(&mut self, values: &[f32]) {
        for &v in values {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
    }
}

/// Activation ranges collected from the representative dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calibration {
    /// Post-ReLU convolution output range.
    pub conv: Range,
    /// Post-ReLU hidden dense output range.
    pub fc1: Range,
}

/// Run the float model over the first `limit` tensors and record the
/// activation ranges needed for int8 quantization.
///
/// # Errors
/// Returns an error if the forward pass fails.
pub fn calibrate(
    cnn: &RoarCnn,
    tensors: &[FeatureTensor],
    feature: &FeatureConfig,
    limit: usize,
    device: &Device,
) -> Result<Calibration> {
    let n = tensors.len().min(limit.max(1));
    let mut flat = Vec::with_capacity(n * feature.tensor_len());
    for tensor in &tensors[..n] {
        flat.extend_from_slice(tensor.as_slice());
    }
    let x = Tensor::from_vec(flat, (n, 1, feature.time_steps, feature.n_mfcc), device)
        .context("building calibration batch")?;
    let acts = cnn.trace(&x).context("calibration forward pass")?;

    let mut calibration = Calibration::default();
    calibration
        .conv
        .observe(&acts.conv.flatten_all()?.to_vec1::<f32>()?);
    calibration
        .fc1
        .observe(&acts.fc1.flatten_all()?.to_vec1::<f32>()?);
    Ok(calibration)
}

/// Symmetric per-tensor int8 weight quantization (zero point 0).
#[must_use]
pub fn quantize_weights(weights: &[f32]) -> (Vec<i8>, f32) {
    let max_abs = weights.iter().fold(0.0f32, |acc, &w| acc.max(w.abs()));
    let scale = (max_abs / 127.0).max(1e-8);
    let q = weights
        .iter()
        .map(|&w| (w / scale).round().clamp(-127.0, 127.0) as i8)
        .collect();
    (q, scale)
}

/// Quantize biases to i32 at the accumulator scale `s_input · s_weight`.
#[must_use]
pub fn quantize_biases(biases: &[f32], scale: f32) -> Vec<i32> {
    biases.iter().map(|&b| (b / scale).round() as i32).collect()
}

fn tensor_values(t: &Tensor) -> Result<Vec<f32>> {
    Ok(t.flatten_all()?.to_vec1::<f32>()?)
}

/// Convert the trained float model into the int8 network stored in the
/// artifact.
///
/// Weights are symmetric per-tensor; activations use the calibrated
/// asymmetric ranges; the input is fixed to the [0, 1] post-normalization
/// range.
///
/// # Errors
/// Returns an error if a layer is missing its bias or weights cannot be
/// read back from the device.
pub fn quantize_model(
    cnn: &RoarCnn,
    calibration: &Calibration,
    feature: &FeatureConfig,
) -> Result<QuantizedNet> {
    let input = QuantParams::unit_input();

    let conv_bias = cnn
        .conv
        .bias()
        .ok_or_else(|| ModelError::InvalidInput("conv layer has no bias".into()))?;
    let fc1_bias = cnn
        .fc1
        .bias()
        .ok_or_else(|| ModelError::InvalidInput("fc1 layer has no bias".into()))?;
    let fc2_bias = cnn
        .fc2
        .bias()
        .ok_or_else(|| ModelError::InvalidInput("fc2 layer has no bias".into()))?;

    let (conv_w, conv_w_scale) = quantize_weights(&tensor_values(cnn.conv.weight())?);
    let conv_b = quantize_biases(&tensor_values(conv_bias)?, input.scale * conv_w_scale);
    let conv_out = QuantParams::from_range(calibration.conv.min, calibration.conv.max);

    let (fc1_w, fc1_w_scale) = quantize_weights(&tensor_values(cnn.fc1.weight())?);
    let fc1_b = quantize_biases(&tensor_values(fc1_bias)?, conv_out.scale * fc1_w_scale);
    let fc1_out = QuantParams::from_range(calibration.fc1.min, calibration.fc1.max);

    let (fc2_w, fc2_w_scale) = quantize_weights(&tensor_values(cnn.fc2.weight())?);
    let fc2_b = quantize_biases(&tensor_values(fc2_bias)?, fc1_out.scale * fc2_w_scale);

    Ok(QuantizedNet {
        conv_filters: CONV_FILTERS,
        kernel_size: KERNEL_SIZE,
        hidden_units: HIDDEN_UNITS,
        num_classes: Label::COUNT,
        input,
        conv_w,
        conv_w_scale,
        conv_b,
        conv_out,
        fc1_w,
        fc1_w_scale,
        fc1_b,
        fc1_out,
        fc2_w,
        fc2_w_scale,
        fc2_b,
    })
}
