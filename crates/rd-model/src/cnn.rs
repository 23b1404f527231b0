use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder, conv2d, linear};
use rd_core::config::FeatureConfig;
use rd_core::label::Label;

/// Number of convolution filters.
pub const CONV_FILTERS: usize = 16;
/// Convolution kernel edge (3×3, valid padding).
pub const KERNEL_SIZE: usize = 3;
/// Max-pool edge (2×2, stride 2).
pub const POOL_SIZE: usize = 2;
/// Width of the hidden dense layer.
pub const HIDDEN_UNITS: usize = 32;

/// Spatial dims after the valid 3×3 convolution.
#[must_use]
pub fn conv_out_dims(feature: &FeatureConfig) -> (usize, usize) {
    (
        feature.time_steps - KERNEL_SIZE + 1,
        feature.n_mfcc - KERNEL_SIZE + 1,
    )
}

/// Spatial dims after the 2×2 max-pool.
#[must_use]
pub fn pool_out_dims(feature: &FeatureConfig) -> (usize, usize) {
    let (h, w) = conv_out_dims(feature);
    (h / POOL_SIZE, w / POOL_SIZE)
}

/// Flattened length fed into the first dense layer.
///
/// # Example
/// ```
/// use rd_core::config::FeatureConfig;
/// // 64×13 input → 62×11 conv → 31×5 pool → 16·31·5
/// assert_eq!(rd_model::cnn::flat_dim(&FeatureConfig::default()), 2480);
/// ```
#[must_use]
pub fn flat_dim(feature: &FeatureConfig) -> usize {
    let (h, w) = pool_out_dims(feature);
    CONV_FILTERS * h * w
}

/// Intermediate activations of one forward pass, used for quantization
/// calibration.
pub struct Activations {
    /// Post-ReLU convolution output, NCHW.
    pub conv: Tensor,
    /// Post-ReLU hidden dense output, (N, HIDDEN_UNITS).
    pub fc1: Tensor,
    /// Raw logits, (N, 2).
    pub logits: Tensor,
}

/// The float CNN trained by `roardet-train`.
///
/// Conv2d(1→16, 3×3) + ReLU → MaxPool 2×2 → flatten →
/// Linear(→32) + ReLU → Linear(→2). Input is NCHW `(N, 1, time_steps, n_mfcc)`.
pub struct RoarCnn {
    pub(crate) conv: Conv2d,
    pub(crate) fc1: Linear,
    pub(crate) fc2: Linear,
}

impl RoarCnn {
    /// Build the network under `vb`.
    ///
    /// # Errors
    /// Returns an error if variable creation fails.
    pub fn new(feature: &FeatureConfig, vb: VarBuilder) -> Result<Self> {
        let conv = conv2d(
            1,
            CONV_FILTERS,
            KERNEL_SIZE,
            Conv2dConfig::default(),
            vb.pp("conv1"),
        )?;
        let fc1 = linear(flat_dim(feature), HIDDEN_UNITS, vb.pp("fc1"))?;
        let fc2 = linear(HIDDEN_UNITS, Label::COUNT, vb.pp("fc2"))?;
        Ok(Self { conv, fc1, fc2 })
    }

    /// Forward pass returning logits.
    ///
    /// # Errors
    /// Returns an error on shape mismatch.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.trace(x)?.logits)
    }

    /// Forward pass keeping the intermediate activations.
    ///
    /// # Errors
    /// Returns an error on shape mismatch.
    pub fn trace(&self, x: &Tensor) -> Result<Activations> {
        let conv = self.conv.forward(x)?.relu()?;
        let pool = conv.max_pool2d(POOL_SIZE)?;
        let flat = pool.flatten_from(1)?;
        let fc1 = self.fc1.forward(&flat)?.relu()?;
        let logits = self.fc2.forward(&fc1)?;
        Ok(Activations { conv, fc1, logits })
    }
}
