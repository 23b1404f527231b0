use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Fixed-shape MFCC feature tensor, logical shape `(time_steps, n_mfcc, 1)`.
///
/// Stored row-major over time: value `(t, m)` lives at `t * n_mfcc + m`.
/// The shape is invariant to the input clip length; extraction pads or
/// truncates along the time axis before constructing one of these.
///
/// # Example
/// ```
/// use rd_core::tensor::FeatureTensor;
/// let tensor = FeatureTensor::zeroed(64, 13);
/// assert_eq!(tensor.shape(), (64, 13, 1));
/// assert_eq!(tensor.as_slice().len(), 64 * 13);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    data: Vec<f32>,
    time_steps: usize,
    n_mfcc: usize,
}

impl FeatureTensor {
    /// Create an all-zero tensor of the given shape.
    #[must_use]
    pub fn zeroed(time_steps: usize, n_mfcc: usize) -> Self {
        Self {
            data: vec![0.0; time_steps * n_mfcc],
            time_steps,
            n_mfcc,
        }
    }

    /// Wrap an existing flat buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidShape`] if `data.len() != time_steps * n_mfcc`.
    pub fn from_data(data: Vec<f32>, time_steps: usize, n_mfcc: usize) -> Result<Self, CoreError> {
        let expected = time_steps * n_mfcc;
        if data.len() != expected {
            return Err(CoreError::InvalidShape {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            time_steps,
            n_mfcc,
        })
    }

    /// Logical shape `(time_steps, n_mfcc, 1)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.time_steps, self.n_mfcc, 1)
    }

    /// Value at `(t, m)`.
    #[inline]
    #[must_use]
    pub fn at(&self, t: usize, m: usize) -> f32 {
        debug_assert!(t < self.time_steps && m < self.n_mfcc, "index out of bounds");
        self.data[t * self.n_mfcc + m]
    }

    /// Set the value at `(t, m)`.
    #[inline]
    pub fn set(&mut self, t: usize, m: usize, value: f32) {
        debug_assert!(t < self.time_steps && m < self.n_mfcc, "index out of bounds");
        self.data[t * self.n_mfcc + m] = value;
    }

    /// Flat view, time-major.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Scale all values into [0, 1] using `stats`, clamping outliers.
    pub fn normalize(&mut self, stats: &NormStats) {
        let span = stats.span();
        for v in &mut self.data {
            *v = ((*v - stats.min) / span).clamp(0.0, 1.0);
        }
    }
}

/// Global min/max statistics of a training set.
///
/// Computed once over every feature tensor in the dataset, stored in the
/// model artifact, and applied identically at training and inference time.
///
/// # Example
/// ```
/// use rd_core::tensor::{FeatureTensor, NormStats};
/// let mut a = FeatureTensor::zeroed(4, 4);
/// a.set(0, 0, -2.0);
/// a.set(1, 1, 6.0);
/// let stats = NormStats::from_tensors([&a]);
/// assert_eq!(stats.min, -2.0);
/// assert_eq!(stats.max, 6.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct NormStats {
    /// Smallest coefficient seen across the training set.
    pub min: f32,
    /// Largest coefficient seen across the training set.
    pub max: f32,
}

impl NormStats {
    /// Compute global statistics over a set of tensors.
    ///
    /// An empty set yields the degenerate range [0, 0].
    pub fn from_tensors<'a>(tensors: impl IntoIterator<Item = &'a FeatureTensor>) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for tensor in tensors {
            for &v in tensor.as_slice() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if min > max {
            // No data observed.
            min = 0.0;
            max = 0.0;
        }
        Self { min, max }
    }

    /// Width of the range, floored to avoid division by zero on constant data.
    #[must_use]
    pub fn span(&self) -> f32 {
        (self.max - self.min).max(1e-8)
    }
}
