use std::path::Path;

use rd_core::config::FeatureConfig;
use rd_core::label::Label;
use rd_core::tensor::NormStats;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::quantize::QuantParams;

/// Magic prefix of every artifact.
pub const MAGIC: [u8; 4] = *b"RDTM";
/// Current artifact format version.
pub const FORMAT_VERSION: u16 = 1;

/// The int8 network weights and quantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedNet {
    /// Number of convolution filters.
    pub conv_filters: usize,
    /// Convolution kernel edge.
    pub kernel_size: usize,
    /// Width of the hidden dense layer.
    pub hidden_units: usize,
    /// Number of output classes.
    pub num_classes: usize,

    /// Input activation parameters ([0, 1] normalized features).
    pub input: QuantParams,

    /// Conv weights, `[filters, 1, k, k]` row-major, symmetric int8.
    pub conv_w: Vec<i8>,
    /// Conv weight scale.
    pub conv_w_scale: f32,
    /// Conv biases at scale `input.scale · conv_w_scale`.
    pub conv_b: Vec<i32>,
    /// Post-ReLU conv activation parameters.
    pub conv_out: QuantParams,

    /// Hidden dense weights, `[hidden, flat]` row-major.
    pub fc1_w: Vec<i8>,
    /// Hidden dense weight scale.
    pub fc1_w_scale: f32,
    /// Hidden dense biases at scale `conv_out.scale · fc1_w_scale`.
    pub fc1_b: Vec<i32>,
    /// Post-ReLU hidden activation parameters.
    pub fc1_out: QuantParams,

    /// Output dense weights, `[classes, hidden]` row-major.
    pub fc2_w: Vec<i8>,
    /// Output dense weight scale.
    pub fc2_w_scale: f32,
    /// Output dense biases at scale `fc1_out.scale · fc2_w_scale`.
    pub fc2_b: Vec<i32>,
}

/// The serialized, immutable model produced by `roardet-train`.
///
/// Carries everything inference needs: the exact feature parameters used
/// at training time, the training set's normalization statistics, and the
/// quantized network. There is deliberately no way to mutate a loaded
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    magic: [u8; 4],
    version: u16,
    /// Feature-extraction parameters fixed at training time.
    pub feature: FeatureConfig,
    /// Global min/max of the training set, applied before quantization.
    pub norm: NormStats,
    /// Class names in index order.
    pub class_names: Vec<String>,
    /// The quantized network.
    pub net: QuantizedNet,
}

impl ModelArtifact {
    /// Assemble a new artifact at the current format version.
    #[must_use]
    pub fn new(feature: FeatureConfig, norm: NormStats, net: QuantizedNet) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            feature,
            norm,
            class_names: Label::names(),
            net,
        }
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    /// Returns [`ModelError::Serialization`] on encoding failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serialize(self).map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Deserialize and validate magic and version.
    ///
    /// # Errors
    /// Returns [`ModelError::BadMagic`] or [`ModelError::UnsupportedVersion`]
    /// for foreign or future artifacts, [`ModelError::Serialization`] for
    /// corrupt ones.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
            return Err(ModelError::BadMagic);
        }
        let artifact: Self =
            bincode::deserialize(bytes).map_err(|e| ModelError::Serialization(e.to_string()))?;
        if artifact.version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: artifact.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(artifact)
    }

    /// Write the artifact to `path`.
    ///
    /// # Errors
    /// Returns an error on serialization or I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read and validate an artifact from `path`.
    ///
    /// # Errors
    /// Returns an error on I/O failure or if the file is not a valid
    /// artifact of the supported version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::QuantParams;

    pub(crate) fn tiny_net() -> QuantizedNet {
        QuantizedNet {
            conv_filters: 1,
            kernel_size: 3,
            hidden_units: 2,
            num_classes: 2,
            input: QuantParams::unit_input(),
            conv_w: vec![0; 9],
            conv_w_scale: 1.0,
            conv_b: vec![0],
            conv_out: QuantParams::from_range(0.0, 1.0),
            fc1_w: vec![0; 2],
            fc1_w_scale: 1.0,
            fc1_b: vec![0; 2],
            fc1_out: QuantParams::from_range(0.0, 1.0),
            fc2_w: vec![0; 4],
            fc2_w_scale: 1.0,
            fc2_b: vec![0; 2],
        }
    }

    #[test]
    fn byte_round_trip() {
        let artifact = ModelArtifact::new(
            FeatureConfig::default(),
            NormStats { min: -5.0, max: 9.0 },
            tiny_net(),
        );
        let bytes = artifact.to_bytes().expect("serialize");
        assert!(!bytes.is_empty());
        let back = ModelArtifact::from_bytes(&bytes).expect("deserialize");
        assert_eq!(back, artifact);
        assert_eq!(back.class_names, vec!["Non-Tiger", "Tiger"]);
    }

    #[test]
    fn rejects_foreign_bytes() {
        assert!(matches!(
            ModelArtifact::from_bytes(b"ONNXmodel..."),
            Err(ModelError::BadMagic)
        ));
        assert!(matches!(
            ModelArtifact::from_bytes(b""),
            Err(ModelError::BadMagic)
        ));
    }

    #[test]
    fn c_header_carries_the_exact_artifact_bytes() {
        let artifact = ModelArtifact::new(
            FeatureConfig::default(),
            NormStats { min: 0.0, max: 1.0 },
            tiny_net(),
        );
        let bytes = artifact.to_bytes().expect("serialize");
        let source = crate::c_array::to_c_source(
            &bytes,
            crate::c_array::DEFAULT_ARRAY_NAME,
            crate::c_array::DEFAULT_INCLUDE_GUARD,
        );
        let parsed = crate::c_array::parse_c_source(&source).expect("parse header");
        assert_eq!(parsed, bytes);
        assert_eq!(ModelArtifact::from_bytes(&parsed).expect("decode"), artifact);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        let artifact = ModelArtifact::new(
            FeatureConfig::default(),
            NormStats { min: 0.0, max: 1.0 },
            tiny_net(),
        );
        artifact.save(&path).expect("save");
        let back = ModelArtifact::load(&path).expect("load");
        assert_eq!(back, artifact);
    }
}
