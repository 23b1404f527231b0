/// Configuration, types, and shared structures for roardet.
///
/// This crate contains all shared types, traits, and configuration logic
/// used across the roardet workspace.

pub mod config;
pub mod error;
pub mod label;
pub mod tensor;
pub mod traits;

pub use config::{Config, FeatureConfig, TrainConfig};
pub use error::CoreError;
pub use label::Label;
pub use tensor::{FeatureTensor, NormStats};
pub use traits::{ClipSource, LabeledClip};
