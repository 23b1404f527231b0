// CNN training, int8 quantization, and quantized inference for roardet.

pub mod artifact;
pub mod c_array;
pub mod cnn;
pub mod detector;
pub mod error;
pub mod interpreter;
pub mod quantize;
pub mod train;

pub use artifact::{ModelArtifact, QuantizedNet};
pub use detector::{Detector, Prediction};
pub use error::ModelError;
pub use train::Dataset;
