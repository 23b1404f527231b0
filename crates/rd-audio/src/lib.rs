// Audio decoding, resampling, MFCC extraction, and capture for roardet.

#[cfg(feature = "mic")]
pub mod capture;
pub mod dataset;
pub mod decode;
pub mod error;
pub mod fft;
pub mod mfcc;
pub mod resample;
pub mod wav;

pub use dataset::DirectoryClipSource;
pub use error::AudioError;
pub use mfcc::MfccExtractor;
