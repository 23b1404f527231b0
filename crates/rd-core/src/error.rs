use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A feature tensor did not have the expected fixed shape.
    #[error("Invalid tensor shape: expected {expected} values, got {actual}")]
    InvalidShape {
        /// Expected flat length (time_steps × n_mfcc).
        expected: usize,
        /// Actual flat length.
        actual: usize,
    },
}
