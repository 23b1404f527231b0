use thiserror::Error;

/// Errors originating from the model module.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A class has no usable training samples.
    #[error("Both classes need at least one sample; class \"{class}\" has none")]
    EmptyClass {
        /// Name of the empty class.
        class: String,
    },

    /// The artifact bytes do not start with the expected magic.
    #[error("Not a roardet model artifact (bad magic)")]
    BadMagic,

    /// The artifact was written by an incompatible format version.
    #[error("Unsupported artifact version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the artifact.
        found: u16,
        /// Version this build supports.
        supported: u16,
    },

    /// Artifact (de)serialization failure.
    #[error("Artifact serialization error: {0}")]
    Serialization(String),

    /// Malformed C header text.
    #[error("Cannot parse C array header: {0}")]
    Header(String),

    /// Input did not match the model's expected tensor shape.
    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
