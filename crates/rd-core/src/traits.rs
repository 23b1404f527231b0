use crate::label::Label;

/// A decoded, labeled audio clip at its native sample rate.
#[derive(Debug, Clone)]
pub struct LabeledClip {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Native sample rate of the decoded audio, in Hz.
    pub sample_rate: u32,
    /// Class of this clip.
    pub label: Label,
    /// Display name for log messages (usually the file name).
    pub name: String,
}

/// Supplies labeled clips to the trainer.
///
/// Implemented by `DirectoryClipSource`; tests inject synthetic sources.
/// The trainer treats a `Some(Err(..))` item as a skippable sample: it is
/// logged and dropped, and iteration continues.
///
/// # Example
/// ```
/// use rd_core::traits::{ClipSource, LabeledClip};
///
/// struct Silence(usize);
/// impl ClipSource for Silence {
///     fn next_clip(&mut self) -> Option<anyhow::Result<LabeledClip>> {
///         if self.0 == 0 {
///             return None;
///         }
///         self.0 -= 1;
///         Some(Ok(LabeledClip {
///             samples: vec![0.0; 8000],
///             sample_rate: 8000,
///             label: rd_core::Label::NonTiger,
///             name: "silence".into(),
///         }))
///     }
/// }
/// ```
pub trait ClipSource {
    /// Return the next clip, or `None` when the source is exhausted.
    fn next_clip(&mut self) -> Option<anyhow::Result<LabeledClip>>;
}
