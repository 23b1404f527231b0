use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rd_core::label::Label;
use rd_core::traits::{ClipSource, LabeledClip};

use crate::decode::decode_file;

/// Clip source backed by a directory of `.wav` files, all one class.
///
/// Files are matched by case-insensitive extension and visited in sorted
/// order. A missing directory is a warning, not an error: the source is
/// simply empty, and the trainer's both-classes-required check fires later.
pub struct DirectoryClipSource {
    files: Vec<PathBuf>,
    next: usize,
    label: Label,
}

impl DirectoryClipSource {
    /// Scan `dir` for WAV files labeled `label`.
    #[must_use]
    pub fn new(dir: &Path, label: Label) -> Self {
        let mut files = Vec::new();
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_wav = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
                    if is_wav && path.is_file() {
                        files.push(path);
                    }
                }
                files.sort();
            }
            Err(e) => {
                log::warn!(
                    "Class directory {} not readable ({e}); no {} samples will be loaded",
                    dir.display(),
                    label
                );
            }
        }
        Self {
            files,
            next: 0,
            label,
        }
    }

    /// Number of WAV files found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if the scan found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn load(&self, path: &Path) -> Result<LabeledClip> {
        let (samples, sample_rate) =
            decode_file(path).with_context(|| format!("Cannot decode {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
            .to_string();
        Ok(LabeledClip {
            samples,
            sample_rate,
            label: self.label,
            name,
        })
    }
}

impl ClipSource for DirectoryClipSource {
    fn next_clip(&mut self) -> Option<Result<LabeledClip>> {
        let path = self.files.get(self.next)?.clone();
        self.next += 1;
        Some(self.load(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::write_wav_i16;

    #[test]
    fn scans_wav_files_case_insensitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wav_i16(dir.path().join("a.wav"), &[0.0; 100], 8000).expect("write");
        write_wav_i16(dir.path().join("b.WAV"), &[0.0; 100], 8000).expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let mut source = DirectoryClipSource::new(dir.path(), Label::Tiger);
        assert_eq!(source.len(), 2);

        let mut clips = 0;
        while let Some(clip) = source.next_clip() {
            let clip = clip.expect("decode");
            assert_eq!(clip.label, Label::Tiger);
            assert_eq!(clip.sample_rate, 8000);
            clips += 1;
        }
        assert_eq!(clips, 2);
    }

    #[test]
    fn missing_directory_is_empty_not_fatal() {
        let source = DirectoryClipSource::new(Path::new("no/such/dir"), Label::NonTiger);
        assert!(source.is_empty());
    }

    #[test]
    fn undecodable_file_yields_a_skippable_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.wav"), b"not a wav").expect("write");

        let mut source = DirectoryClipSource::new(dir.path(), Label::Tiger);
        assert_eq!(source.len(), 1);
        let item = source.next_clip().expect("one item");
        assert!(item.is_err());
        assert!(source.next_clip().is_none());
    }
}
