use std::path::Path;

use anyhow::{Context, Result};

/// Write mono f32 samples as a 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1] before conversion.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
///
/// # Example
/// ```no_run
/// use rd_audio::wav::write_wav_i16;
/// write_wav_i16("clip.wav", &[0.0; 8000], 8000).unwrap();
/// ```
pub fn write_wav_i16(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Cannot create WAV file: {}", path.display()))?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(v)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Cannot finalize WAV file: {}", path.display()))?;
    Ok(())
}
