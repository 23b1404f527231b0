/// Linear-interpolation resampler.
///
/// Good enough for speech-band features at 8 kHz; clips are short and the
/// MFCC stage discards fine spectral detail anyway.
///
/// # Example
/// ```
/// use rd_audio::resample::resample_linear;
/// let input = vec![0.0, 1.0, 0.0, -1.0];
/// let out = resample_linear(&input, 8000, 4000);
/// assert_eq!(out.len(), 2);
/// ```
#[must_use]
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = if idx + 1 < samples.len() {
            samples[idx + 1]
        } else {
            a
        };
        out.push(a + (b - a) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 8000, 8000), input);
    }

    #[test]
    fn halves_length_on_2x_downsample() {
        let input = vec![0.0; 16000];
        assert_eq!(resample_linear(&input, 16000, 8000).len(), 8000);
    }

    #[test]
    fn upsample_interpolates_between_samples() {
        let input = vec![0.0, 1.0];
        let out = resample_linear(&input, 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn preserves_dc_level() {
        let input = vec![0.25; 44100];
        let out = resample_linear(&input, 44100, 8000);
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }
}
