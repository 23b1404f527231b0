use rd_core::config::FeatureConfig;
use rd_core::tensor::FeatureTensor;

use crate::fft::FftPipeline;

/// Floor for log-power, matching the usual -100 dB reference.
const POWER_FLOOR: f32 = 1e-10;

/// MFCC feature extractor with a fixed output shape.
///
/// Pipeline per frame: Hann window → power spectrum → HTK mel filterbank →
/// 10·log10 → DCT-II (orthonormal) → first `n_mfcc` coefficients. Frames
/// beyond `time_steps` are dropped; missing frames are zero-padded, so the
/// output shape is `(time_steps, n_mfcc, 1)` for any input length.
///
/// # Example
/// ```
/// use rd_audio::mfcc::MfccExtractor;
/// use rd_core::config::FeatureConfig;
///
/// let config = FeatureConfig::default();
/// let mut extractor = MfccExtractor::new(&config);
/// let half_second = vec![0.0f32; 4000];
/// let tensor = extractor.extract(&half_second);
/// assert_eq!(tensor.shape(), (64, 13, 1));
/// ```
pub struct MfccExtractor {
    config: FeatureConfig,
    fft: FftPipeline,
    /// Dense filterbank, `n_mels` rows of `n_fft/2 + 1` weights.
    mel_filters: Vec<Vec<f32>>,
    /// DCT-II matrix, `n_mfcc` rows of `n_mels` coefficients.
    dct: Vec<f32>,
}

impl MfccExtractor {
    /// Build an extractor for the given parameters.
    #[must_use]
    pub fn new(config: &FeatureConfig) -> Self {
        let fft = FftPipeline::new(config.n_fft);
        let mel_filters = mel_filterbank(
            config.n_mels,
            config.n_fft,
            config.sample_rate,
        );
        let dct = dct_matrix(config.n_mfcc, config.n_mels);
        Self {
            config: config.clone(),
            fft,
            mel_filters,
            dct,
        }
    }

    /// The parameters this extractor was built with.
    #[must_use]
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the fixed-shape feature tensor from mono samples at the
    /// configured sample rate.
    ///
    /// Input longer than `duration_secs` is truncated first; shorter input
    /// (including empty) yields zero-padded trailing frames.
    pub fn extract(&mut self, samples: &[f32]) -> FeatureTensor {
        let cfg = &self.config;
        let max_samples = cfg.samples_per_clip();
        let samples = &samples[..samples.len().min(max_samples)];

        let n_frames = frame_count(samples.len(), cfg.n_fft, cfg.hop_length);
        let n_frames = n_frames.min(cfg.time_steps);

        let mut tensor = FeatureTensor::zeroed(cfg.time_steps, cfg.n_mfcc);
        let mut mel_log = vec![0.0f32; cfg.n_mels];

        for t in 0..n_frames {
            let start = t * cfg.hop_length;
            let end = (start + cfg.n_fft).min(samples.len());
            let power = self.fft.power_spectrum(&samples[start..end]);

            for (band, filter) in self.mel_filters.iter().enumerate() {
                let energy: f32 = filter
                    .iter()
                    .zip(power.iter())
                    .map(|(w, p)| w * p)
                    .sum();
                mel_log[band] = 10.0 * energy.max(POWER_FLOOR).log10();
            }

            for m in 0..cfg.n_mfcc {
                let row = &self.dct[m * cfg.n_mels..(m + 1) * cfg.n_mels];
                let coeff: f32 = row.iter().zip(mel_log.iter()).map(|(d, x)| d * x).sum();
                tensor.set(t, m, coeff);
            }
        }

        tensor
    }
}

/// Number of analysis frames for `len` samples without centering.
fn frame_count(len: usize, n_fft: usize, hop: usize) -> usize {
    if len == 0 {
        0
    } else if len < n_fft {
        // Single zero-padded frame.
        1
    } else {
        1 + (len - n_fft) / hop
    }
}

/// HTK mel scale.
fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over `n_fft/2 + 1` power bins, 0 Hz to Nyquist.
fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let mel_max = hz_to_mel(nyquist);

    // n_mels + 2 edge points, evenly spaced on the mel scale.
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let bin_hz = sample_rate as f32 / n_fft as f32;
    let mut filters = Vec::with_capacity(n_mels);

    for band in 0..n_mels {
        let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
        let mut weights = vec![0.0f32; n_bins];
        for (bin, w) in weights.iter_mut().enumerate() {
            let f = bin as f32 * bin_hz;
            if f > lo && f < hi {
                *w = if f <= center {
                    (f - lo) / (center - lo).max(f32::EPSILON)
                } else {
                    (hi - f) / (hi - center).max(f32::EPSILON)
                };
            }
        }
        filters.push(weights);
    }

    filters
}

/// Orthonormal DCT-II matrix, `n_out` rows × `n_in` columns.
fn dct_matrix(n_out: usize, n_in: usize) -> Vec<f32> {
    let mut matrix = vec![0.0f32; n_out * n_in];
    let norm0 = (1.0 / n_in as f32).sqrt();
    let norm = (2.0 / n_in as f32).sqrt();
    for k in 0..n_out {
        let scale = if k == 0 { norm0 } else { norm };
        for n in 0..n_in {
            matrix[k * n_in + n] = scale
                * (std::f32::consts::PI * k as f32 * (2.0 * n as f32 + 1.0)
                    / (2.0 * n_in as f32))
                    .cos();
        }
    }
    matrix
}
