use std::time::{Duration, Instant};

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

use crate::error::AudioError;
use crate::resample::resample_linear;

/// Microphone capture via cpal.
///
/// Writes mono f32 samples into a lock-free ring buffer.
///
/// # Example
/// ```no_run
/// use rd_audio::capture::AudioCapture;
/// let capture = AudioCapture::start_default().unwrap();
/// ```
pub struct AudioCapture {
    /// Held so the input stream keeps running; dropped on teardown.
    _stream: cpal::Stream,
    consumer: Consumer<f32>,
    sample_rate: u32,
}

impl AudioCapture {
    /// Start capturing from the default input device.
    ///
    /// # Errors
    /// Returns an error if no input device is available or the stream
    /// cannot be built.
    pub fn start_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        // Ring buffer: 2 seconds of audio @ sample_rate
        let buf_size = sample_rate as usize * 2;
        let (mut producer, consumer) = RingBuffer::new(buf_size);

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix to mono and push into ring buffer
                for chunk in data.chunks(channels) {
                    let mono: f32 = chunk.iter().sum::<f32>() / channels as f32;
                    let _ = producer.push(mono);
                }
            },
            |err| {
                log::error!("Audio stream error: {err}");
            },
            None,
        )?;

        stream.play()?;

        Ok(Self {
            _stream: stream,
            consumer,
            sample_rate,
        })
    }

    /// Read available samples from the ring buffer into `out`.
    ///
    /// Returns how many samples were read.
    pub fn read_samples(&mut self, out: &mut Vec<f32>) -> usize {
        let available = self.consumer.slots();
        out.reserve(available);
        let mut count = 0;
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
            count += 1;
        }
        count
    }

    /// The sample rate of the capture stream.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Record `duration_secs` from the default microphone and resample to
/// `target_rate`.
///
/// Blocks until enough samples have been captured (plus a small safety
/// margin on the deadline in case the device stalls).
///
/// # Errors
/// Returns an error if no input device is available or the stream fails.
pub fn record_clip(duration_secs: f32, target_rate: u32) -> Result<Vec<f32>> {
    let mut capture = AudioCapture::start_default()?;
    let native_rate = capture.sample_rate();
    let needed = (native_rate as f32 * duration_secs) as usize;

    let deadline = Instant::now() + Duration::from_secs_f32(duration_secs * 2.0 + 2.0);
    let mut samples: Vec<f32> = Vec::with_capacity(needed);

    while samples.len() < needed {
        capture.read_samples(&mut samples);
        if samples.len() >= needed {
            break;
        }
        if Instant::now() > deadline {
            return Err(AudioError::StreamError(format!(
                "capture stalled: got {} of {needed} samples",
                samples.len()
            ))
            .into());
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    samples.truncate(needed);
    Ok(resample_linear(&samples, native_rate, target_rate))
}
