use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rd_model::detector::{Detector, Prediction};

/// roardet-run — Classify an audio clip with a trained tiger roar model.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// WAV (or MP3/FLAC/OGG) file to classify.
    #[arg(required_unless_present = "mic", conflicts_with = "mic")]
    audio: Option<PathBuf>,

    /// Record a clip from the default microphone instead of reading a file.
    #[arg(long)]
    mic: bool,

    /// Path to the trained model artifact.
    #[arg(long, default_value = "tiger_audio_model.bin")]
    model: PathBuf,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    let mut detector = Detector::load(&cli.model)?;

    let prediction = if cli.mic {
        classify_mic(&mut detector)?
    } else {
        // clap guarantees the path is present when --mic is absent.
        let Some(audio) = cli.audio else {
            anyhow::bail!("no audio file given");
        };
        detector.classify_file(&audio)?
    };

    println!(
        "Prediction: {} (confidence: {:.2})",
        prediction.class_name, prediction.confidence
    );
    Ok(())
}

/// Record one clip at the model's trained duration and rate, then classify
/// it through the same file path as on-disk clips.
#[cfg(feature = "mic")]
fn classify_mic(detector: &mut Detector) -> Result<Prediction> {
    use anyhow::Context;

    let feature = detector.feature_config().clone();
    println!(
        "Recording {:.0} seconds from the default microphone...",
        feature.duration_secs
    );
    let samples = rd_audio::capture::record_clip(feature.duration_secs, feature.sample_rate)?;

    // The temp WAV is removed on drop, even if classification fails.
    let recording = tempfile::Builder::new()
        .prefix("roardet-")
        .suffix(".wav")
        .tempfile()
        .context("creating temporary recording")?;
    rd_audio::wav::write_wav_i16(recording.path(), &samples, feature.sample_rate)?;
    detector.classify_file(recording.path())
}

#[cfg(not(feature = "mic"))]
fn classify_mic(_detector: &mut Detector) -> Result<Prediction> {
    anyhow::bail!(
        "microphone capture was compiled out; rebuild with `--features mic` \
         or pass an audio file instead"
    )
}
