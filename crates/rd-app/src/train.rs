use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rd_audio::dataset::DirectoryClipSource;
use rd_core::config::Config;
use rd_core::label::Label;
use rd_core::traits::ClipSource;
use rd_model::c_array;
use rd_model::train::{Dataset, train};

/// roardet-train — Train the tiger roar detector and export the quantized model.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory of Tiger WAV clips.
    #[arg(long, default_value = "sample-voice-tiger")]
    tiger_dir: PathBuf,

    /// Directory of Non-Tiger WAV clips.
    #[arg(long, default_value = "sample-voice-non-tiger")]
    non_tiger_dir: PathBuf,

    /// Output path for the binary model artifact.
    #[arg(long, default_value = "tiger_audio_model.bin")]
    model_out: PathBuf,

    /// Output path for the embeddable C array header.
    #[arg(long, default_value = "tiger_audio_model.h")]
    header_out: PathBuf,

    /// Optional TOML configuration file (feature + training parameters).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    // 1. Parse CLI
    let cli = Cli::parse();

    // 2. Initialize logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    // 3. Load the config (defaults when no file is given)
    let config = Config::load_or_default(cli.config.as_deref())?;
    config.feature.validate()?;

    // 4. Assemble the labeled dataset from both class directories
    log::info!(
        "Loading training data from {} and {}",
        cli.tiger_dir.display(),
        cli.non_tiger_dir.display()
    );
    let mut tiger = DirectoryClipSource::new(&cli.tiger_dir, Label::Tiger);
    let mut non_tiger = DirectoryClipSource::new(&cli.non_tiger_dir, Label::NonTiger);
    let mut sources: Vec<&mut dyn ClipSource> = vec![&mut tiger, &mut non_tiger];
    let dataset = Dataset::from_sources(&mut sources, &config.feature);

    // 5. Train, calibrate, quantize
    let artifact = train(dataset, &config.feature, &config.training)?;

    // 6. Write the artifact and its C-array twin from the same bytes
    let bytes = artifact.to_bytes()?;
    std::fs::write(&cli.model_out, &bytes)?;
    c_array::write_c_header(&cli.header_out, &bytes)?;

    println!("Model artifact written to {}", cli.model_out.display());
    println!(
        "C array header written to {} (deploy it to the embedded target)",
        cli.header_out.display()
    );
    Ok(())
}
