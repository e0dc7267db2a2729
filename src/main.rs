//! arcpack - command line entry point.
//!
//! Converts each input ZIP in order and writes the `.arcpkg` packages to the
//! output directory. Archives without a config take their song details from
//! `--title/--artist/--bpm/--charter`; archives without a background use
//! `--background` if given.
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/arcpack.<date>
//! 2. Load `arcpack.yaml` from the config directory (plus `ARCPACK_*` env)
//! 3. Queue every input, checking sizes before reading
//! 4. Step through the batch, answering suspensions from the flags and
//!    writing each package as soon as its item settles
//! 5. Log metrics, exit non-zero if anything failed

use anyhow::{Context, Result};
use arcpack::logging::LogOptions;
use arcpack::pipeline::io;
use arcpack::{
    APP_NAME, BackgroundResponse, BatchProgress, BatchQueue, ConfigManager, Converter,
    InputProvider, InputRequest, Metrics, Overrides, StateManager, VERSION,
};
use camino::Utf8PathBuf;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "arcpack")]
#[command(about = "Convert chart package ZIPs into .arcpkg archives", version)]
struct Args {
    /// Input ZIP archives, converted in the order given
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    /// Directory for the generated packages
    #[arg(short, long, default_value = ".")]
    output_dir: Utf8PathBuf,

    /// Caller identity; overrides `user_id` from the config file
    #[arg(short, long, env = "ARCPACK_USER_ID")]
    user_id: Option<String>,

    /// Directory holding arcpack.yaml and the usage counter
    #[arg(long, default_value = arcpack::config::DEFAULT_CONFIG_DIR)]
    config_dir: Utf8PathBuf,

    /// Song title for archives without a config
    #[arg(long)]
    title: Option<String>,

    /// Artist for archives without a config
    #[arg(long)]
    artist: Option<String>,

    /// BPM for archives without a config
    #[arg(long)]
    bpm: Option<String>,

    /// Chart designer for archives without a config
    #[arg(long)]
    charter: Option<String>,

    /// Background image for archives that have none
    #[arg(long, conflicts_with = "skip_background")]
    background: Option<Utf8PathBuf>,

    /// Never ask for a background image
    #[arg(long)]
    skip_background: bool,

    /// Also write packlist/songlist JSON next to each package
    #[arg(long)]
    emit_descriptors: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Also log to the console
    #[arg(long)]
    console: bool,

    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> Option<Overrides> {
        if self.title.is_none() && self.artist.is_none() && self.bpm.is_none() && self.charter.is_none() {
            return None;
        }
        Some(Overrides {
            title: self.title.clone().unwrap_or_default(),
            artist: self.artist.clone().unwrap_or_default(),
            bpm: self.bpm.clone().unwrap_or_default(),
            charter: self.charter.clone().unwrap_or_default(),
        })
    }
}

/// Answers suspensions from command line flags.
struct FlagInputProvider {
    overrides: Option<Overrides>,
    background: Option<Vec<u8>>,
}

impl InputProvider for FlagInputProvider {
    fn request_overrides(&mut self, request: &InputRequest) -> Option<Overrides> {
        if self.overrides.is_none() {
            tracing::warn!(
                "{} has no config file; pass --title/--artist/--bpm/--charter to convert it",
                request.item()
            );
        }
        self.overrides.clone()
    }

    fn request_background_image(&mut self, request: &InputRequest) -> BackgroundResponse {
        match &self.background {
            Some(bytes) => BackgroundResponse::Provided(bytes.clone()),
            None => {
                tracing::info!("No background for {}, packaging without one", request.item());
                BackgroundResponse::Skipped
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _guard = arcpack::logging::setup_logging(&LogOptions {
        debug: args.debug,
        console: args.console,
        json: args.log_json,
        ..LogOptions::new("logs")
    })?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(&args.config_dir)?;
    let mut config = config_manager.load_config()?;
    if let Some(user_id) = &args.user_id {
        config.user_id = user_id.clone();
    }
    if args.skip_background {
        config.background.prompt = false;
    }

    let background = match &args.background {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read background image: {}", path))?,
        ),
        None => None,
    };

    let state_manager = StateManager::new();
    let metrics = Arc::new(Metrics::new());
    let max_input_bytes = config.max_input_bytes;

    let mut queue = BatchQueue::new(
        Converter::new(config),
        state_manager.clone(),
        Arc::clone(&metrics),
    )
    .with_counter(Box::new(config_manager.usage_counter()));

    let mut failed = 0usize;
    for input in &args.inputs {
        match io::load_job(input, max_input_bytes).await {
            Ok(job) => queue.push(job),
            Err(e) => {
                tracing::error!("{:#}", e);
                eprintln!("{}: {:#}", input, e);
                failed += 1;
            }
        }
    }

    let mut provider = FlagInputProvider {
        overrides: args.overrides(),
        background,
    };

    // Each package is written before the next item is converted
    let mut progress = queue.run_one();
    loop {
        for report in queue.take_reports() {
            match report.result {
                Ok(artifact) => {
                    match io::write_artifact(&args.output_dir, &artifact, args.emit_descriptors)
                        .await
                    {
                        Ok(path) => println!("{} -> {}", report.label, path),
                        Err(e) => {
                            tracing::error!("{:#}", e);
                            eprintln!("{}: {:#}", report.label, e);
                            failed += 1;
                        }
                    }
                }
                Err(e) => {
                    eprintln!("{}: {}", report.label, e);
                    failed += 1;
                }
            }
        }

        progress = match progress {
            BatchProgress::Finished => break,
            BatchProgress::Advanced => queue.run_one(),
            BatchProgress::Suspended(request) => queue.answer(&request, &mut provider),
        };
    }

    let summary = state_manager.read(|s| s.summary());
    if !summary.is_empty() {
        println!("{}", summary);
    }
    metrics.log_summary();

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
