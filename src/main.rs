// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::Result;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};

use crate::app_config::Config;
use crate::app_controller::Controller;

mod app_config;
mod app_controller;
mod audio_buffer;
mod errors;
mod file_utils;
mod media_extractor;
mod separator;
mod subtitle_parser;
mod track_assembler;
mod vocal_slicer;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

impl From<&app_config::LogLevel> for LevelFilter {
    fn from(level: &app_config::LogLevel) -> Self {
        match level {
            app_config::LogLevel::Error => LevelFilter::Error,
            app_config::LogLevel::Warn => LevelFilter::Warn,
            app_config::LogLevel::Info => LevelFilter::Info,
            app_config::LogLevel::Debug => LevelFilter::Debug,
            app_config::LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full dubbing pipeline (requires pre-synthesized clips)
    Dub(DubArgs),

    /// Parse subtitles, separate audio and slice voice references
    Prepare(PrepareArgs),

    /// Assemble synthesized clips into the final dubbed audio track
    Assemble(AssembleArgs),

    /// Generate shell completions for otodub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct DubArgs {
    /// Input video file with original audio and subtitles
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output video file with the dubbed audio track added
    #[arg(short, long)]
    output: PathBuf,

    /// Directory of synthesized replacement clips (dub_NNNN.wav)
    #[arg(short = 'd', long)]
    clips_dir: PathBuf,

    /// Working directory for intermediate files
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Stop after assembly (don't create the final container)
    #[arg(long)]
    skip_mux: bool,

    /// Separation model variant
    #[arg(long, default_value = "htdemucs_ft")]
    demucs_model: String,

    /// Device for the separation model
    #[arg(long, default_value = "cuda")]
    device: String,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct PrepareArgs {
    /// Input video file or subtitle document
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Working directory for manifests and reference clips
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Already-separated vocals WAV (required for bare subtitle input)
    #[arg(long)]
    vocals: Option<PathBuf>,

    /// Separation model variant
    #[arg(long, default_value = "htdemucs_ft")]
    demucs_model: String,

    /// Device for the separation model
    #[arg(long, default_value = "cuda")]
    device: String,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    /// Working directory holding the timeline manifest from `prepare`
    #[arg(value_name = "WORK_DIR")]
    work_dir: PathBuf,

    /// Directory of synthesized replacement clips (dub_NNNN.wav)
    #[arg(short = 'd', long)]
    clips_dir: PathBuf,

    /// Separated accompaniment WAV used as the mixing bed
    #[arg(short, long)]
    accompaniment: PathBuf,

    /// Output WAV path for the assembled dubbed audio
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// otodub: AI anime dubbing pipeline
///
/// Parses subtitles into a dialogue timeline, slices voice references from
/// the separated vocal track, and reassembles externally synthesized clips
/// into a dubbed audio track aligned with the original video.
#[derive(Parser, Debug)]
#[command(name = "otodub")]
#[command(version = "1.0.0")]
#[command(about = "AI-powered anime dubbing pipeline")]
#[command(long_about = "otodub turns a subtitled episode into a dubbed one while keeping \
every line in sync with the original video.

EXAMPLES:
    otodub prepare episode.mkv -w work/           # Timeline + voice references
    otodub assemble work/ -d clips/ -a work/separated/htdemucs_ft/audio/no_vocals.wav -o dubbed.wav
    otodub dub episode.mkv -o dubbed.mkv -d clips/ # Full pipeline with pre-made clips
    otodub completions bash > otodub.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, defaults are used.

PIPELINE:
    prepare    extract subtitles and audio, separate vocals, slice references,
               write timeline.json/segments.json manifests
    (external) transcribe references and synthesize dub_NNNN.wav clips
    assemble   place clips on the timeline, mix with the accompaniment, normalize")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m", color, now, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Load config, apply a CLI log-level override and update the logger level
fn load_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if file_utils::FileManager::file_exists(config_path) {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(level) = log_level {
        config.log_level = level.into();
    }
    log::set_max_level((&config.log_level).into());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "otodub", &mut std::io::stdout());
            Ok(())
        }
        Commands::Prepare(args) => {
            let config = load_config(&args.config_path, args.log_level)?;
            let controller = Controller::with_config(config)?;
            let work_dir = args
                .work_dir
                .unwrap_or_else(|| default_work_dir(&args.input_path));
            let outcome = controller
                .prepare(
                    &args.input_path,
                    &work_dir,
                    args.vocals.as_deref(),
                    &args.demucs_model,
                    &args.device,
                )
                .await?;
            log::info!(
                "Manifests ready: {} / {}",
                outcome.timeline_path.display(),
                outcome.segments_path.display()
            );
            Ok(())
        }
        Commands::Assemble(args) => {
            let config = load_config(&args.config_path, args.log_level)?;
            let controller = Controller::with_config(config)?;
            controller.assemble_clips(
                &args.work_dir,
                &args.clips_dir,
                &args.accompaniment,
                &args.output,
            )?;
            Ok(())
        }
        Commands::Dub(args) => {
            let config = load_config(&args.config_path, args.log_level)?;
            let controller = Controller::with_config(config)?;
            let work_dir = args
                .work_dir
                .unwrap_or_else(|| default_work_dir(&args.input_path));
            controller
                .run(
                    &args.input_path,
                    &args.output,
                    &work_dir,
                    &args.clips_dir,
                    &args.demucs_model,
                    &args.device,
                    args.force_overwrite,
                    args.skip_mux,
                )
                .await
        }
    }
}

/// Default work directory derived from the input file stem
fn default_work_dir(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "episode".to_string());
    std::env::temp_dir().join(format!("otodub_{}", stem))
}
