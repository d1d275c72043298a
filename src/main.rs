//! imgbatch CLI - Concurrent Batch Image Converter
//!
//! Converts every image in a directory, optionally resizing and re-encoding
//! it, and reports per-file progress and a final summary.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde::Serialize;
use tracing::{debug, info};

use imgbatch::filesystem::{ensure_output_dir, validate_input_dir};
use imgbatch::parallel::ConsoleProgressReporter;
use imgbatch::processing::formats::{normalize_format, supported_input_formats};
use imgbatch::{
    init_logging, BatchCoordinator, BatchStats, CancellationFlag, Config, ConversionProfile,
    ConversionSettings, ConvertError, Converter, ExecutionStrategy, FsScanner, ImageFormat,
    ResizeRequest,
};

/// imgbatch - Concurrent Batch Image Converter
#[derive(Parser)]
#[command(
    name = "imgbatch",
    version,
    about = "Batch-convert and resize every image in a directory",
    long_about = "imgbatch decodes each supported image in an input directory, optionally \
                  resizes it (by scale factor or bounding pixel dimensions, aspect ratio \
                  preserved), optionally re-encodes it to another format, and writes the \
                  result to an output directory. Failing files are reported and skipped; \
                  the batch always finishes."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory containing the images to convert
    #[arg(short, long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Directory to write converted images to (created if missing)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Scale factor, e.g. 0.5 for half size
    #[arg(short, long, value_name = "FACTOR", allow_negative_numbers = true)]
    scale: Option<f64>,

    /// Target width in pixels (with --height: fit inside the box)
    #[arg(short, long, value_name = "PIXELS", allow_negative_numbers = true)]
    width: Option<i64>,

    /// Target height in pixels (with --width: fit inside the box)
    #[arg(short = 'H', long, value_name = "PIXELS", allow_negative_numbers = true)]
    height: Option<i64>,

    /// Output format: jpeg, jpg, png, webp, gif or bmp (default: keep source format)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// JPEG/WebP quality (1-100) [default: 85]
    #[arg(
        short = 'q',
        long,
        visible_alias = "quality",
        value_name = "QUALITY",
        allow_negative_numbers = true
    )]
    jpeg_quality: Option<i64>,

    /// Number of concurrent workers (default: number of CPUs)
    #[arg(short, long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Worker scheduling strategy
    #[arg(long, value_enum, value_name = "STRATEGY")]
    strategy: Option<CliStrategy>,

    /// Configuration file path (.toml or .yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Conversion profile name
    #[arg(short, long, value_name = "NAME")]
    profile: Option<String>,

    /// Print the summary as JSON instead of progress lines
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// List supported input and output formats
    Formats,
    /// List conversion profiles
    Profiles {
        /// Show profile settings
        #[arg(long)]
        detailed: bool,
    },
    /// Validate configuration file
    CheckConfig {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path (.toml or .yaml)
        #[arg(short, long, default_value = "imgbatch.toml")]
        output: PathBuf,
    },
}

/// CLI-compatible strategy enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliStrategy {
    Async,
    ThreadPool,
}

impl From<CliStrategy> for ExecutionStrategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Async => ExecutionStrategy::Async,
            CliStrategy::ThreadPool => ExecutionStrategy::ThreadPool,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        init_logging(log_level(&cli, "warn"), false);
        if let Err(e) = handle_subcommand(&cli, command) {
            eprintln!("{}: {:#}", style("Error").red().bold(), e);
            process::exit(1);
        }
        return;
    }

    let start_time = Instant::now();
    match run_batch(&cli).await {
        Ok(stats) => {
            if let Err(e) = print_summary(&stats, start_time.elapsed(), cli.json) {
                eprintln!("{}: {:#}", style("Error").red().bold(), e);
                process::exit(1);
            }
            if !stats.all_succeeded() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {:#}", style("Error").red().bold(), e);
            process::exit(1);
        }
    }
}

fn log_level<'a>(cli: &Cli, configured: &'a str) -> &'a str {
    if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        configured
    }
}

/// Handle subcommands
fn handle_subcommand(cli: &Cli, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Formats => show_formats(),
        Commands::Profiles { detailed } => {
            let config = load_config(cli.config.as_deref())?;
            show_profiles(&config, *detailed);
        }
        Commands::CheckConfig { file } => validate_config_file(file)?,
        Commands::ExampleConfig { output } => generate_example_config(output)?,
    }
    Ok(())
}

/// Validate everything, then convert the input directory
async fn run_batch(cli: &Cli) -> anyhow::Result<BatchStats> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(
        log_level(cli, &config.logging.level),
        config.logging.json_format,
    );

    let (input_dir, output_dir) = match (&cli.input_dir, &cli.output_dir) {
        (Some(input), Some(output)) => (input.as_path(), output.as_path()),
        _ => bail!("--input-dir and --output-dir are required (run with --help for usage)"),
    };

    let settings = resolve_settings(cli, &config)?;
    let concurrency = resolve_concurrency(cli, &config)?;
    let strategy = cli
        .strategy
        .map_or(config.processing.strategy, ExecutionStrategy::from);

    validate_input_dir(input_dir)?;
    ensure_output_dir(output_dir)?;

    info!("Input: {:?}", input_dir);
    info!("Output: {:?}", output_dir);
    debug!("Settings: {:?}, strategy: {}", settings, strategy);

    let cancellation = CancellationFlag::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        });
    }

    let coordinator = BatchCoordinator::new(concurrency).with_cancellation(cancellation);

    let reporter = if cli.json {
        None
    } else {
        let show_bar = !cli.quiet && console::Term::stdout().is_term();
        let reporter = ConsoleProgressReporter::new(coordinator.progress(), show_bar);
        Some(tokio::spawn(reporter.start_reporting()))
    };

    let result = coordinator
        .run_directory(
            &FsScanner,
            input_dir,
            output_dir,
            strategy,
            Arc::new(Converter::new(settings)),
        )
        .await;

    if let Some(reporter) = reporter {
        if result.is_ok() {
            // Let the last progress lines flush before the summary
            let _ = reporter.await;
        } else {
            reporter.abort();
        }
    }

    Ok(result?)
}

fn load_config(path: Option<&Path>) -> imgbatch::Result<Config> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Merge config defaults, the selected profile and command-line overrides
fn resolve_settings(cli: &Cli, config: &Config) -> imgbatch::Result<ConversionSettings> {
    let mut settings = match &cli.profile {
        Some(name) => config.get_profile(name)?.to_settings(),
        None => ConversionSettings {
            quality: config.processing.default_quality,
            ..Default::default()
        },
    };

    if let Some(request) = resize_request(cli)? {
        settings.resize = request;
    }

    if let Some(format) = &cli.format {
        normalize_format(format).map_err(|_| {
            ConvertError::config(format!(
                "Unsupported output format '{}'. Supported: jpeg, jpg, png, webp, gif, bmp",
                format
            ))
        })?;
        settings.format = Some(format.clone());
    }

    if let Some(quality) = cli.jpeg_quality {
        settings.quality = u8::try_from(quality)
            .ok()
            .filter(|q| (1..=100).contains(q))
            .ok_or_else(|| {
                ConvertError::config(format!("Quality must be between 1 and 100, got {}", quality))
            })?;
    }

    Ok(settings)
}

/// Resize request from the command line, if any resize flag was given
fn resize_request(cli: &Cli) -> imgbatch::Result<Option<ResizeRequest>> {
    if cli.scale.is_none() && cli.width.is_none() && cli.height.is_none() {
        return Ok(None);
    }

    let scale = cli.scale.unwrap_or(0.0);
    if !scale.is_finite() || scale < 0.0 {
        return Err(ConvertError::config(format!(
            "Scale must be a non-negative number, got {}",
            scale
        )));
    }

    let request = ResizeRequest {
        scale,
        width: pixel_value("width", cli.width)?,
        height: pixel_value("height", cli.height)?,
    };
    request.validate()?;

    Ok(Some(request))
}

fn pixel_value(name: &str, value: Option<i64>) -> imgbatch::Result<u32> {
    let value = value.unwrap_or(0);
    if value < 0 {
        return Err(ConvertError::config(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    u32::try_from(value)
        .map_err(|_| ConvertError::config(format!("{} is too large: {}", name, value)))
}

fn resolve_concurrency(cli: &Cli, config: &Config) -> imgbatch::Result<usize> {
    match cli.threads {
        Some(0) => Err(ConvertError::config("Thread count must be greater than 0")),
        Some(threads) => Ok(threads),
        None => Ok(config.processing.concurrency()),
    }
}

/// List supported formats
fn show_formats() {
    println!("{}", style("Input extensions:").bold());
    println!("  {}", supported_input_formats().join(", "));
    println!();

    println!("{}", style("Output formats:").bold());
    for format in ImageFormat::ALL {
        let aliases = if format == ImageFormat::Jpeg { " (alias: jpg)" } else { "" };
        println!(
            "  {:<6} .{:<5} {}{}",
            style(format.name()).cyan(),
            format.extension(),
            format.mime_type(),
            aliases
        );
    }
    println!();
    println!("Quality applies to JPEG and WebP; PNG, GIF and BMP are lossless.");
}

/// Show available profiles
fn show_profiles(config: &Config, detailed: bool) {
    println!("{}", style("Available Conversion Profiles:").bold());
    println!();

    let mut names: Vec<_> = config.profiles.keys().collect();
    names.sort();

    for name in names {
        println!("{}", style(name).cyan().bold());
        if detailed {
            if let Some(profile) = config.profiles.get(name) {
                println!("  {}", describe_profile(profile));
                println!();
            }
        }
    }

    if !detailed {
        println!();
        println!("Use {} for detailed information", style("--detailed").dim());
    }
}

fn describe_profile(profile: &ConversionProfile) -> String {
    let resize = &profile.resize;
    let geometry = if resize.scale > 0.0 {
        format!("scale {}", resize.scale)
    } else if resize.width > 0 && resize.height > 0 {
        format!("fit {}x{}", resize.width, resize.height)
    } else if resize.width > 0 {
        format!("width {}px", resize.width)
    } else if resize.height > 0 {
        format!("height {}px", resize.height)
    } else {
        "original size".to_string()
    };

    format!(
        "{}, format {}, quality {}",
        geometry,
        profile.format.as_deref().unwrap_or("unchanged"),
        profile.quality
    )
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)
        .with_context(|| format!("cannot load {}", file_path.display()))?;
    config.validate()?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Profiles: {}", config.profiles.len());
    println!("Strategy: {}", config.processing.strategy);
    println!("Workers: {}", config.processing.concurrency());

    Ok(())
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path) -> anyhow::Result<()> {
    Config::default().to_file(output_path)?;

    println!(
        "{}: Generated example configuration: {}",
        style("Success").green().bold(),
        output_path.display()
    );

    Ok(())
}

#[derive(Serialize)]
struct JsonSummary {
    #[serde(flatten)]
    stats: BatchStats,
    duration_secs: f64,
}

/// Print processing summary
fn print_summary(stats: &BatchStats, duration: Duration, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let summary = JsonSummary {
            stats: *stats,
            duration_secs: duration.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("{}", style("Summary:").bold());
    println!("  Total: {}", stats.total);
    println!("  {}: {}", style("Success").green(), stats.success);
    println!("  {}: {}", style("Failed").red(), stats.failed);
    println!("  {}: {}", style("Skipped").yellow(), stats.skipped);
    println!("  {}: {:.2}s", style("Duration").blue(), duration.as_secs_f64());

    Ok(())
}
