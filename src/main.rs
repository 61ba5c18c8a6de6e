use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use walkdir::WalkDir;

use cifar10_camera::config::Config;
use cifar10_camera::inference::{self, InferenceBackend, OnnxClassifier};
use cifar10_camera::interface::ClassificationOutcome;
use cifar10_camera::pipeline::Pipeline;
use cifar10_camera::ranking::{self, Prediction, RankedResult};
use cifar10_camera::Error;

#[derive(Parser)]
#[command(name = "cifar10-camera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model file, overriding the configuration
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Classify one or more photos
    Classify {
        /// Image files or directories of images
        paths: Vec<PathBuf>,
        /// Print one JSON object per image instead of text
        #[arg(long)]
        json: bool,
        /// Also list the N best classes with their scores
        #[arg(long, default_value = "2")]
        top: usize,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show the inputs and outputs the model declares
    Inspect,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so JSON output stays clean.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to read config {:?}", path))?,
        None => Config::default(),
    };
    if let Some(model) = cli.model {
        config.model_path = model;
    }

    match cli.command {
        Commands::Classify { paths, json, top, recursive } => classify(&config, &paths, json, top, recursive),
        Commands::Inspect => inspect(&config),
    }
}

fn classify(config: &Config, paths: &[PathBuf], json: bool, top: usize, recursive: bool) -> anyhow::Result<ExitCode> {
    let files = collect_images(paths, recursive);
    if files.is_empty() {
        println!("{}", Error::NoImageSelected.user_message());
        return Ok(ExitCode::FAILURE);
    }

    // Loaded exactly once; a binding problem means nothing can be classified.
    let classifier = match OnnxClassifier::load(&config.model_path, config.binding.clone(), config.intra_threads) {
        Ok(classifier) => classifier,
        Err(e) => {
            error!("Failed to load the model: {}", e);
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        },
    };

    let pipeline = Pipeline::new(&classifier, config.preprocessor())
        .with_exif_orientation(config.apply_exif_orientation);

    let mut failures = 0;
    for file in &files {
        let request_id = Uuid::new_v4();
        let source = file.display().to_string();

        let outcome = match classify_one(&pipeline, file, top) {
            Ok((result, predictions)) => {
                if !json {
                    print_result(&source, &result, &predictions);
                }
                ClassificationOutcome::success(request_id, &source, result, predictions)
            },
            Err(e) => {
                failures += 1;
                warn!("Request {} for {:?} failed: {}", request_id, file, e);
                if !json {
                    eprintln!("{}: {}", source, e.user_message());
                }
                ClassificationOutcome::failure(request_id, &source, &e)
            },
        };

        if json {
            println!("{}", serde_json::to_string(&outcome)?);
        }
    }

    info!("Classified {} of {} images", files.len() - failures, files.len());

    Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn classify_one<B: InferenceBackend + ?Sized>(
    pipeline: &Pipeline<'_, B>,
    file: &Path,
    top: usize,
) -> cifar10_camera::Result<(RankedResult, Vec<Prediction>)> {
    let image = pipeline.load(file)?;
    let scores = pipeline.scores(&image)?;
    let result = ranking::rank(&scores)?;

    // The top two are already in `result`.
    let predictions = if top > 2 { ranking::top_k(&scores, top)? } else { vec![] };

    Ok((result, predictions))
}

fn print_result(source: &str, result: &RankedResult, predictions: &[Prediction]) {
    println!("{}", source);
    println!("{}", result);
    for prediction in predictions {
        println!("  {:<12}{:.4}", prediction.label.name(), prediction.score);
    }
}

/// Files are taken as given; directories contribute the files whose extension
/// names an image format.
fn collect_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut entries: Vec<PathBuf> = WalkDir::new(path)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", path, e);
                    None
                },
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| image::ImageFormat::from_path(path).is_ok())
            .collect();
        entries.sort();
        files.extend(entries);
    }
    files
}

fn inspect(config: &Config) -> anyhow::Result<ExitCode> {
    let description = inference::describe_model(&config.model_path)
        .with_context(|| format!("Failed to open model {:?}", config.model_path))?;

    println!("{}", serde_json::to_string_pretty(&description)?);

    match config.binding.check(&description) {
        Ok(()) => {
            println!("Binding {:?} -> {:?} matches the model", config.binding.input_name, config.binding.output_name);
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            println!("{}", e);
            Ok(ExitCode::FAILURE)
        },
    }
}
