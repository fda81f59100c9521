//! vtrack command-line entry point.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use vtrack_detector::DetectorClient;
use vtrack_media::{detect_media_file, extract_thumbnail, MediaKind, OverlayRenderer};
use vtrack_worker::{analyze_image, init_tracing, FramePipeline, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "vtrack", version, about = "Centroid object tracking over detector output")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track objects through a video and export artifacts
    Video(VideoArgs),
    /// Detect and annotate objects in a single image
    Image(ImageArgs),
    /// Write the first frame of a video as an image
    Thumbnail { input: PathBuf, output: PathBuf },
    /// Pick `video` or `image` from the file contents
    Auto {
        input: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct VideoArgs {
    input: PathBuf,
    /// Directory for all run artifacts (default: VTRACK_OUTPUT_DIR or ./output)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Run detection every N frames
    #[arg(long)]
    frame_interval: Option<u64>,
    #[arg(long)]
    max_distance: Option<f64>,
    /// Seconds between detector requests
    #[arg(long)]
    delay: Option<f64>,
    #[arg(long)]
    no_previews: bool,
}

#[derive(Args, Debug)]
struct ImageArgs {
    input: PathBuf,
    /// Annotated image path (default: `<input stem>_annotated.png`)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Video(args) => run_video(args).await,
        Command::Image(args) => run_image(args).await,
        Command::Thumbnail { input, output } => {
            extract_thumbnail(&input, &output)
                .await
                .with_context(|| format!("Failed to extract thumbnail from {}", input.display()))?;
            println!("{}", output.display());
            Ok(())
        }
        Command::Auto { input, output_dir } => {
            let kind = detect_media_file(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            match kind {
                MediaKind::Image => run_image(ImageArgs { input, output: None }).await,
                MediaKind::Video => {
                    run_video(VideoArgs {
                        input,
                        output_dir,
                        frame_interval: None,
                        max_distance: None,
                        delay: None,
                        no_previews: false,
                    })
                    .await
                }
                MediaKind::Unknown => Err(PipelineError::unsupported_input(format!(
                    "cannot determine media type of {}",
                    input.display()
                ))
                .into()),
            }
        }
    }
}

async fn run_video(args: VideoArgs) -> Result<()> {
    let mut config = PipelineConfig::from_env();
    if let Some(interval) = args.frame_interval {
        if interval == 0 {
            bail!("--frame-interval must be at least 1");
        }
        config.frame_interval = interval;
    }
    if let Some(max_distance) = args.max_distance {
        config.max_distance = max_distance;
    }
    if let Some(delay) = args.delay {
        config.delay_between_requests = std::time::Duration::try_from_secs_f64(delay)
            .context("--delay must be a non-negative number of seconds")?;
    }
    if args.no_previews {
        config.previews_enabled = false;
    }
    let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir.clone());

    let detector = DetectorClient::from_env().context("Failed to create detector client")?;
    info!(config = ?config, detector = ?detector.config(), "Starting video run");

    let pipeline = FramePipeline::with_config(detector, config)?;
    let bundle = pipeline
        .process_video(&args.input, &output_dir)
        .await
        .with_context(|| format!("Failed to process {}", args.input.display()))?;

    println!("run:        {}", bundle.run_id);
    println!("video:      {}", bundle.annotated_video.display());
    println!("positions:  {}", bundle.position_log.display());
    println!("chart:      {}", bundle.trajectory_chart.display());
    for preview in [&bundle.previews.loop_preview, &bundle.previews.streaming_preview]
        .into_iter()
        .flatten()
    {
        println!("preview:    {}", preview.display());
    }
    println!("{}", serde_json::to_string_pretty(&bundle.summary)?);
    Ok(())
}

async fn run_image(args: ImageArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let output = args
        .output
        .unwrap_or_else(|| default_image_output(&args.input));

    let detector = DetectorClient::from_env().context("Failed to create detector client")?;
    let renderer = OverlayRenderer::load(
        PipelineConfig::from_env().font_path.as_deref(),
    )?;

    let analysis = analyze_image(&detector, &renderer, &bytes).await?;
    analysis
        .image
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    for label in &analysis.labels {
        println!("{}", label);
    }
    println!("{}", output.display());
    Ok(())
}

fn default_image_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_annotated.png", stem))
}
