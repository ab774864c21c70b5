use anyhow::Context;
use clap::{Parser, Subcommand};
use echoscript::audio::convert::ffmpeg_available;
use echoscript::cache::ModelCache;
use echoscript::config::Config;
use echoscript::engines::align::NullAlignerProvider;
use echoscript::engines::diarize::NullDiarizerLoader;
use echoscript::engines::whisper::{WhisperLoader, model_file};
use echoscript::job::JobHandler;
use echoscript::pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "echoscript", version, about = "Audio transcription worker")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single job from a JSON file and print the result
    Run {
        /// Path to the job payload ({"input": {...}})
        #[arg(long)]
        job: PathBuf,
    },
    /// Read newline-delimited job payloads from stdin, one result per line
    Serve,
    /// Report dependency and configuration status
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("echoscript=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_env_overrides()
        .context("invalid environment override")?;

    match cli.command {
        Some(Commands::Check) => {
            run_check(&config);
            return Ok(());
        }
        Some(Commands::Run { job }) => {
            let handler = build_handler(&config);
            preload(&handler);
            let payload: serde_json::Value = serde_json::from_str(
                &tokio::fs::read_to_string(&job)
                    .await
                    .with_context(|| format!("failed to read job file {}", job.display()))?,
            )
            .context("job file is not valid JSON")?;
            let result = handler.handle(&payload).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Some(Commands::Serve) | None => {
            let handler = build_handler(&config);
            preload(&handler);
            serve(handler).await?;
        }
    }

    Ok(())
}

fn build_handler(config: &Config) -> JobHandler {
    let cache = Arc::new(ModelCache::new());
    let pipeline = Pipeline::new(
        cache,
        Box::new(WhisperLoader::new(&config.model.name)),
        Box::new(NullDiarizerLoader::new(
            config.model.diarization_token.clone(),
        )),
        Box::new(NullAlignerProvider),
        config.model.device,
        config.model.compute_type,
    );
    JobHandler::new(Arc::new(pipeline), config.audio.clone())
}

/// Warm the model cache on cold start. A failure here is logged, not
/// fatal: the mandatory load is retried per job and surfaces there.
fn preload(handler: &JobHandler) {
    info!("pre-loading models");
    if let Err(e) = handler.pipeline().preload() {
        warn!(error = %e, "model pre-load failed, will retry per job");
    }
}

/// Sequential job loop: one JSON payload per input line, one JSON result
/// per output line. Jobs never overlap.
async fn serve(handler: JobHandler) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!("worker ready, waiting for jobs on stdin");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(payload) => handler.handle(&payload).await,
            Err(e) => {
                error!(error = %e, "malformed job payload");
                serde_json::json!({ "error": format!("Invalid job payload: {e}") })
            }
        };
        let mut encoded = serde_json::to_string(&result)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}

fn run_check(config: &Config) {
    println!("echoscript {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  whisper feature:    {}",
        if cfg!(feature = "whisper") {
            "enabled"
        } else {
            "disabled (speech-to-text unavailable)"
        }
    );
    let model_path = model_file(&config.model.name);
    println!(
        "  model file:         {} ({})",
        model_path.display(),
        if model_path.exists() {
            "present"
        } else {
            "missing"
        }
    );
    println!(
        "  ffmpeg:             {}",
        if ffmpeg_available() {
            "found"
        } else {
            "NOT FOUND (audio conversion will fail)"
        }
    );
    println!(
        "  diarization token:  {}",
        if config.model.diarization_token.is_some() {
            "set"
        } else {
            "not set (jobs run without speaker labels)"
        }
    );
    println!("  device:             {}", config.model.device);
    println!("  compute type:       {}", config.model.compute_type);
}
