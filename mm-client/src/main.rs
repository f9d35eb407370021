//! MatchMaster client (mm-client) - Main entry point
//!
//! Command-line front end: submits mastering jobs, follows them to a
//! terminal status and downloads the produced renditions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mm_client::download::download_outputs;
use mm_client::{
    ClientConfig, ConfigOverrides, Error, HttpBackend, JobOrchestrator, LocalAudioFile, MasteringBackend,
    MasteringIntent,
};
use mm_common::api::{Genre, MasteringMode};
use mm_common::config::{CompiledDefaults, ConfigSource, TomlConfig};
use mm_common::events::{EventBus, FailureKind, JobPhase, MmEvent};
use mm_common::OutputFileKind;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mm-client
#[derive(Parser, Debug)]
#[command(name = "mm-client")]
#[command(about = "Client for the MatchMaster mastering service")]
#[command(version)]
struct Args {
    /// Mastering service base URL
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Delay between job status polls
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Directory for downloaded files
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Alternative TOML config file
    #[arg(short, long, global = true, env = "MM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a track, master it and wait for the result
    Master {
        /// Track to master
        target: PathBuf,

        /// Reference track to match
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Reference track URL fetched by the service
        #[arg(long)]
        reference_url: Option<String>,

        /// Genre for standalone mastering
        #[arg(long, default_value = "pop")]
        genre: Genre,

        /// reference or standalone (default: reference when a reference is given)
        #[arg(long)]
        mode: Option<MasteringMode>,

        /// Download every produced file once the job completes
        #[arg(long)]
        download: bool,
    },

    /// Show the status of a job
    Status { job_id: String },

    /// Download produced files of a completed job
    Download {
        job_id: String,

        #[arg(required = true)]
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read the config file first: it may set the log level
    let config_source = ConfigSource::locate(args.config.as_deref());
    let toml = TomlConfig::load_from(&config_source);
    let log_level = toml
        .as_ref()
        .map(TomlConfig::log_level)
        .unwrap_or_else(|_| CompiledDefaults::default().log_level);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mm_client={level},mm_common={level}", level = log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    config_source.log();

    let toml = toml.context("Failed to load configuration")?;
    let overrides = ConfigOverrides {
        server_url: args.server_url.clone(),
        poll_interval_ms: args.poll_interval_ms,
        output_dir: args.output_dir.clone(),
    };
    let config = ClientConfig::resolve(&overrides, &toml).context("Invalid configuration")?;

    info!("Using mastering service at {}", config.server_url);

    let backend = Arc::new(
        HttpBackend::new(config.server_url.clone(), config.request_timeout)
            .context("Failed to initialize HTTP client")?,
    );

    match args.command {
        Command::Master {
            target,
            reference,
            reference_url,
            genre,
            mode,
            download,
        } => {
            let mode = mode.unwrap_or(if reference.is_some() || reference_url.is_some() {
                MasteringMode::Reference
            } else {
                MasteringMode::Standalone
            });

            let target = LocalAudioFile::open(&target)
                .await
                .context("Cannot use target file")?;
            let reference_file = match reference {
                Some(path) => Some(
                    LocalAudioFile::open(&path)
                        .await
                        .context("Cannot use reference file")?,
                ),
                None => None,
            };

            let intent = MasteringIntent {
                target: Some(target),
                reference_file,
                reference_url,
                mode,
                genre,
            };

            run_master(backend, &config, intent, download).await
        }
        Command::Status { job_id } => {
            let status = backend
                .job_status(&job_id)
                .await
                .context("Error checking job status")?;

            println!("Job {}: {} ({}%)", job_id, status.status, status.clamped_progress());
            if !status.message.is_empty() {
                println!("  {}", status.message);
            }
            for file in status.output_files.unwrap_or_default() {
                println!("  {:<14} {}", OutputFileKind::classify(&file).label(), file);
            }
            Ok(())
        }
        Command::Download { job_id, files } => {
            let saved = download_outputs(&backend, &job_id, &files, &config.output_dir)
                .await
                .context("Download failed")?;
            for file in saved {
                println!("{:<14} {}", file.label(), file.path.display());
            }
            Ok(())
        }
    }
}

async fn run_master(
    backend: Arc<HttpBackend>,
    config: &ClientConfig,
    intent: MasteringIntent,
    download: bool,
) -> Result<()> {
    let orchestrator = JobOrchestrator::new(backend.clone(), EventBus::default(), config.poll);
    let reporter = tokio::spawn(report_progress(orchestrator.subscribe()));

    let run = async {
        orchestrator.start(intent).await?;
        orchestrator.wait_for_terminal().await
    };

    let outcome = tokio::select! {
        result = run => result,
        _ = shutdown_signal() => {
            orchestrator.cancel();
            reporter.abort();
            info!("Mastering job cancelled");
            return Ok(());
        }
    };
    reporter.abort();

    let snapshot = outcome.context("Error starting mastering job")?;
    let job_id = snapshot.job_id.clone().unwrap_or_default();

    match (snapshot.phase, snapshot.failure) {
        (JobPhase::Completed, _) => {}
        (_, Some(FailureKind::Backend)) => {
            return Err(Error::BackendJobFailure(snapshot.message).into());
        }
        _ => bail!("{}", snapshot.message),
    }

    println!("Mastering completed (job {})", job_id);
    for file in &snapshot.output_files {
        println!("  {:<14} {}", OutputFileKind::classify(file).label(), file);
    }

    if download {
        let saved = download_outputs(&backend, &job_id, &snapshot.output_files, &config.output_dir)
            .await
            .context("Download failed")?;
        for file in saved {
            println!("Saved {}", file.path.display());
        }
    }

    Ok(())
}

/// Log every job snapshot until the bus closes
async fn report_progress(mut rx: tokio::sync::broadcast::Receiver<MmEvent>) {
    loop {
        match rx.recv().await {
            Ok(MmEvent::JobStateChanged { snapshot, .. }) => {
                info!(
                    phase = %snapshot.phase,
                    status = %snapshot.status,
                    progress = snapshot.progress,
                    "{}",
                    snapshot.message
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress reporter lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling");
        },
    }
}
