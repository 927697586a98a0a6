//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

use crate::config::PipelineConfig;
use crate::models::{DocumentStatus, JobSource, ProcessingOptions};
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::{PdfOpener, ProcessingOrchestrator};
use crate::queue::{
    CircuitBreaker, JobDispatcher, JobQueue, QueueDispatcher, RedisQueue, Worker,
};
use crate::repository::{DocumentStore, InMemoryDocumentStore};
use crate::storage::LocalStorage;
use crate::utils::cmd::binary_available;

#[derive(Parser)]
#[command(name = "docmill")]
#[command(about = "Document processing pipeline with selective OCR")]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Process a document and print the result
    Process {
        /// File to process
        file: PathBuf,
        /// OCR language (default from configuration)
        #[arg(short, long)]
        language: Option<String>,
        /// Skip OCR entirely, even for scanned pages
        #[arg(long)]
        no_ocr: bool,
        /// Enqueue for a worker instead of processing inline
        #[arg(short, long)]
        queue: bool,
        /// Project to file the document under
        #[arg(short, long, default_value = "default")]
        project: String,
    },

    /// Consume jobs from the queue until interrupted
    Worker,

    /// Show queue status and, optionally, a job result
    Status {
        /// Job ID to look up
        job_id: Option<String>,
    },

    /// Check that required external tools are installed
    Tools,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            file,
            language,
            no_ocr,
            queue,
            project,
        } => cmd_process(&config, &file, language, no_ocr, queue, &project).await,
        Commands::Worker => cmd_worker(&config).await,
        Commands::Status { job_id } => cmd_status(&config, job_id.as_deref()).await,
        Commands::Tools => cmd_tools().await,
    }
}

fn build_orchestrator(
    config: &PipelineConfig,
    publisher: Option<Arc<dyn JobQueue>>,
) -> (Arc<ProcessingOrchestrator>, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let mut orchestrator = ProcessingOrchestrator::new(
        config.clone(),
        Arc::new(LocalStorage::new(config.storage.root.clone())),
        Arc::clone(&store),
        Arc::new(TesseractEngine::new()),
        Arc::new(PdfOpener),
    );
    if let Some(queue) = publisher {
        orchestrator = orchestrator.with_publisher(queue);
    }
    (Arc::new(orchestrator), store)
}

async fn cmd_process(
    config: &PipelineConfig,
    file: &PathBuf,
    language: Option<String>,
    no_ocr: bool,
    queue: bool,
    project: &str,
) -> anyhow::Result<()> {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("{} Cannot read {}: {}", style("✗").red(), file.display(), e);
            return Ok(());
        }
    };
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let (orchestrator, _store) = build_orchestrator(config, None);
    let document = match orchestrator.ingest(&filename, &bytes, project).await {
        Ok(document) => document,
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            return Ok(());
        }
    };
    let options = ProcessingOptions {
        language,
        ocr_enabled: if no_ocr { Some(false) } else { None },
        ..Default::default()
    };
    let job = orchestrator.create_job(&document, "cli", options, JobSource::Cli);

    if queue {
        let redis = match RedisQueue::connect(&config.queue).await {
            Ok(q) => Arc::new(q),
            Err(e) => {
                println!("{} Queue unreachable: {}", style("✗").red(), e);
                return Ok(());
            }
        };
        let dispatcher = QueueDispatcher::new(
            redis,
            Arc::new(CircuitBreaker::new(config.breaker.clone())),
            Arc::clone(&orchestrator),
        );
        let job_id = job.job_id.clone();
        match dispatcher.dispatch(job).await {
            Ok(receipt) if receipt.enqueued => {
                println!("{} Queued {}", style("✓").green(), filename);
                println!("{:<20} {}", "Job ID:", receipt.job_id);
                println!("{:<20} {}", "Queue:", config.queue.name);
                println!(
                    "{}",
                    style(format!("Check with: docmill status {}", receipt.job_id)).dim()
                );
                return Ok(());
            }
            Ok(_) => {
                // Queue down; the job is running in this process instead.
                println!(
                    "{} Queue unavailable, processing inline (job {})",
                    style("!").yellow(),
                    job_id
                );
                let pb = spinner("Processing...");
                let progress = wait_for_completion(&orchestrator, &document.id, &pb).await?;
                pb.finish_and_clear();
                if progress.status == DocumentStatus::Failed {
                    println!(
                        "{} Processing failed: {}",
                        style("✗").red(),
                        progress.error.unwrap_or_else(|| "unknown error".into())
                    );
                } else {
                    println!("{} Processed {}", style("✓").green(), filename);
                    println!("{:<20} {}", "Document ID:", document.id);
                }
                return Ok(());
            }
            Err(e) => {
                println!("{} {}", style("✗").red(), e);
                return Ok(());
            }
        }
    }

    let pb = spinner(&format!("Processing {}...", filename));
    let outcome = orchestrator.process_document(&job).await;
    pb.finish_and_clear();

    match outcome {
        Ok(outcome) => {
            println!("{} Processed {}", style("✓").green(), filename);
            println!("{:<20} {}", "Document ID:", outcome.document_id);
            println!("{:<20} {}", "Pages:", outcome.pages);
            println!("{:<20} {:.2}", "Confidence:", outcome.confidence);
            println!(
                "{:<20} {:.1}s",
                "Duration:",
                outcome.duration_ms as f64 / 1000.0
            );
        }
        Err(e) => {
            println!("{} Processing failed: {}", style("✗").red(), e);
        }
    }
    Ok(())
}

async fn cmd_worker(config: &PipelineConfig) -> anyhow::Result<()> {
    let redis = Arc::new(RedisQueue::connect(&config.queue).await?);
    let (orchestrator, store) = build_orchestrator(
        config,
        Some(Arc::clone(&redis) as Arc<dyn JobQueue>),
    );

    let worker = Arc::new(Worker::new(
        Arc::clone(&redis) as Arc<dyn JobQueue>,
        Arc::clone(&orchestrator),
        store,
        config.worker.clone(),
        Duration::from_secs(config.queue.pop_timeout_secs),
    ));

    println!(
        "{} Worker {} consuming '{}'",
        style("✓").green(),
        worker.identity(),
        config.queue.name
    );
    println!("{}", style("Press Ctrl-C to stop.").dim());

    let (tx, rx) = watch::channel(false);
    let runner = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::signal::ctrl_c().await?;
    println!("\n{} Shutting down...", style("!").yellow());
    let _ = tx.send(true);

    let grace = Duration::from_secs(config.worker.shutdown_grace_secs);
    match tokio::time::timeout(grace, runner).await {
        Ok(_) => println!("{} Worker stopped", style("✓").green()),
        Err(_) => println!(
            "{} Shutdown grace elapsed with a job still in flight",
            style("✗").red()
        ),
    }
    Ok(())
}

async fn cmd_status(config: &PipelineConfig, job_id: Option<&str>) -> anyhow::Result<()> {
    let redis = match RedisQueue::connect(&config.queue).await {
        Ok(q) => q,
        Err(e) => {
            println!("{} Queue unreachable: {}", style("✗").red(), e);
            return Ok(());
        }
    };

    println!("\n{}", style("Queue Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Queue:", config.queue.name);
    println!("{:<20} {}", "Depth:", redis.depth().await?);

    if let Some(job_id) = job_id {
        println!();
        match redis.fetch_result(job_id).await? {
            Some(result) if result.success => {
                println!("{} Job {} completed", style("✓").green(), job_id);
                if let Some(pages) = result.pages {
                    println!("{:<20} {}", "Pages:", pages);
                }
                if let Some(confidence) = result.confidence {
                    println!("{:<20} {:.2}", "Confidence:", confidence);
                }
                println!(
                    "{:<20} {}",
                    "Completed:",
                    result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Some(result) => {
                println!("{} Job {} failed", style("✗").red(), job_id);
                if let Some(error) = result.error {
                    println!("{:<20} {}", "Error:", error);
                }
            }
            None => {
                println!(
                    "{} No result for job {} (pending, running, or expired)",
                    style("!").yellow(),
                    job_id
                );
            }
        }
    }
    Ok(())
}

/// Check the external binaries the pipeline shells out to.
async fn cmd_tools() -> anyhow::Result<()> {
    println!("\n{}", style("External Tool Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("PDF Tools:").cyan());
    let mut poppler_missing = false;
    for tool in ["pdftotext", "pdftoppm", "pdfinfo"] {
        let status = if binary_available(tool) {
            style("✓ found").green()
        } else {
            poppler_missing = true;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }
    if poppler_missing {
        println!("                  {}", style("install poppler-utils").dim());
    }

    println!("\n{}", style("OCR:").cyan());
    let tesseract = TesseractEngine::new();
    let status = if tesseract.is_available() {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", "tesseract", status);
    if !tesseract.is_available() {
        println!(
            "                  {}",
            style(tesseract.availability_hint()).dim()
        );
    }
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

async fn wait_for_completion(
    orchestrator: &Arc<ProcessingOrchestrator>,
    document_id: &str,
    pb: &ProgressBar,
) -> anyhow::Result<crate::models::ProcessingProgress> {
    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Some(progress) = orchestrator.get_processing_progress(document_id).await? {
            pb.set_message(format!("{} {}%", progress.current_step, progress.progress));
            if matches!(
                progress.status,
                DocumentStatus::Processed | DocumentStatus::Failed
            ) {
                return Ok(progress);
            }
        }
    }
}
