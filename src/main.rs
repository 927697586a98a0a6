//! Docmill - document processing pipeline.
//!
//! Extracts text and layout from uploaded documents, scoring each PDF to
//! decide between direct geometric extraction and OCR, with a Redis-backed
//! job queue for asynchronous processing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if docmill::cli::is_verbose() {
        "docmill=info"
    } else {
        "docmill=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    docmill::cli::run().await
}
