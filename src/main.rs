//! sumika - real-estate listing consolidation and entity resolution system.
//!
//! A tool for consolidating scraped real-estate listings into canonical
//! building and unit records, with reversible duplicate merges.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "sumika=info"
    } else {
        "sumika=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
