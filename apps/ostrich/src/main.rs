//! # OSTRICH - Versioned Triple Archives
//!
//! Command-line front end for `ostrich-core` archives.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/ostrich (THE BINARY)          │
//! │                                               │
//! │   ┌──────────────┐      ┌────────────────┐    │
//! │   │  CLI (clap)  │─────▶│ blocking pool  │    │
//! │   └──────────────┘      │ + Ctrl-C watch │    │
//! │                         └───────┬────────┘    │
//! │                                 ▼             │
//! │                        ┌────────────────┐     │
//! │                        │  ostrich-core  │     │
//! │                        │  (THE ENGINE)  │     │
//! │                        └────────────────┘     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ostrich ingest archive.ostrich ./versions
//! ostrich vm archive.ostrich '?s <http://ex.org/p> ?o' -v 10 -o 5 -l 10
//! ostrich dm archive.ostrich '?s ?p ?o' -s 0 -e 3
//! ostrich v archive.ostrich '<http://ex.org/s> ?p ?o'
//! ostrich metadata archive.ostrich --json
//! ```

use clap::Parser;
use ostrich::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // OSTRICH_LOG_FORMAT=json enables machine-parseable logs on stderr.
    let log_format = std::env::var("OSTRICH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ostrich=info,ostrich_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = cli::execute(cli, &mut stdout).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
