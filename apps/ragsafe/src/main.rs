//! # ragsafe - Resource Allocation Graph Deadlock Detector
//!
//! The main binary for the ragsafe detector.
//!
//! This application provides:
//! - CLI interface operating on a JSON state file
//! - HTTP REST API server (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │              apps/ragsafe (THE BINARY)            │
//! │                                                   │
//! │     ┌─────────────┐          ┌─────────────┐      │
//! │     │    CLI      │          │  HTTP API   │      │
//! │     │   (clap)    │          │   (axum)    │      │
//! │     └──────┬──────┘          └──────┬──────┘      │
//! │            └────────────┬───────────┘             │
//! │                         ▼                         │
//! │                 ┌───────────────┐                 │
//! │                 │ ragsafe-core  │                 │
//! │                 │  (THE LOGIC)  │                 │
//! │                 └───────────────┘                 │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Build a state file step by step
//! ragsafe add-process
//! ragsafe add-resource --instances 2
//! ragsafe allocate P1 R1
//! ragsafe detect
//!
//! # Start the HTTP server
//! ragsafe server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use ragsafe::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // RAGSAFE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("RAGSAFE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "ragsafe=debug,ragsafe_core=debug,tower_http=debug"
    } else {
        "ragsafe=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

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

    // Keep stdout clean for JSON consumers
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the ragsafe startup banner.
fn print_banner() {
    println!(
        r#"
  ragsafe v{}
  Resource Allocation Graph Deadlock Detector
"#,
        env!("CARGO_PKG_VERSION")
    );
}
