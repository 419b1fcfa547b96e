//! # ragsafe CLI Module
//!
//! This module implements the CLI interface for ragsafe.
//!
//! Every command loads the state file, operates on it, and writes it back
//! when something changed.
//!
//! ## Available Commands
//!
//! - `init` - Create an empty state file
//! - `status` - Show store counts and instance totals
//! - `add-process` / `add-resource` - Create nodes
//! - `request` / `cancel-request` - Grow or shrink a request edge
//! - `allocate` / `release` - Grow or shrink an allocation edge
//! - `remove-process` / `remove-resource` - Delete nodes and their edges
//! - `detect` - Run the safety algorithm
//! - `guide` - Print resolution guidance
//! - `export` / `import` - Copy state to or from another file
//! - `hash` - Compute BLAKE3 hash of the canonical state
//! - `server` - Start the HTTP server

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use ragsafe_core::{RagError, primitives::DEFAULT_EDGE_COUNT, primitives::DEFAULT_INSTANCES};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ragsafe - Resource Allocation Graph Deadlock Detector
///
/// Model processes, multi-instance resources, requests and allocations,
/// then ask whether the system can still finish.
#[derive(Parser, Debug)]
#[command(name = "ragsafe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the JSON state file [default: rag-state.json]
    #[arg(short = 'S', long, global = true)]
    pub state: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to [default: config or 127.0.0.1]
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to [default: config or 8080]
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store status
    Status,

    /// Add a process
    AddProcess {
        /// Identifier (defaults to the lowest unused P<n>)
        #[arg(long)]
        id: Option<String>,
    },

    /// Add a resource
    AddResource {
        /// Identifier (defaults to the lowest unused R<n>)
        #[arg(long)]
        id: Option<String>,

        /// Number of identical instances
        #[arg(short = 'n', long, default_value_t = DEFAULT_INSTANCES)]
        instances: u64,
    },

    /// Record that a process wants instances of a resource
    Request {
        process: String,
        resource: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_EDGE_COUNT)]
        count: u64,
    },

    /// Withdraw part or all of an outstanding request
    CancelRequest {
        process: String,
        resource: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_EDGE_COUNT)]
        count: u64,
    },

    /// Grant instances of a resource to a process
    Allocate {
        process: String,
        resource: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_EDGE_COUNT)]
        count: u64,
    },

    /// Release instances held by a process
    Release {
        process: String,
        resource: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_EDGE_COUNT)]
        count: u64,
    },

    /// Remove a process, releasing everything it holds
    RemoveProcess { process: String },

    /// Remove a resource and every edge that references it
    RemoveResource { resource: String },

    /// Run deadlock detection
    Detect,

    /// Print the resolution guide
    Guide,

    /// Export the state to another file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the state with the contents of another file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty state file
    Init {
        /// Force initialization even if the state file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Compute BLAKE3 cryptographic hash of the state
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RagError> {
    let config = Config::load_optional(cli.config.as_deref())?;
    let state_path = config.state_path(cli.state.as_deref());
    let json_mode = cli.json_mode;
    tracing::debug!(state = %state_path.display(), "Resolved state file");

    match cli.command {
        Some(Commands::Server { host, port }) => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            let autosave = config.state.autosave.then_some(state_path.as_path());
            cmd_server(&state_path, &server, autosave).await
        }
        Some(Commands::Status) => cmd_status(&state_path, json_mode),
        Some(Commands::AddProcess { id }) => cmd_add_process(&state_path, json_mode, id.as_deref()),
        Some(Commands::AddResource { id, instances }) => {
            cmd_add_resource(&state_path, json_mode, id.as_deref(), instances)
        }
        Some(Commands::Request {
            process,
            resource,
            count,
        }) => cmd_request(&state_path, json_mode, &process, &resource, count),
        Some(Commands::CancelRequest {
            process,
            resource,
            count,
        }) => cmd_cancel_request(&state_path, json_mode, &process, &resource, count),
        Some(Commands::Allocate {
            process,
            resource,
            count,
        }) => cmd_allocate(&state_path, json_mode, &process, &resource, count),
        Some(Commands::Release {
            process,
            resource,
            count,
        }) => cmd_release(&state_path, json_mode, &process, &resource, count),
        Some(Commands::RemoveProcess { process }) => {
            cmd_remove_process(&state_path, json_mode, &process)
        }
        Some(Commands::RemoveResource { resource }) => {
            cmd_remove_resource(&state_path, json_mode, &resource)
        }
        Some(Commands::Detect) => cmd_detect(&state_path, json_mode),
        Some(Commands::Guide) => cmd_guide(&state_path, json_mode),
        Some(Commands::Export { output }) => cmd_export(&state_path, &output),
        Some(Commands::Import { input }) => cmd_import(&state_path, json_mode, &input),
        Some(Commands::Init { force }) => cmd_init(&state_path, force),
        Some(Commands::Hash) => cmd_hash(&state_path, json_mode),
        None => {
            // No subcommand - show status by default
            cmd_status(&state_path, json_mode)
        }
    }
}
