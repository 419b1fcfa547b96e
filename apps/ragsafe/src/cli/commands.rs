//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::ServerConfig;
use ragsafe_core::{
    DetectionResult, GraphMetrics, ProcessId, RagError, ResourceId, Session, state_crypto_hash,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum state file size (64 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_STATE_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RagError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RagError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RagError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it names
/// an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, RagError> {
    let canonical = path.canonicalize().map_err(|e| {
        RagError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RagError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, RagError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RagError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RagError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RagError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    state_path: &Path,
    server: &ServerConfig,
    autosave: Option<&Path>,
) -> Result<(), RagError> {
    let session = load_or_create_session(state_path)?;

    println!("ragsafe server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", server.host);
    println!("  Port:     {}", server.port);
    println!("  State:    {:?}", state_path);
    println!("  Autosave: {}", autosave.is_some());
    println!();
    println!("Endpoints:");
    println!("  GET    /status              - Store counts");
    println!("  POST   /processes           - Add a process");
    println!("  POST   /resources           - Add a resource");
    println!("  POST   /requests            - Add a request");
    println!("  POST   /allocations         - Allocate instances");
    println!("  POST   /allocations/release - Release instances");
    println!("  GET    /detect              - Run detection");
    println!("  GET    /guide               - Resolution guide");
    println!("  GET    /state, PUT /state   - Export / import");
    println!("  POST   /undo, POST /redo    - History");
    println!("  GET    /health              - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", server.host, server.port);
    api::run_server(&addr, session, server, autosave.map(Path::to_path_buf)).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(state_path: &Path, json_mode: bool) -> Result<(), RagError> {
    let session = load_or_create_session(state_path)?;
    let metrics = session.metrics();

    if json_mode {
        print_json(&serde_json::json!({
            "state": state_path.to_string_lossy(),
            "processes": metrics.process_count,
            "resources": metrics.resource_count,
            "request_edges": metrics.request_edge_count,
            "allocation_edges": metrics.allocation_edge_count,
            "total_instances": metrics.total_instances,
            "available_instances": metrics.available_instances,
            "held_instances": metrics.held_instances,
            "utilization_percent": metrics.utilization_percent,
            "checksum": session.checksum()
        }));
        return Ok(());
    }

    print_status(state_path, &metrics, session.checksum());
    Ok(())
}

fn print_status(state_path: &Path, metrics: &GraphMetrics, checksum: u64) {
    println!("ragsafe Status");
    println!("==============");
    println!("State: {:?}", state_path);
    println!();
    println!("Processes:        {}", metrics.process_count);
    println!("Resources:        {}", metrics.resource_count);
    println!("Request Edges:    {}", metrics.request_edge_count);
    println!("Allocation Edges: {}", metrics.allocation_edge_count);
    println!(
        "Instances:        {} held / {} total ({}%)",
        metrics.held_instances, metrics.total_instances, metrics.utilization_percent
    );
    println!("Checksum:         {}", checksum);
}

// =============================================================================
// NODE COMMANDS
// =============================================================================

/// Add a process.
pub fn cmd_add_process(state_path: &Path, json_mode: bool, id: Option<&str>) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let id = session.add_process(id)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "process_added", process = %id, "Process added");

    if json_mode {
        print_json(&serde_json::json!({ "process": id }));
    } else {
        println!("Added process {}", id);
    }
    Ok(())
}

/// Add a resource.
pub fn cmd_add_resource(
    state_path: &Path,
    json_mode: bool,
    id: Option<&str>,
    instances: u64,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let id = session.add_resource(id, instances)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "resource_added", resource = %id, instances, "Resource added");

    if json_mode {
        print_json(&serde_json::json!({ "resource": id, "instances": instances }));
    } else {
        println!("Added resource {} with {} instance(s)", id, instances);
    }
    Ok(())
}

/// Remove a process.
pub fn cmd_remove_process(state_path: &Path, json_mode: bool, process: &str) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let process = ProcessId::new(process);
    session.remove_process(&process)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "process_removed", process = %process, "Process removed");

    if json_mode {
        print_json(&serde_json::json!({ "removed": process }));
    } else {
        println!("Removed process {}", process);
    }
    Ok(())
}

/// Remove a resource.
pub fn cmd_remove_resource(
    state_path: &Path,
    json_mode: bool,
    resource: &str,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let resource = ResourceId::new(resource);
    session.remove_resource(&resource)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "resource_removed", resource = %resource, "Resource removed");

    if json_mode {
        print_json(&serde_json::json!({ "removed": resource }));
    } else {
        println!("Removed resource {}", resource);
    }
    Ok(())
}

// =============================================================================
// EDGE COMMANDS
// =============================================================================

/// Add to a request edge.
pub fn cmd_request(
    state_path: &Path,
    json_mode: bool,
    process: &str,
    resource: &str,
    count: u64,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let (process, resource) = (ProcessId::new(process), ResourceId::new(resource));
    session.add_request(&process, &resource, count)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "request_added", process = %process, resource = %resource, count, "Request recorded");

    let outstanding = session.graph().request(&process, &resource);
    if json_mode {
        print_json(&serde_json::json!({
            "process": process,
            "resource": resource,
            "outstanding": outstanding
        }));
    } else {
        println!(
            "{} now requests {} instance(s) of {}",
            process, outstanding, resource
        );
    }
    Ok(())
}

/// Withdraw part of a request edge.
pub fn cmd_cancel_request(
    state_path: &Path,
    json_mode: bool,
    process: &str,
    resource: &str,
    count: u64,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let (process, resource) = (ProcessId::new(process), ResourceId::new(resource));
    let removed = session.remove_request(&process, &resource, count);
    if removed > 0 {
        save_session(&session, state_path)?;
    }
    tracing::info!(event = "request_cancelled", process = %process, resource = %resource, removed, "Request withdrawn");

    if json_mode {
        print_json(&serde_json::json!({
            "process": process,
            "resource": resource,
            "removed": removed
        }));
    } else {
        println!(
            "Withdrew {} requested instance(s) of {} from {}",
            removed, resource, process
        );
    }
    Ok(())
}

/// Allocate instances.
pub fn cmd_allocate(
    state_path: &Path,
    json_mode: bool,
    process: &str,
    resource: &str,
    count: u64,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let (process, resource) = (ProcessId::new(process), ResourceId::new(resource));
    session.add_allocation(&process, &resource, count)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "allocation_granted", process = %process, resource = %resource, count, "Allocation granted");

    let available = session
        .graph()
        .resource(&resource)
        .map(|r| r.available)
        .unwrap_or(0);
    if json_mode {
        print_json(&serde_json::json!({
            "process": process,
            "resource": resource,
            "allocated": count,
            "available": available
        }));
    } else {
        println!(
            "Allocated {} instance(s) of {} to {} ({} still available)",
            count, resource, process, available
        );
    }
    Ok(())
}

/// Release instances.
pub fn cmd_release(
    state_path: &Path,
    json_mode: bool,
    process: &str,
    resource: &str,
    count: u64,
) -> Result<(), RagError> {
    let mut session = load_or_create_session(state_path)?;
    let (process, resource) = (ProcessId::new(process), ResourceId::new(resource));
    let released = session.remove_allocation(&process, &resource, count);
    if released > 0 {
        save_session(&session, state_path)?;
    }
    tracing::info!(event = "allocation_released", process = %process, resource = %resource, released, "Allocation released");

    if json_mode {
        print_json(&serde_json::json!({
            "process": process,
            "resource": resource,
            "released": released
        }));
    } else {
        println!(
            "Released {} instance(s) of {} from {}",
            released, resource, process
        );
    }
    Ok(())
}

// =============================================================================
// DETECTION COMMANDS
// =============================================================================

/// Run deadlock detection.
pub fn cmd_detect(state_path: &Path, json_mode: bool) -> Result<(), RagError> {
    let session = load_or_create_session(state_path)?;
    let result = session.detect();
    tracing::info!(
        event = "detection_run",
        deadlocked = result.deadlocked.len(),
        passes = result.passes,
        "Detection complete"
    );

    if json_mode {
        let value = serde_json::to_value(&result)
            .map_err(|e| RagError::SerializationError(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    print_detection(&result);
    Ok(())
}

fn print_detection(result: &DetectionResult) {
    if result.is_safe() {
        println!("No deadlock detected. The system is in a safe state.");
        let order: Vec<&str> = result.safe_sequence.iter().map(|p| p.as_str()).collect();
        if !order.is_empty() {
            println!("One completion order: {}", order.join(" -> "));
        }
        return;
    }

    println!("Deadlock detected!");
    for process in result.deadlocked_processes() {
        let blocked: Vec<&str> = result
            .implicated_resources(process)
            .map(|r| r.as_str())
            .collect();
        println!("  {} blocked on: {}", process, blocked.join(", "));
    }
}

/// Print the resolution guide.
pub fn cmd_guide(state_path: &Path, json_mode: bool) -> Result<(), RagError> {
    let session = load_or_create_session(state_path)?;
    let (_, guide) = session.analyze();

    if json_mode {
        let value = serde_json::to_value(&guide)
            .map_err(|e| RagError::SerializationError(e.to_string()))?;
        print_json(&value);
    } else {
        print!("{}", guide);
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export the state to another file.
pub fn cmd_export(state_path: &Path, output: &Path) -> Result<(), RagError> {
    let validated_output = validate_output_path(output)?;
    let session = load_or_create_session(state_path)?;

    let data = session.export_json()?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| RagError::IoError(format!("Write file: {}", e)))?;

    println!("Checksum: {}", session.checksum());
    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Replace the state with another file's contents.
///
/// The input is fully validated before the state file is touched.
pub fn cmd_import(state_path: &Path, json_mode: bool, input: &Path) -> Result<(), RagError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_STATE_FILE_SIZE)?;

    let data = std::fs::read_to_string(&validated_path)
        .map_err(|e| RagError::IoError(format!("Read file: {}", e)))?;

    let session = Session::from_json(&data)?;
    save_session(&session, state_path)?;
    tracing::info!(event = "state_imported", source = %validated_path.display(), "State imported");

    let metrics = session.metrics();
    if json_mode {
        print_json(&serde_json::json!({
            "processes": metrics.process_count,
            "resources": metrics.resource_count,
            "checksum": session.checksum()
        }));
    } else {
        println!(
            "Imported state: {} processes, {} resources",
            metrics.process_count, metrics.resource_count
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new state file.
pub fn cmd_init(state_path: &Path, force: bool) -> Result<(), RagError> {
    if state_path.exists() && !force {
        return Err(RagError::IoError(
            "State file already exists. Use --force to overwrite.".to_string(),
        ));
    }

    save_session(&Session::new(), state_path)?;
    println!("Initialized new state file at {:?}", state_path);
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Compute BLAKE3 hash of the canonical state.
pub fn cmd_hash(state_path: &Path, json_mode: bool) -> Result<(), RagError> {
    let session = load_or_create_session(state_path)?;
    let hash = state_crypto_hash(session.graph())?;

    if json_mode {
        print_json(&serde_json::json!({
            "hash": hash,
            "algorithm": "blake3",
            "checksum": session.checksum()
        }));
    } else {
        println!("BLAKE3: {}", hash);
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load a session from a state file, or start empty if it does not exist.
pub fn load_or_create_session(state_path: &Path) -> Result<Session, RagError> {
    if !state_path.exists() {
        return Ok(Session::new());
    }

    validate_file_size(state_path, MAX_STATE_FILE_SIZE)?;
    let data = std::fs::read_to_string(state_path)
        .map_err(|e| RagError::IoError(format!("Read state: {}", e)))?;
    Session::from_json(&data)
}

/// Save a session to a state file.
pub fn save_session(session: &Session, state_path: &Path) -> Result<(), RagError> {
    let data = session.export_json()?;
    std::fs::write(state_path, data).map_err(|e| RagError::IoError(format!("Write state: {}", e)))
}
