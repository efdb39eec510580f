// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Error types for compilation and execution
//!
//! Compile-time faults abort a run before any task is dispatched; per-task
//! faults are isolated to their (node, partition).

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for dagrun operations
pub type DagrunResult<T> = Result<T, DagrunError>;

/// Main error type for dagrun
#[derive(Error, Debug, Diagnostic)]
pub enum DagrunError {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Errors (compile time)
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Component '{component}' references unknown activity '{activity}'")]
    #[diagnostic(
        code(dagrun::unknown_activity_ref),
        help("Declare '{activity}' under the top-level 'activities' section")
    )]
    UnknownActivityRef { component: String, activity: String },

    #[error("Component '{component}' selects unknown run configuration '{run_config}'")]
    #[diagnostic(
        code(dagrun::unknown_run_config),
        help("The activity's 'runconfigs' section does not define '{run_config}'")
    )]
    UnknownRunConfig { component: String, run_config: String },

    #[error("Run configuration '{run_config}' binds unknown resource '{resource}'")]
    #[diagnostic(code(dagrun::unknown_resource))]
    UnknownResource { run_config: String, resource: String },

    #[error("Pipeline '{pipeline}' references unknown schedule '{schedule}'")]
    #[diagnostic(code(dagrun::unknown_schedule))]
    UnknownScheduleRef { pipeline: String, schedule: String },

    #[error("Input '{input}' of component '{component}' has unresolved source '{src}'")]
    #[diagnostic(
        code(dagrun::unresolved_source),
        help("'{src}' must name an output id published by some component in the pipeline")
    )]
    UnresolvedSource {
        component: String,
        input: String,
        src: String,
    },

    #[error("Duplicate component id '{component}' in pipeline")]
    #[diagnostic(
        code(dagrun::duplicate_component),
        help("Give one of the nodes an explicit 'id' distinct from the activity id")
    )]
    DuplicateComponent { component: String },

    #[error("Output id '{output}' is published by both '{first}' and '{second}'")]
    #[diagnostic(code(dagrun::ambiguous_output))]
    AmbiguousOutput {
        output: String,
        first: String,
        second: String,
    },

    #[error("Duplicate port id '{port}' on activity '{activity}'")]
    #[diagnostic(code(dagrun::duplicate_port))]
    DuplicatePort { activity: String, port: String },

    #[error("Component '{component}' wires '{port}', which is not a port of its activity")]
    #[diagnostic(code(dagrun::unknown_port))]
    UnknownPort { component: String, port: String },

    #[error(
        "Port type mismatch on edge '{producer}' -> '{consumer}': \
         output '{output}' is {found}, input '{input}' expects {expected}"
    )]
    #[diagnostic(code(dagrun::port_type_mismatch))]
    PortTypeMismatch {
        producer: String,
        consumer: String,
        output: String,
        input: String,
        expected: String,
        found: String,
    },

    #[error(
        "Schema mismatch on edge '{producer}' -> '{consumer}': \
         column '{column}' is {found} upstream, {expected} downstream"
    )]
    #[diagnostic(
        code(dagrun::schema_mismatch),
        help("The producer's schema must carry every column the consumer declares, with matching types")
    )]
    SchemaMismatch {
        producer: String,
        consumer: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("Run configuration '{run_config}' declares zero partitions")]
    #[diagnostic(code(dagrun::invalid_partitions))]
    InvalidPartitions { run_config: String },

    #[error("Circular dependency: {}", nodes.join(" -> "))]
    #[diagnostic(
        code(dagrun::circular_dependency),
        help("Review the components' input sources to remove the cycle")
    )]
    CircularDependency { nodes: Vec<String> },

    #[error("Pipeline '{pipeline}' has no components")]
    #[diagnostic(code(dagrun::empty_pipeline))]
    EmptyPipeline { pipeline: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch / Runtime Errors (per task, isolated)
    // ─────────────────────────────────────────────────────────────────────────
    #[error("No activity kind registered for task '{id}'")]
    #[diagnostic(
        code(dagrun::unknown_activity),
        help("The task factory is built from the compiled plan; '{id}' was never compiled in")
    )]
    UnknownActivity { id: String },

    #[error("Task '{task}' partition {partition}: upstream '{parent}' never produced a result")]
    #[diagnostic(code(dagrun::upstream_failure))]
    UpstreamFailure {
        task: String,
        partition: u32,
        parent: String,
    },

    #[error("Task '{task}' partition {partition} failed: {message}")]
    #[diagnostic(code(dagrun::execution_failure))]
    ExecutionFailure {
        task: String,
        partition: u32,
        message: String,
    },

    #[error("Timed out after {waited_ms} ms waiting for result ({task}, {partition})")]
    #[diagnostic(code(dagrun::timeout))]
    Timeout {
        task: String,
        partition: u32,
        waited_ms: u64,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Result Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Result ({task}, {partition}) is already written; results are write-once")]
    #[diagnostic(code(dagrun::result_already_written))]
    ResultAlreadyWritten { task: String, partition: u32 },

    #[error("Result store error: {message}")]
    #[diagnostic(code(dagrun::store_error))]
    StoreError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Job Runner Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("No interpreter for script '{path}'")]
    #[diagnostic(
        code(dagrun::unsupported_script),
        help("Supported extensions: .py (python), .sh (bash)")
    )]
    UnsupportedScript { path: PathBuf },

    #[error("Failed to launch '{path}': {error}")]
    #[diagnostic(code(dagrun::launch_failed))]
    LaunchFailed { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(dagrun::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(dagrun::io_error))]
    Io { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(dagrun::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for DagrunError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for DagrunError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}

impl DagrunError {
    /// True for faults that abort compilation before any task is dispatched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownActivityRef { .. }
                | Self::UnknownRunConfig { .. }
                | Self::UnknownResource { .. }
                | Self::UnknownScheduleRef { .. }
                | Self::UnresolvedSource { .. }
                | Self::DuplicateComponent { .. }
                | Self::AmbiguousOutput { .. }
                | Self::DuplicatePort { .. }
                | Self::UnknownPort { .. }
                | Self::PortTypeMismatch { .. }
                | Self::SchemaMismatch { .. }
                | Self::InvalidPartitions { .. }
                | Self::CircularDependency { .. }
                | Self::EmptyPipeline { .. }
        )
    }
}
