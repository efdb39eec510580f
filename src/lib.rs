// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! # dagrun - Pipeline Compiler and DAG Task Execution Engine
//!
//! `dagrun` compiles a declarative JSON pipeline document into a validated,
//! partition-aware dependency graph and executes it across a pool of
//! workers, handing results between tasks through a result store.
//!
//! ## Features
//!
//! - **Compilation** - Resolves activities, run configurations, resources,
//!   and port wiring into an executable DAG, rejecting unknown references,
//!   type/schema mismatches, and cycles before anything runs
//! - **Partitioned execution** - A node with `partitions: n` spawns `n`
//!   independent task instances
//! - **Failure isolation** - A failed task fails its own (node, partition);
//!   dependents fail fast, sibling branches keep their results
//! - **Pluggable result store** - In-memory for single-process runs, a
//!   filesystem backend for durable handoff
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline document
//! dagrun validate pipeline.json
//!
//! # Render the compiled DAG
//! dagrun graph pipeline.json --format dot
//!
//! # Execute with 4 workers and a durable store
//! dagrun run pipeline.json --workers 4 --store-dir .dagrun/results
//! ```

pub mod cli;
pub mod compiler;
pub mod document;
pub mod errors;
pub mod runner;
pub mod runtime;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use compiler::{compile, CompiledPipeline, Dag};
pub use document::Document;
pub use errors::{DagrunError, DagrunResult};
pub use runtime::{TaskFactory, TaskState};
pub use store::ResultStore;
pub use worker::{RunOptions, WorkerPool};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
