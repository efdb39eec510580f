// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for dagrun.

pub mod graph;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::worker::DEFAULT_NUM_WORKERS;

/// Pipeline compiler and DAG task execution engine
#[derive(Parser, Debug)]
#[clap(
    name = "dagrun",
    version,
    about = "Compile a declarative pipeline into a DAG and run it across a worker pool",
    long_about = None,
    after_help = "Examples:\n\
        dagrun validate pipeline.json   Check a pipeline document\n\
        dagrun graph pipeline.json      Render the compiled DAG\n\
        dagrun run pipeline.json        Compile and execute the pipeline\n\n\
        See 'dagrun <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a pipeline document without running it
    Validate {
        /// Pipeline document to validate
        pipeline: PathBuf,
    },

    /// Show the compiled DAG
    Graph {
        /// Pipeline document
        pipeline: PathBuf,

        /// Output format: text, dot, or mermaid
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Compile and execute a pipeline
    Run {
        /// Pipeline document
        pipeline: PathBuf,

        /// Number of concurrent workers
        #[clap(short, long, default_value_t = DEFAULT_NUM_WORKERS)]
        workers: usize,

        /// Directory for a durable result store (in-memory when omitted)
        #[clap(short, long, value_name = "DIR")]
        store_dir: Option<PathBuf>,

        /// Seconds a task waits on each upstream result
        #[clap(long, default_value = "60", value_name = "SECS")]
        wait_timeout: u64,

        /// Result store poll period in milliseconds
        #[clap(long, default_value = "1000", value_name = "MS")]
        poll_interval: u64,

        /// Compile and show the plan without executing
        #[clap(long)]
        dry_run: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}
