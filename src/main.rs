// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! dagrun - Pipeline Compiler and DAG Task Execution Engine
//!
//! Compile a declarative pipeline into a DAG and run it across a worker pool.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dagrun::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dagrun=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate { pipeline } => dagrun::cli::validate::run(pipeline, cli.verbose).await,
        Commands::Graph { pipeline, format } => {
            dagrun::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Run {
            pipeline,
            workers,
            store_dir,
            wait_timeout,
            poll_interval,
            dry_run,
        } => {
            dagrun::cli::run::run(
                pipeline,
                workers,
                store_dir,
                wait_timeout,
                poll_interval,
                dry_run,
                cli.verbose,
            )
            .await
        }
    }
}
