// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Run command - compile and execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::compiler::{self, CompiledPipeline};
use crate::document::Document;
use crate::runtime::TaskState;
use crate::store::{FilesystemResultStore, MemoryResultStore, ResultStore};
use crate::worker::{RunOptions, WorkerPool};

/// Compile and execute a pipeline document
#[allow(clippy::too_many_arguments)]
pub async fn run(
    pipeline_path: PathBuf,
    workers: usize,
    store_dir: Option<PathBuf>,
    wait_timeout: u64,
    poll_interval: u64,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let document = Document::from_file(&pipeline_path)?;
    let plan = compiler::compile(&document)?;

    print_execution_plan(&plan)?;

    if dry_run {
        return Ok(());
    }

    let poll = Duration::from_millis(poll_interval.max(1));
    let store: Arc<dyn ResultStore> = match store_dir {
        Some(dir) => Arc::new(FilesystemResultStore::new(dir)?.with_poll_interval(poll)),
        None => Arc::new(MemoryResultStore::with_poll_interval(poll)),
    };

    let options = RunOptions {
        workers: workers.max(1),
        wait_timeout: Duration::from_secs(wait_timeout.max(1)),
    };

    let start = Instant::now();
    let report = WorkerPool::new(options).run(&plan, store).await?;
    let duration = start.elapsed();

    println!();
    for (node, partition, state) in report.states() {
        match state {
            TaskState::Succeeded => {
                println!("  {} {} [{}]", "✓".green(), node.bold(), partition);
            }
            other => {
                println!(
                    "  {} {} [{}] {}",
                    "✗".red(),
                    node.bold(),
                    partition,
                    other.to_string().dimmed()
                );
            }
        }
    }

    println!();
    if report.success() {
        println!(
            "{}",
            format!(
                "Pipeline completed successfully in {:.2}s",
                duration.as_secs_f64()
            )
            .green()
        );
        Ok(())
    } else {
        if verbose {
            for (node, partition, state) in report.failures() {
                eprintln!("  {} ({node}, {partition}) ended {state}", "✗".red());
            }
        }
        println!(
            "{}",
            format!("Pipeline failed after {:.2}s", duration.as_secs_f64()).red()
        );
        Err(miette::miette!("Pipeline execution failed"))
    }
}

/// Print the execution plan before running
fn print_execution_plan(plan: &CompiledPipeline) -> Result<()> {
    println!();
    println!("{}: {}", "Pipeline".bold(), plan.pipeline_id);
    println!("{}", "═".repeat(50));
    println!(
        "Execution plan ({} node{}, {} partition{}):",
        plan.dag.len(),
        if plan.dag.len() == 1 { "" } else { "s" },
        plan.dag.total_partitions(),
        if plan.dag.total_partitions() == 1 { "" } else { "s" }
    );
    println!();

    for line in plan.dag.to_text()?.lines() {
        println!("  {line}");
    }

    println!();
    Ok(())
}
