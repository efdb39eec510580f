// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Validate command - compile the document and report faults

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::compiler;
use crate::document::Document;

/// Validate a pipeline document
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let document = Document::from_file(&pipeline_path)?;

    match compiler::compile(&document) {
        Ok(plan) => {
            println!(
                "{} {} is valid ({} node{}, {} partition{})",
                "✓".green(),
                document.pipeline.id.bold(),
                plan.dag.len(),
                if plan.dag.len() == 1 { "" } else { "s" },
                plan.dag.total_partitions(),
                if plan.dag.total_partitions() == 1 { "" } else { "s" }
            );

            if verbose {
                println!();
                print!("{}", plan.dag.to_text()?);
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("{}", "Pipeline validation failed:".red().bold());
            Err(e.into())
        }
    }
}
