// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Graph command - render the compiled DAG

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::compiler;
use crate::document::Document;

/// Render the compiled DAG of a pipeline document
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let document = Document::from_file(&pipeline_path)?;
    let plan = compiler::compile(&document)?;

    match format {
        GraphFormat::Text => print!("{}", plan.dag.to_text()?),
        GraphFormat::Dot => print!("{}", plan.dag.to_dot()),
        GraphFormat::Mermaid => print!("{}", plan.dag.to_mermaid()),
    }

    Ok(())
}
