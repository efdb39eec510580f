// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Script activity kind
//!
//! Delegates execution to the script job runner. Retry is a policy of this
//! concrete kind, not of the base state machine: a failed attempt may be
//! re-run before the task surfaces `ExecutionFailure`.

use async_trait::async_trait;
use std::path::PathBuf;

use super::TaskBody;
use crate::errors::DagrunResult;
use crate::runner::{JobRunner, ScriptRunner};

/// Executes a script activity through [`ScriptRunner`]
pub struct ScriptTask {
    script: PathBuf,
    retries: u32,
}

impl ScriptTask {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            retries: 0,
        }
    }

    /// Re-attempt the script this many times before giving up.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

#[async_trait]
impl TaskBody for ScriptTask {
    async fn execute(
        &self,
        resource: &str,
        num_partitions: u32,
        partition: u32,
    ) -> DagrunResult<Vec<u8>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(
                script = %self.script.display(),
                resource = %resource,
                partition,
                num_partitions,
                attempt,
                "launching script"
            );

            match ScriptRunner::new(&self.script).run().await {
                Ok(output) => return Ok(output.into_bytes()),
                Err(e) if attempt <= self.retries => {
                    tracing::warn!(
                        script = %self.script.display(),
                        attempt,
                        "attempt failed, retrying: {e}"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
