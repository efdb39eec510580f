// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Job runners
//!
//! Executes the external command behind a script activity and streams its
//! output to the logging sink.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::errors::{DagrunError, DagrunResult};

/// Trait for job runners
///
/// Success means the process was launched and its stdout stream closed
/// normally; the exit code is captured and logged but is not part of the
/// contract.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Launch the job, stream stdout line-by-line as it arrives, and return
    /// the captured output.
    async fn run(&self) -> DagrunResult<String>;
}

/// Runs a script through the interpreter matching its file extension
pub struct ScriptRunner {
    script: PathBuf,
}

impl ScriptRunner {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Resolve the interpreter on PATH from the script's extension.
    fn interpreter(&self) -> DagrunResult<PathBuf> {
        let extension = self.script.extension().and_then(|e| e.to_str());

        match extension {
            Some("py") => which::which("python3")
                .or_else(|_| which::which("python"))
                .map_err(|_| DagrunError::LaunchFailed {
                    path: self.script.clone(),
                    error: "no python interpreter on PATH".to_string(),
                }),
            Some("sh") => which::which("bash").map_err(|_| DagrunError::LaunchFailed {
                path: self.script.clone(),
                error: "bash not found on PATH".to_string(),
            }),
            _ => Err(DagrunError::UnsupportedScript {
                path: self.script.clone(),
            }),
        }
    }
}

#[async_trait]
impl JobRunner for ScriptRunner {
    async fn run(&self) -> DagrunResult<String> {
        let interpreter = self.interpreter()?;

        if !self.script.exists() {
            return Err(DagrunError::LaunchFailed {
                path: self.script.clone(),
                error: "script not found".to_string(),
            });
        }

        let mut child = Command::new(&interpreter)
            .arg(&self.script)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| DagrunError::LaunchFailed {
                path: self.script.clone(),
                error: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DagrunError::LaunchFailed {
            path: self.script.clone(),
            error: "stdout was not captured".to_string(),
        })?;

        let mut lines = BufReader::new(stdout).lines();
        let mut captured = String::new();

        while let Some(line) = lines.next_line().await? {
            tracing::info!(script = %self.script.display(), "{line}");
            captured.push_str(&line);
            captured.push('\n');
        }

        let status = child.wait().await?;
        if !status.success() {
            tracing::warn!(
                script = %self.script.display(),
                code = ?status.code(),
                "script exited with nonzero status"
            );
        }

        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{body}").unwrap();
        path
    }

    #[tokio::test]
    async fn test_sh_script_output_is_captured() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "hello.sh", "echo hello\necho world");

        let output = ScriptRunner::new(script).run().await.unwrap();

        assert!(output.contains("hello"));
        assert!(output.contains("world"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_still_completes() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "fail.sh", "echo partial\nexit 3");

        // Stream closed normally, so the run completes despite the exit code.
        let output = ScriptRunner::new(script).run().await.unwrap();
        assert!(output.contains("partial"));
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_rejected() {
        let err = ScriptRunner::new("job.rb").run().await.unwrap_err();
        assert!(matches!(err, DagrunError::UnsupportedScript { .. }));
    }

    #[tokio::test]
    async fn test_missing_script_is_a_launch_fault() {
        let err = ScriptRunner::new("/no/such/dir/job.sh").run().await.unwrap_err();
        assert!(matches!(err, DagrunError::LaunchFailed { .. }));
    }

    #[test]
    fn test_interpreter_dispatch_by_extension() {
        assert!(ScriptRunner::new("a.sh").interpreter().is_ok());
        assert!(ScriptRunner::new("a.jar").interpreter().is_err());
    }
}
