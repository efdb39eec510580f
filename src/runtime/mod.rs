// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Task runtime
//!
//! Drives one (node, partition) instance from dependency wait through
//! execution to result publication. Every state transition is reported
//! through the [`RuntimeHandle`] so the coordination layer can observe it.

mod factory;
mod script;

pub use factory::{TaskFactory, TaskSpec};
pub use script::ScriptTask;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{DagrunError, DagrunResult};
use crate::store::ResultStore;

/// Why a task ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No activity kind registered for the task's id
    UnknownActivity,
    /// A parent never produced a result (failed or timed out)
    UpstreamFailure,
    /// The activity body itself failed
    ExecutionFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownActivity => write!(f, "unknown-activity"),
            Self::UpstreamFailure => write!(f, "upstream-failure"),
            Self::ExecutionFailure => write!(f, "execution-failure"),
        }
    }
}

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    WaitingOnParents,
    Running,
    Succeeded,
    Failed(FailureKind),
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::WaitingOnParents => write!(f, "waiting-on-parents"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// The task's view of the coordination layer
pub trait RuntimeHandle: Send + Sync {
    /// Observe a state transition of (task, partition).
    fn transition(&self, task: &str, partition: u32, state: TaskState);

    /// Whether some partition of `task` has already been reported failed.
    /// Lets dependents fail fast instead of burning their wait timeout.
    fn is_failed(&self, task: &str) -> bool;
}

/// Activity-kind-specific execution body
#[async_trait]
pub trait TaskBody: Send + Sync {
    async fn execute(
        &self,
        resource: &str,
        num_partitions: u32,
        partition: u32,
    ) -> DagrunResult<Vec<u8>>;
}

/// A parent node reference carrying its partition count
#[derive(Debug, Clone)]
pub struct ParentRef {
    pub id: String,
    pub num_partitions: u32,
}

/// One dispatched (node, partition) instance
pub struct Task {
    pub(crate) id: String,
    pub(crate) partition: u32,
    pub(crate) num_partitions: u32,
    pub(crate) resource: String,
    pub(crate) parents: Vec<ParentRef>,
    pub(crate) body: Box<dyn TaskBody>,
    pub(crate) store: Arc<dyn ResultStore>,
    pub(crate) handle: Arc<dyn RuntimeHandle>,
    pub(crate) wait_timeout: Duration,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("partition", &self.partition)
            .field("num_partitions", &self.num_partitions)
            .field("resource", &self.resource)
            .field("parents", &self.parents)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Drive the task to a terminal state and return it.
    pub async fn run(self) -> TaskState {
        self.report(TaskState::Created);

        if !self.parents.is_empty() {
            self.report(TaskState::WaitingOnParents);

            if let Err(e) = self.wait_on_parents().await {
                tracing::warn!(task = %self.id, partition = self.partition, "{e}");
                return self.finish(TaskState::Failed(FailureKind::UpstreamFailure));
            }
        }

        self.report(TaskState::Running);

        match self
            .body
            .execute(&self.resource, self.num_partitions, self.partition)
            .await
        {
            Ok(payload) => match self.store.put(&self.id, self.partition, payload).await {
                Ok(()) => self.finish(TaskState::Succeeded),
                Err(e) => {
                    tracing::error!(
                        task = %self.id,
                        partition = self.partition,
                        "failed to publish result: {e}"
                    );
                    self.finish(TaskState::Failed(FailureKind::ExecutionFailure))
                }
            },
            Err(e) => {
                tracing::warn!(
                    task = %self.id,
                    partition = self.partition,
                    "execution failed: {e}"
                );
                self.finish(TaskState::Failed(FailureKind::ExecutionFailure))
            }
        }
    }

    /// Broadcast fan-in: wait for every partition of every parent.
    async fn wait_on_parents(&self) -> DagrunResult<()> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        let poll = self.store.poll_interval();

        for parent in &self.parents {
            for partition in 0..parent.num_partitions {
                loop {
                    if self.handle.is_failed(&parent.id) {
                        return Err(self.upstream_failure(&parent.id));
                    }

                    match self.store.get(&parent.id, partition).await {
                        Ok(Some(_)) => break,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(
                                task = %self.id,
                                parent = %parent.id,
                                "result store fault while waiting: {e}"
                            );
                            return Err(self.upstream_failure(&parent.id));
                        }
                    }

                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        return Err(self.upstream_failure(&parent.id));
                    }
                    tokio::time::sleep(poll.min(deadline - now)).await;
                }
            }
        }

        Ok(())
    }

    fn upstream_failure(&self, parent: &str) -> DagrunError {
        DagrunError::UpstreamFailure {
            task: self.id.clone(),
            partition: self.partition,
            parent: parent.to_string(),
        }
    }

    fn report(&self, state: TaskState) {
        tracing::debug!(task = %self.id, partition = self.partition, state = %state, "transition");
        self.handle.transition(&self.id, self.partition, state);
    }

    fn finish(&self, state: TaskState) -> TaskState {
        self.report(state);
        state
    }
}
