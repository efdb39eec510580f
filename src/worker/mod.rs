// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Workers
//!
//! A worker is a long-lived loop that resolves partition assignments to
//! tasks and drives them to a terminal state. The pool runs a fixed number
//! of workers concurrently; the only shared mutable state between them is
//! the result store.

mod coordinator;

pub use coordinator::{Assignment, Coordinator, LocalCoordinator, RunReport};

use std::sync::Arc;
use std::time::Duration;

use crate::compiler::CompiledPipeline;
use crate::errors::DagrunResult;
use crate::runtime::{FailureKind, RuntimeHandle, TaskFactory, TaskState};
use crate::store::ResultStore;

/// Default pool size
pub const DEFAULT_NUM_WORKERS: usize = 10;

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of concurrent workers
    pub workers: usize,
    /// How long a task waits on each upstream result
    pub wait_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_NUM_WORKERS,
            wait_timeout: Duration::from_secs(60),
        }
    }
}

/// One worker loop
pub struct Worker {
    id: usize,
    coordinator: Arc<dyn Coordinator>,
    handle: Arc<dyn RuntimeHandle>,
    factory: Arc<TaskFactory>,
    store: Arc<dyn ResultStore>,
}

impl Worker {
    pub fn new(
        id: usize,
        coordinator: Arc<dyn Coordinator>,
        handle: Arc<dyn RuntimeHandle>,
        factory: Arc<TaskFactory>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            id,
            coordinator,
            handle,
            factory,
            store,
        }
    }

    /// Drain assignments until the coordinator runs out.
    pub async fn run(self) {
        while let Some(assignment) = self.coordinator.next_assignment() {
            tracing::debug!(
                worker = self.id,
                node = %assignment.node_id,
                partition = assignment.partition,
                "picked up assignment"
            );

            match self.factory.create(
                &assignment.node_id,
                assignment.partition,
                Arc::clone(&self.store),
                Arc::clone(&self.handle),
            ) {
                Ok(task) => {
                    let state = task.run().await;
                    tracing::info!(
                        worker = self.id,
                        node = %assignment.node_id,
                        partition = assignment.partition,
                        state = %state,
                        "task finished"
                    );
                }
                Err(e) => {
                    // A dispatch fault fails this partition only; siblings
                    // and the worker itself carry on.
                    tracing::warn!(
                        worker = self.id,
                        node = %assignment.node_id,
                        partition = assignment.partition,
                        "cannot create task: {e}"
                    );
                    self.handle.transition(
                        &assignment.node_id,
                        assignment.partition,
                        TaskState::Failed(FailureKind::UnknownActivity),
                    );
                }
            }
        }

        tracing::debug!(worker = self.id, "no more assignments, exiting");
    }
}

/// Fixed-size pool driving a compiled plan to completion
pub struct WorkerPool {
    options: RunOptions,
}

impl WorkerPool {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Execute every (node, partition) of the plan and collect terminal
    /// states.
    pub async fn run(
        &self,
        plan: &CompiledPipeline,
        store: Arc<dyn ResultStore>,
    ) -> DagrunResult<RunReport> {
        let factory = Arc::new(TaskFactory::from_plan(plan, self.options.wait_timeout));
        let coordinator = Arc::new(LocalCoordinator::from_plan(plan)?);

        let workers = self.options.workers.max(1);
        tracing::info!(
            pipeline = %plan.pipeline_id,
            workers,
            partitions = plan.dag.total_partitions(),
            "starting run"
        );

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(
                id,
                Arc::clone(&coordinator) as Arc<dyn Coordinator>,
                Arc::clone(&coordinator) as Arc<dyn RuntimeHandle>,
                Arc::clone(&factory),
                Arc::clone(&store),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("worker exited abnormally: {e}");
            }
        }

        Ok(coordinator.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::document::Document;
    use crate::store::MemoryResultStore;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{body}").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn two_node_doc(first_exe: &str, second_exe: &str) -> Document {
        Document::from_json(&format!(
            r#"
            {{
              "resources": [{{"id": "local", "uri": "localhost"}}],
              "activities": [
                {{
                  "id": "script-1",
                  "runconfigs": [{{"id": "rc-1", "executable": "{first_exe}", "resource": "local"}}],
                  "outputs": [{{"id": "out-1"}}]
                }},
                {{
                  "id": "script-2",
                  "runconfigs": [{{"id": "rc-2", "executable": "{second_exe}", "resource": "local"}}],
                  "inputs": [{{"id": "in-1"}}]
                }}
              ],
              "pipeline": {{
                "id": "analytics",
                "nodes": [
                  {{"activity": "script-1", "runconfig": "rc-1",
                   "outputs": [{{"id": "out-1", "sink": ""}}]}},
                  {{"activity": "script-2", "runconfig": "rc-2",
                   "inputs": [{{"id": "in-1", "source": "out-1"}}]}}
                ]
              }}
            }}
            "#
        ))
        .unwrap()
    }

    fn fast_options() -> RunOptions {
        RunOptions {
            workers: 4,
            wait_timeout: Duration::from_secs(5),
        }
    }

    fn fast_store() -> Arc<MemoryResultStore> {
        Arc::new(MemoryResultStore::with_poll_interval(
            Duration::from_millis(10),
        ))
    }

    #[tokio::test]
    async fn test_two_node_pipeline_end_to_end() {
        let dir = TempDir::new().unwrap();
        let first = write_script(&dir, "first.sh", "echo produced");
        let second = write_script(&dir, "second.sh", "echo consumed");

        let plan = compile(&two_node_doc(&first, &second)).unwrap();
        assert_eq!(plan.dag.len(), 2);
        assert!(plan.dag.contains_edge("script-1", "script-2"));

        let store = fast_store();
        let report = WorkerPool::new(fast_options())
            .run(&plan, Arc::clone(&store) as Arc<dyn ResultStore>)
            .await
            .unwrap();

        assert!(report.success());
        assert_eq!(report.state("script-1", 0), Some(TaskState::Succeeded));
        assert_eq!(report.state("script-2", 0), Some(TaskState::Succeeded));

        // script-2 only ran after (script-1, 0) was written; both results
        // are visible afterwards.
        let upstream = store.get("script-1", 0).await.unwrap().unwrap();
        assert!(String::from_utf8(upstream).unwrap().contains("produced"));
        assert!(store.get("script-2", 0).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unlaunchable_parent_fails_chain_fast() {
        let dir = TempDir::new().unwrap();
        let second = write_script(&dir, "second.sh", "echo consumed");

        // Parent script path does not exist: launch fault.
        let plan = compile(&two_node_doc("/no/such/first.py", &second)).unwrap();

        let store = fast_store();
        let report = WorkerPool::new(fast_options())
            .run(&plan, Arc::clone(&store) as Arc<dyn ResultStore>)
            .await
            .unwrap();

        assert!(!report.success());
        assert_eq!(
            report.state("script-1", 0),
            Some(TaskState::Failed(FailureKind::ExecutionFailure))
        );
        assert_eq!(
            report.state("script-2", 0),
            Some(TaskState::Failed(FailureKind::UpstreamFailure))
        );

        // No value ever observable at the failed task's key.
        assert_eq!(store.get("script-1", 0).await.unwrap(), None);
        assert_eq!(store.get("script-2", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sibling_branches_survive_a_failure() {
        let dir = TempDir::new().unwrap();
        let good = write_script(&dir, "good.sh", "echo fine");

        let doc = Document::from_json(&format!(
            r#"
            {{
              "activities": [
                {{"id": "ok-branch", "runconfigs": [{{"id": "rc-ok", "executable": "{good}"}}]}},
                {{"id": "bad-branch", "runconfigs": [{{"id": "rc-bad", "executable": "/missing.sh"}}]}}
              ],
              "pipeline": {{
                "id": "p",
                "nodes": [
                  {{"activity": "ok-branch", "runconfig": "rc-ok"}},
                  {{"activity": "bad-branch", "runconfig": "rc-bad"}}
                ]
              }}
            }}
            "#
        ))
        .unwrap();

        let plan = compile(&doc).unwrap();
        let store = fast_store();
        let report = WorkerPool::new(fast_options())
            .run(&plan, Arc::clone(&store) as Arc<dyn ResultStore>)
            .await
            .unwrap();

        assert!(!report.success());
        assert_eq!(report.state("ok-branch", 0), Some(TaskState::Succeeded));
        assert_eq!(
            report.state("bad-branch", 0),
            Some(TaskState::Failed(FailureKind::ExecutionFailure))
        );
    }

    #[tokio::test]
    async fn test_partitioned_node_runs_every_partition() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "part.sh", "echo part");

        let doc = Document::from_json(&format!(
            r#"
            {{
              "activities": [
                {{"id": "wide", "runconfigs": [{{"id": "rc", "executable": "{script}", "partitions": 3}}]}}
              ],
              "pipeline": {{"id": "p", "nodes": [{{"activity": "wide", "runconfig": "rc"}}]}}
            }}
            "#
        ))
        .unwrap();

        let plan = compile(&doc).unwrap();
        let store = fast_store();
        let report = WorkerPool::new(fast_options())
            .run(&plan, Arc::clone(&store) as Arc<dyn ResultStore>)
            .await
            .unwrap();

        assert!(report.success());
        for partition in 0..3 {
            assert_eq!(report.state("wide", partition), Some(TaskState::Succeeded));
            assert!(store.get("wide", partition).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_single_worker_still_completes_a_chain() {
        let dir = TempDir::new().unwrap();
        let first = write_script(&dir, "first.sh", "echo one");
        let second = write_script(&dir, "second.sh", "echo two");

        let plan = compile(&two_node_doc(&first, &second)).unwrap();
        let store = fast_store();

        let report = WorkerPool::new(RunOptions {
            workers: 1,
            wait_timeout: Duration::from_secs(5),
        })
        .run(&plan, store as Arc<dyn ResultStore>)
        .await
        .unwrap();

        assert!(report.success());
    }
}
