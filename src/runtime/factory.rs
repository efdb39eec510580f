// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Task factory
//!
//! A registration table built at startup from the compiled plan's resolved
//! run configurations. The compiled DAG only knows node ids; the factory
//! binds an id to concrete executable behavior at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{ParentRef, RuntimeHandle, ScriptTask, Task, TaskBody};
use crate::compiler::CompiledPipeline;
use crate::errors::{DagrunError, DagrunResult};
use crate::store::ResultStore;

/// Everything the factory needs to instantiate one node's tasks
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: String,
    pub executable: String,
    pub resource: String,
    pub num_partitions: u32,
    pub parents: Vec<ParentRef>,
}

/// Maps node ids to ready-to-run tasks
pub struct TaskFactory {
    specs: HashMap<String, TaskSpec>,
    wait_timeout: Duration,
}

impl TaskFactory {
    /// Build the registration table from a compiled plan.
    pub fn from_plan(plan: &CompiledPipeline, wait_timeout: Duration) -> Self {
        let mut specs = HashMap::new();

        for node in plan.dag.nodes() {
            let Some(binding) = plan.binding(&node.id) else {
                continue;
            };

            let parents = node
                .parent_ids
                .iter()
                .map(|parent| ParentRef {
                    id: parent.clone(),
                    num_partitions: plan
                        .dag
                        .node(parent)
                        .map(|n| n.num_partitions)
                        .unwrap_or(1),
                })
                .collect();

            specs.insert(
                node.id.clone(),
                TaskSpec {
                    id: node.id.clone(),
                    executable: binding.run_config.executable.clone(),
                    resource: binding
                        .resource
                        .as_ref()
                        .map(|r| r.id.clone())
                        .unwrap_or_default(),
                    num_partitions: node.num_partitions,
                    parents,
                },
            );
        }

        Self {
            specs,
            wait_timeout,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.specs.contains_key(id)
    }

    pub fn spec(&self, id: &str) -> Option<&TaskSpec> {
        self.specs.get(id)
    }

    /// Instantiate the task for one (node, partition) assignment.
    pub fn create(
        &self,
        id: &str,
        partition: u32,
        store: Arc<dyn ResultStore>,
        handle: Arc<dyn RuntimeHandle>,
    ) -> DagrunResult<Task> {
        let spec = self
            .specs
            .get(id)
            .ok_or_else(|| DagrunError::UnknownActivity { id: id.to_string() })?;

        // Script execution is the one registered activity kind; further
        // kinds dispatch here on their run-configuration shape.
        let body: Box<dyn TaskBody> = Box::new(ScriptTask::new(&spec.executable));

        Ok(Task {
            id: spec.id.clone(),
            partition,
            num_partitions: spec.num_partitions,
            resource: spec.resource.clone(),
            parents: spec.parents.clone(),
            body,
            store,
            handle,
            wait_timeout: self.wait_timeout,
        })
    }
}
