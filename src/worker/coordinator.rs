// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Coordination boundary
//!
//! The engine consumes "give me the next partition assignment" and produces
//! per-(node, partition) state reports. A real cluster coordinator sits
//! behind these traits; [`LocalCoordinator`] is the in-process
//! implementation used for single-machine runs and tests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, RwLock};

use crate::compiler::CompiledPipeline;
use crate::errors::DagrunResult;
use crate::runtime::{RuntimeHandle, TaskState};

/// One unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub node_id: String,
    pub partition: u32,
}

/// Source of partition assignments
pub trait Coordinator: RuntimeHandle {
    /// Next assignment, or `None` when all work has been handed out. Each
    /// (node, partition) is handed to exactly one caller.
    fn next_assignment(&self) -> Option<Assignment>;
}

/// In-process coordinator: an assignment queue plus the failure ledger that
/// lets dependents fail fast
pub struct LocalCoordinator {
    queue: Mutex<VecDeque<Assignment>>,
    failed: RwLock<HashSet<String>>,
    terminal: Mutex<BTreeMap<(String, u32), TaskState>>,
    expected: usize,
}

impl LocalCoordinator {
    /// Enqueue every (node, partition) of the plan, parents before children.
    pub fn from_plan(plan: &CompiledPipeline) -> DagrunResult<Self> {
        let mut queue = VecDeque::new();

        for node_id in plan.dag.topological_order()? {
            let partitions = plan
                .dag
                .node(&node_id)
                .map(|n| n.num_partitions)
                .unwrap_or(1);

            for partition in 0..partitions {
                queue.push_back(Assignment {
                    node_id: node_id.clone(),
                    partition,
                });
            }
        }

        let expected = queue.len();

        Ok(Self {
            queue: Mutex::new(queue),
            failed: RwLock::new(HashSet::new()),
            terminal: Mutex::new(BTreeMap::new()),
            expected,
        })
    }

    /// Snapshot of the run's terminal states.
    pub fn report(&self) -> RunReport {
        RunReport {
            states: self.terminal.lock().expect("terminal lock poisoned").clone(),
            expected: self.expected,
        }
    }
}

impl RuntimeHandle for LocalCoordinator {
    fn transition(&self, task: &str, partition: u32, state: TaskState) {
        if let TaskState::Failed(kind) = state {
            tracing::warn!(task = %task, partition, kind = %kind, "task failed");
            self.failed
                .write()
                .expect("failed lock poisoned")
                .insert(task.to_string());
        }

        if state.is_terminal() {
            self.terminal
                .lock()
                .expect("terminal lock poisoned")
                .insert((task.to_string(), partition), state);
        }
    }

    fn is_failed(&self, task: &str) -> bool {
        self.failed
            .read()
            .expect("failed lock poisoned")
            .contains(task)
    }
}

impl Coordinator for LocalCoordinator {
    fn next_assignment(&self) -> Option<Assignment> {
        self.queue.lock().expect("queue lock poisoned").pop_front()
    }
}

/// Terminal states of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    states: BTreeMap<(String, u32), TaskState>,
    expected: usize,
}

impl RunReport {
    /// True when every (node, partition) reached `Succeeded`.
    pub fn success(&self) -> bool {
        self.states.len() == self.expected
            && self.states.values().all(|s| *s == TaskState::Succeeded)
    }

    pub fn state(&self, node_id: &str, partition: u32) -> Option<TaskState> {
        self.states.get(&(node_id.to_string(), partition)).copied()
    }

    /// Terminal states in (node, partition) order.
    pub fn states(&self) -> impl Iterator<Item = (&str, u32, TaskState)> {
        self.states
            .iter()
            .map(|((node, partition), state)| (node.as_str(), *partition, *state))
    }

    /// The (node, partition) instances that did not succeed.
    pub fn failures(&self) -> Vec<(&str, u32, TaskState)> {
        self.states()
            .filter(|(_, _, state)| *state != TaskState::Succeeded)
            .collect()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }
}
