// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Partition-aware execution DAG
//!
//! Nodes are keyed by component id; acyclicity is a compile-time invariant.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::DagrunError;

/// One executable node of the compiled graph
#[derive(Debug, Clone)]
pub struct DagNode {
    pub id: String,
    pub num_partitions: u32,
    pub parent_ids: BTreeSet<String>,
}

/// The compiled dependency graph
#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    nodes: BTreeMap<String, DagNode>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Later adds with the same id are ignored; the compiler
    /// rejects duplicate component ids before building the graph.
    pub fn add_node(&mut self, id: &str, num_partitions: u32) {
        if self.index.contains_key(id) {
            return;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        self.nodes.insert(
            id.to_string(),
            DagNode {
                id: id.to_string(),
                num_partitions,
                parent_ids: BTreeSet::new(),
            },
        );
    }

    /// Add a dependency edge parent -> child. Both ends must already be
    /// nodes; duplicate edges collapse.
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        let (Some(&p), Some(&c)) = (self.index.get(parent), self.index.get(child)) else {
            return;
        };
        if !self.graph.contains_edge(p, c) {
            self.graph.add_edge(p, c, ());
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent_ids.insert(parent.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.nodes.get(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.values()
    }

    pub fn contains_edge(&self, parent: &str, child: &str) -> bool {
        match (self.index.get(parent), self.index.get(child)) {
            (Some(&p), Some(&c)) => self.graph.contains_edge(p, c),
            _ => false,
        }
    }

    pub fn parents(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(id).map(|n| &n.parent_ids)
    }

    /// Direct dependents of a node, in id order.
    pub fn children(&self, id: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// Total (node, partition) instances the graph will spawn.
    pub fn total_partitions(&self) -> u64 {
        self.nodes.values().map(|n| u64::from(n.num_partitions)).sum()
    }

    /// Fail with the cycle's node sequence if the graph is not acyclic.
    pub fn ensure_acyclic(&self) -> Result<(), DagrunError> {
        match self.find_cycle() {
            Some(nodes) => Err(DagrunError::CircularDependency { nodes }),
            None => Ok(()),
        }
    }

    /// Topologically sorted node ids.
    pub fn topological_order(&self) -> Result<Vec<String>, DagrunError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n].clone()).collect())
            .map_err(|_| DagrunError::CircularDependency {
                nodes: self.find_cycle().unwrap_or_default(),
            })
    }

    /// Three-color depth-first search. Returns the cycle's node sequence
    /// (first node repeated at the end) when one exists.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn visit(
            dag: &Dag,
            id: &str,
            color: &mut HashMap<String, Color>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            color.insert(id.to_string(), Color::Gray);
            path.push(id.to_string());

            for child in dag.children(id) {
                match color.get(&child).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        let start = path.iter().position(|n| *n == child).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..].to_vec();
                        cycle.push(child);
                        return Some(cycle);
                    }
                    Color::White => {
                        if let Some(cycle) = visit(dag, &child, color, path) {
                            return Some(cycle);
                        }
                    }
                    Color::Black => {}
                }
            }

            path.pop();
            color.insert(id.to_string(), Color::Black);
            None
        }

        let mut color: HashMap<String, Color> = HashMap::new();
        for id in self.nodes.keys() {
            if color.get(id).copied().unwrap_or(Color::White) == Color::White {
                let mut path = Vec::new();
                if let Some(cycle) = visit(self, id, &mut color, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Generate a Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in self.nodes.values() {
            out.push_str(&format!("    {}[{} x{}]\n", node.id, node.id, node.num_partitions));
        }

        for node in self.nodes.values() {
            for parent in &node.parent_ids {
                out.push_str(&format!("    {} --> {}\n", parent, node.id));
            }
        }

        out
    }

    /// Generate a DOT diagram of the graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in self.nodes.values() {
            for parent in &node.parent_ids {
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", parent, node.id));
            }
        }

        for node in self.nodes.values() {
            if node.parent_ids.is_empty() && self.children(&node.id).is_empty() {
                out.push_str(&format!("    \"{}\";\n", node.id));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Text representation of the execution order
    pub fn to_text(&self) -> Result<String, DagrunError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, id) in order.iter().enumerate() {
            let node = &self.nodes[id];
            out.push_str(&format!(
                "{}. {} ({} partition{})",
                i + 1,
                id,
                node.num_partitions,
                if node.num_partitions == 1 { "" } else { "s" }
            ));

            if !node.parent_ids.is_empty() {
                let parents: Vec<&str> = node.parent_ids.iter().map(String::as_str).collect();
                out.push_str(&format!(" [depends: {}]", parents.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}
