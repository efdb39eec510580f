// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Pipeline compiler
//!
//! Translates the declarative document into a validated, partition-aware
//! execution DAG plus the per-node bindings the runtime needs. All faults
//! here are fatal: the run never starts.

mod dag;

pub use dag::{Dag, DagNode};

use std::collections::HashMap;

use crate::document::{Activity, Component, Document, Resource, RunConfiguration};
use crate::errors::{DagrunError, DagrunResult};

/// Resolved execution material for one DAG node
#[derive(Debug, Clone)]
pub struct NodeBinding {
    pub activity: Activity,
    pub run_config: RunConfiguration,
    pub resource: Option<Resource>,
}

/// Output of compilation: the graph and its side table
#[derive(Debug)]
pub struct CompiledPipeline {
    pub pipeline_id: String,
    pub dag: Dag,
    bindings: HashMap<String, NodeBinding>,
}

impl CompiledPipeline {
    pub fn binding(&self, node_id: &str) -> Option<&NodeBinding> {
        self.bindings.get(node_id)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &NodeBinding)> {
        self.bindings.iter().map(|(id, b)| (id.as_str(), b))
    }
}

/// Compile a document into an executable plan.
pub fn compile(doc: &Document) -> DagrunResult<CompiledPipeline> {
    let pipeline = &doc.pipeline;

    if pipeline.components.is_empty() {
        return Err(DagrunError::EmptyPipeline {
            pipeline: pipeline.id.clone(),
        });
    }

    if let Some(schedule_id) = &pipeline.schedule_id {
        if doc.schedule(schedule_id).is_none() {
            return Err(DagrunError::UnknownScheduleRef {
                pipeline: pipeline.id.clone(),
                schedule: schedule_id.clone(),
            });
        }
    }

    for activity in &doc.activities {
        check_port_uniqueness(activity)?;
    }

    let bindings = resolve_bindings(doc)?;
    let output_index = index_outputs(pipeline)?;
    let edges = resolve_edges(doc, &bindings, &output_index)?;

    let mut dag = Dag::new();
    for component in &pipeline.components {
        let binding = &bindings[component.node_id()];
        dag.add_node(component.node_id(), binding.run_config.num_partitions());
    }
    for (parent, child) in &edges {
        dag.add_edge(parent, child);
    }

    dag.ensure_acyclic()?;

    tracing::debug!(
        pipeline = %pipeline.id,
        nodes = dag.len(),
        partitions = dag.total_partitions(),
        "compiled pipeline"
    );

    Ok(CompiledPipeline {
        pipeline_id: pipeline.id.clone(),
        dag,
        bindings,
    })
}

/// Port ids must be unique within their owning activity.
fn check_port_uniqueness(activity: &Activity) -> DagrunResult<()> {
    let mut seen = std::collections::HashSet::new();
    let ids = activity
        .inputs
        .iter()
        .map(|p| p.id.as_str())
        .chain(activity.outputs.iter().map(|p| p.id.as_str()));

    for id in ids {
        if !seen.insert(id) {
            return Err(DagrunError::DuplicatePort {
                activity: activity.id.clone(),
                port: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Resolve each component to its activity, run configuration, and resource.
fn resolve_bindings(doc: &Document) -> DagrunResult<HashMap<String, NodeBinding>> {
    let mut bindings = HashMap::new();

    for component in &doc.pipeline.components {
        let node_id = component.node_id();

        let activity = doc.activity(&component.activity).ok_or_else(|| {
            DagrunError::UnknownActivityRef {
                component: node_id.to_string(),
                activity: component.activity.clone(),
            }
        })?;

        let run_config = activity.run_config(&component.run_config_id).ok_or_else(|| {
            DagrunError::UnknownRunConfig {
                component: node_id.to_string(),
                run_config: component.run_config_id.clone(),
            }
        })?;

        if run_config.num_partitions() == 0 {
            return Err(DagrunError::InvalidPartitions {
                run_config: run_config.id.clone(),
            });
        }

        let resource = if run_config.resource_id.is_empty() {
            None
        } else {
            Some(
                doc.resource(&run_config.resource_id)
                    .cloned()
                    .ok_or_else(|| DagrunError::UnknownResource {
                        run_config: run_config.id.clone(),
                        resource: run_config.resource_id.clone(),
                    })?,
            )
        };

        check_wired_ports(component, activity)?;

        let previous = bindings.insert(
            node_id.to_string(),
            NodeBinding {
                activity: activity.clone(),
                run_config: run_config.clone(),
                resource,
            },
        );

        if previous.is_some() {
            return Err(DagrunError::DuplicateComponent {
                component: node_id.to_string(),
            });
        }
    }

    Ok(bindings)
}

/// Every wired input/output id must name a port of the component's activity.
fn check_wired_ports(component: &Component, activity: &Activity) -> DagrunResult<()> {
    for input in &component.inputs {
        if activity.in_port(&input.id).is_none() {
            return Err(DagrunError::UnknownPort {
                component: component.node_id().to_string(),
                port: input.id.clone(),
            });
        }
    }
    for output in &component.outputs {
        if activity.out_port(&output.id).is_none() {
            return Err(DagrunError::UnknownPort {
                component: component.node_id().to_string(),
                port: output.id.clone(),
            });
        }
    }
    Ok(())
}

/// Map each published output id to the component that owns it.
fn index_outputs(pipeline: &crate::document::Pipeline) -> DagrunResult<HashMap<String, String>> {
    let mut index: HashMap<String, String> = HashMap::new();

    for component in &pipeline.components {
        for output in &component.outputs {
            if let Some(first) = index.get(&output.id) {
                return Err(DagrunError::AmbiguousOutput {
                    output: output.id.clone(),
                    first: first.clone(),
                    second: component.node_id().to_string(),
                });
            }
            index.insert(output.id.clone(), component.node_id().to_string());
        }
    }

    Ok(index)
}

/// Resolve input sources to producing components, checking port and schema
/// compatibility along each edge.
fn resolve_edges(
    doc: &Document,
    bindings: &HashMap<String, NodeBinding>,
    output_index: &HashMap<String, String>,
) -> DagrunResult<Vec<(String, String)>> {
    let mut edges = Vec::new();

    for component in &doc.pipeline.components {
        let node_id = component.node_id();
        let consumer = &bindings[node_id].activity;

        for input in &component.inputs {
            let producer_id = output_index.get(&input.source).ok_or_else(|| {
                DagrunError::UnresolvedSource {
                    component: node_id.to_string(),
                    input: input.id.clone(),
                    src: input.source.clone(),
                }
            })?;

            let producer = &bindings[producer_id].activity;
            check_edge_compatibility(
                producer_id,
                producer,
                &input.source,
                node_id,
                consumer,
                &input.id,
            )?;

            edges.push((producer_id.clone(), node_id.to_string()));
        }
    }

    Ok(edges)
}

/// Producer's out port and consumer's in port must agree on port type, and
/// the producer's schema must cover every column the consumer declares.
fn check_edge_compatibility(
    producer_id: &str,
    producer: &Activity,
    output_id: &str,
    consumer_id: &str,
    consumer: &Activity,
    input_id: &str,
) -> DagrunResult<()> {
    let out_port = producer
        .out_port(output_id)
        .ok_or_else(|| DagrunError::UnknownPort {
            component: producer_id.to_string(),
            port: output_id.to_string(),
        })?;
    let in_port = consumer
        .in_port(input_id)
        .ok_or_else(|| DagrunError::UnknownPort {
            component: consumer_id.to_string(),
            port: input_id.to_string(),
        })?;

    if !out_port.port_type.compatible_with(in_port.port_type) {
        return Err(DagrunError::PortTypeMismatch {
            producer: producer_id.to_string(),
            consumer: consumer_id.to_string(),
            output: output_id.to_string(),
            input: input_id.to_string(),
            expected: in_port.port_type.to_string(),
            found: out_port.port_type.to_string(),
        });
    }

    if out_port.schema.is_empty() || in_port.schema.is_empty() {
        return Ok(());
    }

    for (column, want) in in_port.schema.columns() {
        match out_port.schema.get(column) {
            None => {
                return Err(DagrunError::SchemaMismatch {
                    producer: producer_id.to_string(),
                    consumer: consumer_id.to_string(),
                    column: column.to_string(),
                    expected: want.to_string(),
                    found: "missing".to_string(),
                });
            }
            Some(have) if !have.compatible_with(want) => {
                return Err(DagrunError::SchemaMismatch {
                    producer: producer_id.to_string(),
                    consumer: consumer_id.to_string(),
                    column: column.to_string(),
                    expected: want.to_string(),
                    found: have.to_string(),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn two_node_doc() -> Document {
        Document::from_json(
            r#"
            {
              "resources": [{"id": "local", "uri": "localhost"}],
              "activities": [
                {
                  "id": "script-1",
                  "runconfigs": [{"id": "rc-1", "executable": "first.py", "resource": "local"}],
                  "outputs": [{"id": "out-1", "type": "table"}]
                },
                {
                  "id": "script-2",
                  "runconfigs": [{"id": "rc-2", "executable": "second.py", "resource": "local"}],
                  "inputs": [{"id": "in-1", "type": "table"}]
                }
              ],
              "pipeline": {
                "id": "analytics",
                "nodes": [
                  {"activity": "script-1", "runconfig": "rc-1",
                   "outputs": [{"id": "out-1", "sink": "results"}]},
                  {"activity": "script-2", "runconfig": "rc-2",
                   "inputs": [{"id": "in-1", "source": "out-1"}]}
                ]
              }
            }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_compile_two_node_pipeline() {
        let compiled = compile(&two_node_doc()).unwrap();

        assert_eq!(compiled.dag.len(), 2);
        assert!(compiled.dag.contains_edge("script-1", "script-2"));
        assert!(compiled.dag.parents("script-1").unwrap().is_empty());
        assert_eq!(
            compiled.binding("script-1").unwrap().run_config.executable,
            "first.py"
        );
        assert_eq!(
            compiled
                .binding("script-2")
                .unwrap()
                .resource
                .as_ref()
                .unwrap()
                .uri,
            "localhost"
        );
    }

    #[test]
    fn test_node_set_equals_component_set() {
        let doc = two_node_doc();
        let compiled = compile(&doc).unwrap();

        let mut node_ids: Vec<&str> = compiled.dag.nodes().map(|n| n.id.as_str()).collect();
        let mut component_ids = doc.pipeline.node_ids();
        node_ids.sort();
        component_ids.sort();
        assert_eq!(node_ids, component_ids);
    }

    #[test]
    fn test_unknown_activity_named_in_error() {
        let doc = Document::from_json(
            r#"
            {
              "pipeline": {
                "id": "p",
                "nodes": [{"activity": "ghost", "runconfig": "rc"}]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(err.is_validation());
        assert!(matches!(err, DagrunError::UnknownActivityRef { .. }));
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let doc = Document::from_json(
            r#"
            {
              "schedules": [{"id": "nightly", "cron": "0 0 * * *"}],
              "activities": [{"id": "a", "runconfigs": [{"id": "rc", "executable": "a.py"}]}],
              "pipeline": {
                "id": "p",
                "schedule": "hourly",
                "nodes": [{"activity": "a", "runconfig": "rc"}]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        assert!(err.to_string().contains("hourly"));
        assert!(matches!(err, DagrunError::UnknownScheduleRef { .. }));
    }

    #[test]
    fn test_unknown_run_config_named_in_error() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [{"id": "a", "runconfigs": [{"id": "rc-real", "executable": "x.py"}]}],
              "pipeline": {
                "id": "p",
                "nodes": [{"activity": "a", "runconfig": "rc-ghost"}]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        assert!(err.to_string().contains("rc-ghost"));
        assert!(matches!(err, DagrunError::UnknownRunConfig { .. }));
    }

    #[test]
    fn test_unresolved_source_named_in_error() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {
                  "id": "a",
                  "runconfigs": [{"id": "rc", "executable": "x.py"}],
                  "inputs": [{"id": "in-1"}]
                }
              ],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"activity": "a", "runconfig": "rc",
                   "inputs": [{"id": "in-1", "source": "missing-node"}]}
                ]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        assert!(err.to_string().contains("missing-node"));
        assert!(matches!(err, DagrunError::UnresolvedSource { .. }));
    }

    #[test]
    fn test_cycle_is_a_compile_fault() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {
                  "id": "a",
                  "runconfigs": [{"id": "rc-a", "executable": "a.py"}],
                  "inputs": [{"id": "a-in"}],
                  "outputs": [{"id": "a-out"}]
                },
                {
                  "id": "b",
                  "runconfigs": [{"id": "rc-b", "executable": "b.py"}],
                  "inputs": [{"id": "b-in"}],
                  "outputs": [{"id": "b-out"}]
                }
              ],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"activity": "a", "runconfig": "rc-a",
                   "inputs": [{"id": "a-in", "source": "b-out"}],
                   "outputs": [{"id": "a-out", "sink": ""}]},
                  {"activity": "b", "runconfig": "rc-b",
                   "inputs": [{"id": "b-in", "source": "a-out"}],
                   "outputs": [{"id": "b-out", "sink": ""}]}
                ]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        match err {
            DagrunError::CircularDependency { nodes } => {
                assert!(nodes.contains(&"a".to_string()));
                assert!(nodes.contains(&"b".to_string()));
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_mismatch_on_connected_ports() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {
                  "id": "producer",
                  "runconfigs": [{"id": "rc-p", "executable": "p.py"}],
                  "outputs": [{"id": "out", "type": "table", "schema": {"amount": "varchar"}}]
                },
                {
                  "id": "consumer",
                  "runconfigs": [{"id": "rc-c", "executable": "c.py"}],
                  "inputs": [{"id": "in", "type": "table", "schema": {"amount": "double"}}]
                }
              ],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"activity": "producer", "runconfig": "rc-p",
                   "outputs": [{"id": "out", "sink": ""}]},
                  {"activity": "consumer", "runconfig": "rc-c",
                   "inputs": [{"id": "in", "source": "out"}]}
                ]
              }
            }
            "#,
        )
        .unwrap();

        let err = compile(&doc).unwrap_err();
        match err {
            DagrunError::SchemaMismatch {
                column,
                expected,
                found,
                ..
            } => {
                assert_eq!(column, "amount");
                assert_eq!(expected, "double");
                assert_eq!(found, "varchar");
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_producer_superset_schema_accepted() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {
                  "id": "producer",
                  "runconfigs": [{"id": "rc-p", "executable": "p.py"}],
                  "outputs": [{"id": "out", "schema": "amount:double,ts:timestamp,extra:varchar"}]
                },
                {
                  "id": "consumer",
                  "runconfigs": [{"id": "rc-c", "executable": "c.py"}],
                  "inputs": [{"id": "in", "schema": "amount:double"}]
                }
              ],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"activity": "producer", "runconfig": "rc-p",
                   "outputs": [{"id": "out", "sink": ""}]},
                  {"activity": "consumer", "runconfig": "rc-c",
                   "inputs": [{"id": "in", "source": "out"}]}
                ]
              }
            }
            "#,
        )
        .unwrap();

        assert!(compile(&doc).is_ok());
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [{"id": "a", "runconfigs": [{"id": "rc", "executable": "a.py"}]}],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"activity": "a", "runconfig": "rc"},
                  {"activity": "a", "runconfig": "rc"}
                ]
              }
            }
            "#,
        )
        .unwrap();

        assert!(matches!(
            compile(&doc).unwrap_err(),
            DagrunError::DuplicateComponent { .. }
        ));
    }

    #[test]
    fn test_same_activity_twice_with_explicit_ids() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [{"id": "a", "runconfigs": [{"id": "rc", "executable": "a.py"}]}],
              "pipeline": {
                "id": "p",
                "nodes": [
                  {"id": "a-first", "activity": "a", "runconfig": "rc"},
                  {"id": "a-second", "activity": "a", "runconfig": "rc"}
                ]
              }
            }
            "#,
        )
        .unwrap();

        let compiled = compile(&doc).unwrap();
        assert_eq!(compiled.dag.len(), 2);
        assert!(compiled.binding("a-first").is_some());
        assert!(compiled.binding("a-second").is_some());
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let doc = Document::from_json(r#"{"pipeline": {"id": "p", "nodes": []}}"#).unwrap();
        assert!(matches!(
            compile(&doc).unwrap_err(),
            DagrunError::EmptyPipeline { .. }
        ));
    }

    #[test]
    fn test_partitions_flow_into_dag() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {"id": "a", "runconfigs": [{"id": "rc", "executable": "a.py", "partitions": 4}]}
              ],
              "pipeline": {"id": "p", "nodes": [{"activity": "a", "runconfig": "rc"}]}
            }
            "#,
        )
        .unwrap();

        let compiled = compile(&doc).unwrap();
        assert_eq!(compiled.dag.node("a").unwrap().num_partitions, 4);
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let doc = Document::from_json(
            r#"
            {
              "activities": [
                {"id": "a", "runconfigs": [{"id": "rc", "executable": "a.py", "partitions": 0}]}
              ],
              "pipeline": {"id": "p", "nodes": [{"activity": "a", "runconfig": "rc"}]}
            }
            "#,
        )
        .unwrap();

        assert!(matches!(
            compile(&doc).unwrap_err(),
            DagrunError::InvalidPartitions { .. }
        ));
    }
}
