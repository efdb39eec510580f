// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Pipeline document model
//!
//! Defines the schema for the declarative JSON pipeline document. Objects are
//! constructed once by the parser and are immutable thereafter.

mod types;

pub use types::{ColumnType, PortType, Schema};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::DagrunError;

/// An execution target (host or cluster) a run configuration binds to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

/// A queryable external dataset
///
/// Structurally close to [`Resource`] but kept distinct so ports can
/// reference data and compute targets separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Data {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub table: String,

    #[serde(default)]
    pub query: String,
}

/// An external trigger definition; referenced but not acted on by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub cron: String,
}

/// Binds an activity to a concrete executable and the resource to run it on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfiguration {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub executable: String,

    /// Resource id this configuration runs on
    #[serde(default, rename = "resource")]
    pub resource_id: String,

    /// Data-parallel fan-out for nodes using this configuration
    #[serde(default)]
    pub partitions: Option<u32>,
}

impl RunConfiguration {
    pub fn num_partitions(&self) -> u32 {
        self.partitions.unwrap_or(1)
    }
}

/// Input port of an activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InPort {
    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "type")]
    pub port_type: PortType,

    #[serde(default)]
    pub schema: Schema,
}

/// Output port of an activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutPort {
    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "type")]
    pub port_type: PortType,

    #[serde(default)]
    pub schema: Schema,
}

/// A reusable, named task capability: a task type, not a task instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "runconfigs")]
    pub run_configs: Vec<RunConfiguration>,

    #[serde(default)]
    pub inputs: Vec<InPort>,

    #[serde(default)]
    pub outputs: Vec<OutPort>,
}

impl Activity {
    pub fn run_config(&self, id: &str) -> Option<&RunConfiguration> {
        self.run_configs.iter().find(|rc| rc.id == id)
    }

    pub fn in_port(&self, id: &str) -> Option<&InPort> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn out_port(&self, id: &str) -> Option<&OutPort> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// Concrete input wiring of a component: `source` names another component's
/// output id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentInput {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub source: String,
}

/// Concrete output wiring of a component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentOutput {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub sink: String,
}

/// One instantiation of an activity inside a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Component {
    /// Explicit node id; defaults to the activity id when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub activity: String,

    #[serde(default, rename = "runconfig")]
    pub run_config_id: String,

    #[serde(default)]
    pub inputs: Vec<ComponentInput>,

    #[serde(default)]
    pub outputs: Vec<ComponentOutput>,
}

impl Component {
    /// Node identity in the compiled DAG.
    pub fn node_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.activity)
    }
}

/// The top-level declarative object compiled to a DAG
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub id: String,

    #[serde(default, rename = "schedule")]
    pub schedule_id: Option<String>,

    #[serde(default, rename = "nodes")]
    pub components: Vec<Component>,
}

impl Pipeline {
    pub fn component(&self, node_id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.node_id() == node_id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.components.iter().map(Component::node_id).collect()
    }
}

/// The whole declarative document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub resources: Vec<Resource>,

    #[serde(default)]
    pub data: Vec<Data>,

    #[serde(default)]
    pub schedules: Vec<Schedule>,

    #[serde(default)]
    pub activities: Vec<Activity>,

    #[serde(default)]
    pub pipeline: Pipeline,
}

impl Document {
    /// Load a document from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, DagrunError> {
        let content = std::fs::read_to_string(path).map_err(|e| DagrunError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self, DagrunError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Serialize the document back to JSON
    pub fn to_json(&self) -> Result<String, DagrunError> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn schedule(&self, id: &str) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_node_document() {
        let json = r#"
        {
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
          "resources": [{"id": "local", "uri": "localhost"}],
          "pipeline": {
            "id": "analytics",
            "nodes": [
              {"activity": "script-1", "runconfig": "rc-1",
               "outputs": [{"id": "out-1", "sink": "out-1"}]},
              {"activity": "script-2", "runconfig": "rc-2",
               "inputs": [{"id": "in-1", "source": "out-1"}]}
            ]
          }
        }
        "#;

        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.pipeline.id, "analytics");
        assert_eq!(doc.pipeline.components.len(), 2);
        assert_eq!(doc.pipeline.components[0].node_id(), "script-1");
        assert_eq!(
            doc.activity("script-1").unwrap().run_configs[0].executable,
            "first.py"
        );
        assert_eq!(doc.resource("local").unwrap().uri, "localhost");
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let doc = Document::from_json(r#"{"pipeline": {"id": "p"}}"#).unwrap();
        assert!(doc.resources.is_empty());
        assert!(doc.data.is_empty());
        assert!(doc.schedules.is_empty());
        assert!(doc.activities.is_empty());
        assert!(doc.pipeline.components.is_empty());
    }

    #[test]
    fn test_unknown_port_type_degrades_to_opaque() {
        let json = r#"
        {
          "activities": [{
            "id": "a",
            "inputs": [{"id": "in", "type": "tensor"}]
          }]
        }
        "#;

        let doc = Document::from_json(json).unwrap();
        let port = doc.activity("a").unwrap().in_port("in").unwrap();
        assert_eq!(port.port_type, PortType::Opaque);
    }

    #[test]
    fn test_explicit_component_id_overrides_activity_id() {
        let json = r#"
        {
          "pipeline": {
            "id": "p",
            "nodes": [
              {"id": "ingest-a", "activity": "ingest", "runconfig": "rc"},
              {"id": "ingest-b", "activity": "ingest", "runconfig": "rc"}
            ]
          }
        }
        "#;

        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.pipeline.node_ids(), vec!["ingest-a", "ingest-b"]);
    }

    #[test]
    fn test_partitions_default_to_one() {
        let rc = RunConfiguration::default();
        assert_eq!(rc.num_partitions(), 1);
    }

    #[test]
    fn test_round_trip_json() {
        let doc = Document {
            activities: vec![Activity {
                id: "a".into(),
                run_configs: vec![RunConfiguration {
                    id: "rc".into(),
                    executable: "job.sh".into(),
                    resource_id: "local".into(),
                    partitions: Some(4),
                }],
                inputs: vec![],
                outputs: vec![OutPort {
                    id: "out".into(),
                    port_type: PortType::Scalar,
                    schema: Schema::new(),
                }],
            }],
            ..Document::default()
        };

        let json = doc.to_json().unwrap();
        let parsed = Document::from_json(&json).unwrap();

        assert_eq!(parsed.activities.len(), 1);
        assert_eq!(parsed.activities[0].run_configs[0].num_partitions(), 4);
    }
}
