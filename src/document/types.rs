// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagrun contributors

//! Port and column type model
//!
//! Unknown type strings degrade to `Opaque` rather than failing parse.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Shape of the value a port carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PortType {
    Table,
    Scalar,
    #[default]
    Opaque,
}

impl PortType {
    /// Lenient parse: unknown strings map to `Opaque`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "scalar" => Self::Scalar,
            _ => Self::Opaque,
        }
    }

    /// Opaque ports match anything; otherwise types must agree.
    pub fn compatible_with(self, other: Self) -> bool {
        self == Self::Opaque || other == Self::Opaque || self == other
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Scalar => write!(f, "scalar"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

impl Serialize for PortType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Primitive type of a schema column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Double,
    Bigint,
    Date,
    Timestamp,
    Varchar,
    #[default]
    Opaque,
}

impl ColumnType {
    /// Lenient parse: unknown strings map to `Opaque`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "double" => Self::Double,
            "bigint" => Self::Bigint,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            "varchar" => Self::Varchar,
            _ => Self::Opaque,
        }
    }

    /// Opaque columns match anything; otherwise types must agree.
    pub fn compatible_with(self, other: Self) -> bool {
        self == Self::Opaque || other == Self::Opaque || self == other
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Bigint => write!(f, "bigint"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Varchar => write!(f, "varchar"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Column schema attached to a port
///
/// Accepts either a JSON object (`{"amount": "double"}`) or the compact
/// string form (`"amount:double,ts:timestamp"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeMap<String, ColumnType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the compact `name:type,name:type` form. Malformed items are
    /// skipped with a log line, matching the lenient-parse policy.
    pub fn parse_compact(s: &str) -> Self {
        let mut columns = BTreeMap::new();
        for item in s.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once(':') {
                Some((name, ty)) if !name.trim().is_empty() => {
                    columns.insert(name.trim().to_string(), ColumnType::parse(ty.trim()));
                }
                _ => {
                    tracing::warn!("skipping malformed schema item '{item}'");
                }
            }
        }
        Self { columns }
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: ColumnType) {
        self.columns.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Iterate columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(n, t)| (n.as_str(), *t))
    }
}

impl<A: Into<String>> FromIterator<(A, ColumnType)> for Schema {
    fn from_iter<T: IntoIterator<Item = (A, ColumnType)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, ty) in &self.columns {
            map.serialize_entry(name, ty)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a column map or a compact \"name:type,...\" string")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Schema, E> {
                Ok(Schema::parse_compact(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Schema, A::Error> {
                let mut columns = BTreeMap::new();
                while let Some((name, ty)) = access.next_entry::<String, ColumnType>()? {
                    columns.insert(name, ty);
                }
                Ok(Schema { columns })
            }
        }

        deserializer.deserialize_any(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_type_lenient_parse() {
        assert_eq!(PortType::parse("TABLE"), PortType::Table);
        assert_eq!(PortType::parse("scalar"), PortType::Scalar);
        assert_eq!(PortType::parse("something-new"), PortType::Opaque);
        assert_eq!(PortType::parse(""), PortType::Opaque);
    }

    #[test]
    fn test_column_type_lenient_parse() {
        assert_eq!(ColumnType::parse("Varchar"), ColumnType::Varchar);
        assert_eq!(ColumnType::parse("BIGINT"), ColumnType::Bigint);
        assert_eq!(ColumnType::parse("decimal"), ColumnType::Opaque);
    }

    #[test]
    fn test_schema_compact_form() {
        let schema = Schema::parse_compact("amount:double,ts:timestamp,junk");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("amount"), Some(ColumnType::Double));
        assert_eq!(schema.get("ts"), Some(ColumnType::Timestamp));
    }

    #[test]
    fn test_schema_deserialize_both_forms() {
        let from_map: Schema = serde_json::from_str(r#"{"amount": "double"}"#).unwrap();
        let from_str: Schema = serde_json::from_str(r#""amount:double""#).unwrap();
        assert_eq!(from_map, from_str);
    }

    #[test]
    fn test_opaque_is_wildcard() {
        assert!(ColumnType::Opaque.compatible_with(ColumnType::Varchar));
        assert!(ColumnType::Double.compatible_with(ColumnType::Opaque));
        assert!(!ColumnType::Double.compatible_with(ColumnType::Varchar));
        assert!(PortType::Opaque.compatible_with(PortType::Table));
        assert!(!PortType::Table.compatible_with(PortType::Scalar));
    }
}
