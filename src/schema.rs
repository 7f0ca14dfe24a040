//! Logical schema inference.
//!
//! Each column's [`StorageType`] name is matched against [`TYPE_RULES`] in order; the first rule
//! whose needle occurs in the name decides the column's [`LogicalType`], and
//! [`LogicalType::String`] is the fallback. The result is a [`SchemaMap`] in column order.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cleaning::CleanedTable;
use crate::types::{StorageType, Table};

/// Simplified column type exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Integer,
    Float,
    Datetime,
    Boolean,
    String,
}

impl LogicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the storage-name to logical-type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRule {
    /// Substring looked for in the storage type name.
    pub needle: &'static str,
    /// Tag assigned when the needle is found.
    pub tag: LogicalType,
}

impl TypeRule {
    pub fn matches(&self, storage_name: &str) -> bool {
        storage_name.contains(self.needle)
    }
}

/// Ordered mapping rules. Evaluated top to bottom; first match wins.
pub const TYPE_RULES: &[TypeRule] = &[
    TypeRule {
        needle: "int",
        tag: LogicalType::Integer,
    },
    TypeRule {
        needle: "float",
        tag: LogicalType::Float,
    },
    TypeRule {
        needle: "datetime",
        tag: LogicalType::Datetime,
    },
    TypeRule {
        needle: "bool",
        tag: LogicalType::Boolean,
    },
];

/// Map a storage type name to its logical type. Total: unmatched names are `String`.
pub fn logical_type_for(storage_name: &str) -> LogicalType {
    TYPE_RULES
        .iter()
        .find(|rule| rule.matches(storage_name))
        .map_or(LogicalType::String, |rule| rule.tag)
}

impl From<StorageType> for LogicalType {
    fn from(storage: StorageType) -> Self {
        logical_type_for(storage.name())
    }
}

/// Column name -> logical type, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMap {
    entries: IndexMap<String, LogicalType>,
}

impl SchemaMap {
    /// Logical type of `column`, if the column exists.
    pub fn get(&self, column: &str) -> Option<LogicalType> {
        self.entries.get(column).copied()
    }

    /// Iterate `(column, type)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, LogicalType)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), *tag))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive the schema map of a cleaned table.
pub fn infer_schema(table: &CleanedTable) -> SchemaMap {
    infer_schema_of(table.table())
}

pub(crate) fn infer_schema_of(table: &Table) -> SchemaMap {
    SchemaMap {
        entries: table
            .schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), LogicalType::from(f.storage)))
            .collect(),
    }
}
