//! Column descriptors.
//!
//! Source columns are declared by the job definition. Transformers declare
//! their output columns once configured; the plan builder assigns every
//! column a `ColumnId` and uses the names to resolve component inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a column. The engine does no type inference; the type is
/// carried for descriptors and result presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    #[default]
    Any,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Any => "any",
        };
        write!(f, "{name}")
    }
}

/// Identity of a column: its name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default)]
    pub column_type: ColumnType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Any)
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.column_type)
    }
}
