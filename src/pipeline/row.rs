//! Row and value types flowing through the pipeline.
//!
//! A `Row` is an immutable tuple of values indexed by `ColumnId`. Every row in
//! a run has the same width: source columns first, then one slot per
//! transformer output column. Slots of transformers that have not run for a
//! row hold `Value::Null`.
//!
//! Components never see a `Row` directly. They receive an [`InputRow`], a
//! borrowed view restricted to the columns they were wired to at plan-build
//! time, valid only for the duration of one call.

use crate::pipeline::id::{ColumnId, RowId};
use serde::{Deserialize, Serialize};
use std::fmt;

static NULL_VALUE: Value = Value::Null;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is parsed after trimming; booleans and
    /// nulls are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Null | Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Immutable row of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    values: Vec<Value>,
}

impl Row {
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Build a source row: values beyond the source columns are dropped,
    /// missing ones and all transformer output slots are null. A width
    /// mismatch is logged since it usually means a misdeclared source.
    pub(crate) fn from_source(
        id: RowId,
        mut values: Vec<Value>,
        source_width: usize,
        width: usize,
    ) -> Self {
        if values.len() != source_width {
            tracing::warn!(
                "Source row {} has {} values for {} columns, {}",
                id,
                values.len(),
                source_width,
                if values.len() > source_width {
                    "dropping the surplus"
                } else {
                    "filling with nulls"
                }
            );
        }
        values.resize(source_width, Value::Null);
        values.resize(width.max(source_width), Value::Null);
        Self { id, values }
    }

    /// Build a row derived from `self`, with `outputs` filled from `fragment`.
    ///
    /// The derived row keeps the parent's sequence id. Missing fragment values
    /// become nulls; surplus values are ignored (the collector enforces the
    /// declared width before this is called).
    pub(crate) fn derive(&self, outputs: &[ColumnId], fragment: Vec<Value>) -> Row {
        let mut values = self.values.clone();
        let mut fragment = fragment.into_iter();
        for column in outputs {
            let value = fragment.next().unwrap_or_default();
            if let Some(slot) = values.get_mut(column.index()) {
                *slot = value;
            }
        }
        Row {
            id: self.id,
            values,
        }
    }

    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a column, `Value::Null` if the column is out of range.
    #[inline]
    pub fn value(&self, column: ColumnId) -> &Value {
        self.values.get(column.index()).unwrap_or(&NULL_VALUE)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Borrowed view of a row restricted to a component's input columns.
#[derive(Clone, Copy)]
pub struct InputRow<'a> {
    row: &'a Row,
    columns: &'a [ColumnId],
}

impl<'a> InputRow<'a> {
    pub fn new(row: &'a Row, columns: &'a [ColumnId]) -> Self {
        Self { row, columns }
    }

    /// Sequence id of the underlying row.
    #[inline]
    pub fn id(&self) -> RowId {
        self.row.id()
    }

    /// Number of input columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value of the `index`-th input column (null if out of range).
    #[inline]
    pub fn get(&self, index: usize) -> &'a Value {
        match self.columns.get(index) {
            Some(column) => self.row.value(*column),
            None => &NULL_VALUE,
        }
    }

    /// Iterate over the input values in wiring order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Value> + 'a {
        let row = self.row;
        let columns = self.columns;
        columns.iter().map(move |column| row.value(*column))
    }

    /// Copy the input values out of the view.
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }
}

impl fmt::Debug for InputRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRow")
            .field("id", &self.id())
            .field("values", &self.to_vec())
            .finish()
    }
}
