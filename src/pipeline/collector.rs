//! Output row collector handed to transformers.
//!
//! A transformer emits zero or more output fragments per input row. Each
//! fragment carries one value per declared output column and becomes a
//! derived row once the transformer call returns.

use crate::pipeline::component::ComponentError;
use crate::pipeline::row::Value;

/// Collects the output fragments a transformer emits for one input row.
#[derive(Debug)]
pub struct OutputRowCollector {
    width: usize,
    fragments: Vec<Vec<Value>>,
}

impl OutputRowCollector {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            fragments: Vec::new(),
        }
    }

    /// Number of declared output columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Emit one output fragment.
    ///
    /// Fewer values than declared output columns are padded with nulls. More
    /// values than declared is an error.
    pub fn put_values(&mut self, mut values: Vec<Value>) -> Result<(), ComponentError> {
        if values.len() > self.width {
            return Err(ComponentError::new(format!(
                "emitted {} values but only {} output columns are declared",
                values.len(),
                self.width
            )));
        }
        values.resize(self.width, Value::Null);
        self.fragments.push(values);
        Ok(())
    }

    /// Emit a fragment for a transformer with a single output column.
    pub fn put_value(&mut self, value: impl Into<Value>) -> Result<(), ComponentError> {
        self.put_values(vec![value.into()])
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub(crate) fn into_fragments(self) -> Vec<Vec<Value>> {
        self.fragments
    }
}
