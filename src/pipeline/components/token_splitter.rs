//! Token splitter: one derived row per token.

use super::exactly_one_input;
use crate::pipeline::collector::OutputRowCollector;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{ComponentError, ComponentInfo, Transformer};
use crate::pipeline::row::{InputRow, Value};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Splits a text column on a delimiter and emits one row per non-empty
/// token. A null input emits no rows.
///
/// The output column is named `"<input> (token)"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSplitter {
    delimiter: String,
    /// Trim whitespace around tokens.
    #[serde(default = "default_true")]
    trim: bool,
}

impl TokenSplitter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            trim: true,
        }
    }

    pub fn keep_whitespace(mut self) -> Self {
        self.trim = false;
        self
    }

    pub fn check(&self) -> Result<(), String> {
        if self.delimiter.is_empty() {
            return Err("delimiter must not be empty".to_string());
        }
        Ok(())
    }
}

impl ComponentInfo for TokenSplitter {
    fn kind(&self) -> &str {
        "token_splitter"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        exactly_one_input(self.kind(), inputs)
    }
}

impl Transformer for TokenSplitter {
    fn output_columns(&self, inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        let name = inputs.first().map(|c| c.name.as_str()).unwrap_or("value");
        vec![ColumnDescriptor::text(format!("{name} (token)"))]
    }

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> Result<(), ComponentError> {
        let text = match row.get(0) {
            Value::Null => return Ok(()),
            Value::Text(text) => text.clone(),
            other => other.to_string(),
        };
        for token in text.split(self.delimiter.as_str()) {
            let token = if self.trim { token.trim() } else { token };
            if !token.is_empty() {
                out.put_value(token)?;
            }
        }
        Ok(())
    }
}
