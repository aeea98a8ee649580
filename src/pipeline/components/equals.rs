//! Equals filter.

use super::exactly_one_input;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{ComponentError, ComponentInfo, Filter};
use crate::pipeline::outcome::Category;
use crate::pipeline::row::{InputRow, Value};
use serde::{Deserialize, Serialize};

/// `MATCH` when the input equals one of the configured values, `NON_MATCH`
/// otherwise. Nulls never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualsFilter {
    values: Vec<String>,
    #[serde(default)]
    case_insensitive: bool,
}

impl EqualsFilter {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    fn matches(&self, value: &Value) -> bool {
        if value.is_null() {
            return false;
        }
        let text = value.to_string();
        self.values.iter().any(|v| {
            if self.case_insensitive {
                v.eq_ignore_ascii_case(&text)
            } else {
                *v == text
            }
        })
    }
}

impl ComponentInfo for EqualsFilter {
    fn kind(&self) -> &str {
        "equals"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        exactly_one_input(self.kind(), inputs)
    }
}

impl Filter for EqualsFilter {
    fn categories(&self) -> Vec<Category> {
        vec![Category::MATCH, Category::NON_MATCH]
    }

    fn categorize(&self, row: &InputRow<'_>) -> Result<Category, ComponentError> {
        Ok(if self.matches(row.get(0)) {
            Category::MATCH
        } else {
            Category::NON_MATCH
        })
    }
}
