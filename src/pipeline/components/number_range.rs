//! Number range filter.

use super::exactly_one_input;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{ComponentError, ComponentInfo, Filter};
use crate::pipeline::outcome::Category;
use crate::pipeline::row::InputRow;
use serde::{Deserialize, Serialize};

/// Places a numeric input relative to an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberRangeFilter {
    min: f64,
    max: f64,
}

impl NumberRangeFilter {
    pub const BELOW: Category = Category::from_static("BELOW");
    pub const WITHIN: Category = Category::from_static("WITHIN");
    pub const ABOVE: Category = Category::from_static("ABOVE");
    /// Nulls and values that do not parse as numbers.
    pub const NOT_A_NUMBER: Category = Category::from_static("NOT_A_NUMBER");

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Reject inverted or non-finite bounds.
    pub fn check(&self) -> Result<(), String> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err("range bounds must be finite".to_string());
        }
        if self.min > self.max {
            return Err(format!("min {} is greater than max {}", self.min, self.max));
        }
        Ok(())
    }
}

impl ComponentInfo for NumberRangeFilter {
    fn kind(&self) -> &str {
        "number_range"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        exactly_one_input(self.kind(), inputs)
    }
}

impl Filter for NumberRangeFilter {
    fn categories(&self) -> Vec<Category> {
        vec![
            Self::BELOW,
            Self::WITHIN,
            Self::ABOVE,
            Self::NOT_A_NUMBER,
        ]
    }

    fn categorize(&self, row: &InputRow<'_>) -> Result<Category, ComponentError> {
        let category = match row.get(0).as_f64() {
            Some(v) if v.is_nan() => Self::NOT_A_NUMBER,
            Some(v) if v < self.min => Self::BELOW,
            Some(v) if v > self.max => Self::ABOVE,
            Some(_) => Self::WITHIN,
            None => Self::NOT_A_NUMBER,
        };
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::components::testing::with_input;
    use crate::pipeline::row::Value;

    #[test]
    fn test_categories() {
        let filter = NumberRangeFilter::new(0.0, 10.0);
        let cases = [
            (Value::Integer(-1), NumberRangeFilter::BELOW),
            (Value::Integer(0), NumberRangeFilter::WITHIN),
            (Value::from("10"), NumberRangeFilter::WITHIN),
            (Value::Float(10.5), NumberRangeFilter::ABOVE),
            (Value::from("ten"), NumberRangeFilter::NOT_A_NUMBER),
            (Value::Null, NumberRangeFilter::NOT_A_NUMBER),
            (Value::Float(f64::NAN), NumberRangeFilter::NOT_A_NUMBER),
        ];
        for (value, expected) in cases {
            let got = with_input(1, vec![value.clone()], |row| filter.categorize(row)).unwrap();
            assert_eq!(got, expected, "value {value}");
        }
    }

    #[test]
    fn test_check_rejects_inverted_range() {
        assert!(NumberRangeFilter::new(5.0, 1.0).check().is_err());
        assert!(NumberRangeFilter::new(1.0, 1.0).check().is_ok());
    }
}
