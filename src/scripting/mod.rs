//! Rhai Scripting for the script transformer
//!
//! A script runs once per input row with these variables in scope:
//!
//! - `values` - Array of the input values (`()` for nulls)
//! - `out` - Array the script pushes output rows into
//!
//! Each element pushed into `out` becomes one derived row. An array element
//! fills the output columns in order; any other value fills the first output
//! column.
//!
//! ## Helper Functions
//!
//! - `split_tokens(text, delimiter)` - Non-empty trimmed tokens
//! - `is_null(value)` - True for missing cells
//! - `to_number(value)` - Numeric view of a cell, `()` if not a number
//! - `abs`, `sqrt`, `pow`, `exp`, `ln`, `log10`, `clamp`
//!
//! ## Example Scripts
//!
//! One row per token, with its length:
//! ```rhai
//! for token in split_tokens(values[0], ",") {
//!     out.push([token, token.len()]);
//! }
//! ```
//!
//! Pass numeric rows through, doubled:
//! ```rhai
//! let n = to_number(values[0]);
//! if !is_null(n) {
//!     out.push(n * 2.0);
//! }
//! ```

mod engine;

pub use engine::{ScriptEngine, MAX_OPERATIONS};

use crate::pipeline::Value;
use rhai::{Dynamic, AST};

/// A compiled script
#[derive(Clone)]
pub struct CompiledScript {
    ast: AST,
    source: String,
    name: String,
}

impl CompiledScript {
    /// Get the source code of this script
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the name of this script
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

/// Convert a cell value for use inside a script
pub fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(v) => Dynamic::from_bool(*v),
        Value::Integer(v) => Dynamic::from_int(*v),
        Value::Float(v) => Dynamic::from_float(*v),
        Value::Text(v) => Dynamic::from(v.clone()),
    }
}

/// Convert a script value back into a cell value
///
/// Values with no cell counterpart (maps, arrays, custom types) are stored as
/// their display text.
pub fn dynamic_to_value(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(v) = value.as_bool() {
        return Value::Bool(v);
    }
    if let Ok(v) = value.as_int() {
        return Value::Integer(v);
    }
    if let Ok(v) = value.as_float() {
        return Value::Float(v);
    }
    if value.is_string() {
        if let Ok(v) = value.into_string() {
            return Value::Text(v);
        }
        return Value::Null;
    }
    if let Ok(c) = value.as_char() {
        return Value::Text(c.to_string());
    }
    Value::Text(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Integer(-3),
            Value::Float(0.5),
            Value::from("text"),
        ] {
            assert_eq!(dynamic_to_value(value_to_dynamic(&value)), value);
        }
    }

    #[test]
    fn test_array_becomes_text() {
        let array: rhai::Array = vec![Dynamic::from_int(1), Dynamic::from_int(2)];
        assert!(matches!(dynamic_to_value(Dynamic::from_array(array)), Value::Text(_)));
    }
}
