//! Script transformer: per-row Rhai scripts.

use crate::error::Result;
use crate::pipeline::collector::OutputRowCollector;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{ComponentError, ComponentInfo, Transformer};
use crate::pipeline::row::{InputRow, Value};
use crate::scripting::{dynamic_to_value, value_to_dynamic, CompiledScript, ScriptEngine};
use rhai::{Array, Dynamic, Scope};
use serde::{Deserialize, Serialize};

/// Configuration of a [`ScriptTransformer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Rhai source, evaluated once per input row.
    pub script: String,
    /// Output column names, in the order scripts fill them.
    pub outputs: Vec<String>,
}

/// Runs a Rhai script for every input row. See [`crate::scripting`] for the
/// script interface.
///
/// Every row gets a fresh scope, so nothing carries over between rows.
/// The component still reports itself serial, which keeps scripted rows
/// from overlapping one another.
#[derive(Debug)]
pub struct ScriptTransformer {
    engine: ScriptEngine,
    script: CompiledScript,
    outputs: Vec<ColumnDescriptor>,
}

impl ScriptTransformer {
    /// Compile `config.script`. Compilation errors surface here, before any
    /// row is processed.
    pub fn new(config: ScriptConfig) -> Result<Self> {
        let engine = ScriptEngine::new();
        let script = engine.compile("script", &config.script)?;
        Ok(Self {
            engine,
            script,
            outputs: config.outputs.into_iter().map(ColumnDescriptor::any).collect(),
        })
    }

    pub fn source(&self) -> &str {
        self.script.source()
    }

    fn fragment(&self, item: Dynamic) -> Vec<Value> {
        if item.is_array() {
            match item.into_array() {
                Ok(values) => values.into_iter().map(dynamic_to_value).collect(),
                Err(_) => Vec::new(),
            }
        } else {
            vec![dynamic_to_value(item)]
        }
    }
}

impl ComponentInfo for ScriptTransformer {
    fn kind(&self) -> &str {
        "script"
    }

    fn is_concurrent(&self) -> bool {
        false
    }
}

impl Transformer for ScriptTransformer {
    fn output_columns(&self, _inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        self.outputs.clone()
    }

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> std::result::Result<(), ComponentError> {
        let values: Array = row.iter().map(value_to_dynamic).collect();

        let mut scope = Scope::new();
        scope.push("values", values);
        scope.push("out", Array::new());

        self.engine
            .run(&self.script, &mut scope)
            .map_err(|e| ComponentError::new(e.to_string()))?;

        let emitted = scope
            .get_value::<Array>("out")
            .ok_or_else(|| ComponentError::new("script replaced `out` with a non-array"))?;
        for item in emitted {
            out.put_values(self.fragment(item))?;
        }
        Ok(())
    }
}
