//! Rhai Script Engine Implementation
//!
//! Sandboxed engine used by the script transformer. Scripts run with hard
//! limits on operations, nesting depth and collection sizes so a bad script
//! fails the row instead of hanging a worker.

use crate::error::{Result, ResultExt};
use crate::scripting::CompiledScript;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};

/// Maximum operations a single script evaluation may perform
pub const MAX_OPERATIONS: u64 = 100_000;

/// The script engine shared by every row of a script transformer
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        // Set safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(1_000);

        // Scripts have no business printing from a worker thread.
        engine.on_print(|text| tracing::debug!("script: {}", text));
        engine.on_debug(|text, _, pos| tracing::debug!("script {:?}: {}", pos, text));

        // ===== Mathematical Functions =====

        engine.register_fn("abs", |x: f64| x.abs());
        engine.register_fn("sqrt", |x: f64| x.sqrt());
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn("exp", |x: f64| x.exp());
        engine.register_fn("ln", |x: f64| x.ln());
        engine.register_fn("log10", |x: f64| x.log10());
        engine.register_fn("clamp", |x: f64, lo: f64, hi: f64| x.clamp(lo, hi.max(lo)));

        // ===== Text Functions =====

        // split_tokens(text, delimiter) - non-empty trimmed tokens
        engine.register_fn("split_tokens", |text: &str, delimiter: &str| -> rhai::Array {
            if delimiter.is_empty() {
                return vec![Dynamic::from(text.to_string())];
            }
            text.split(delimiter)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Dynamic::from(t.to_string()))
                .collect()
        });

        // is_null(value) - true for missing cells
        engine.register_fn("is_null", |value: Dynamic| value.is_unit());

        // to_number(value) - numeric view of a cell, `()` when not a number
        engine.register_fn("to_number", |value: Dynamic| -> Dynamic {
            match crate::scripting::dynamic_to_value(value).as_f64() {
                Some(v) => Dynamic::from_float(v),
                None => Dynamic::UNIT,
            }
        });
    }

    /// Compile a script
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledScript> {
        let ast = self
            .engine
            .compile(source)
            .map_err(Box::<EvalAltResult>::from)
            .with_context(|| format!("Failed to compile script '{}'", name))?;
        Ok(CompiledScript {
            ast,
            source: source.to_string(),
            name: name.to_string(),
        })
    }

    /// Evaluate a compiled script against a prepared scope
    pub fn run(&self, script: &CompiledScript, scope: &mut Scope<'_>) -> Result<Dynamic> {
        self.engine
            .eval_ast_with_scope::<Dynamic>(scope, &script.ast)
            .context(format!("Script '{}' failed", script.name))
    }

    /// Access the underlying Rhai engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}
