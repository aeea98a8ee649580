//! Component abstraction for the pipeline.
//!
//! Two-layer design:
//! - **Capability traits**: [`Filter`], [`Transformer`] and [`Analyzer`], one
//!   per component category, implemented by built-in and user components.
//! - **`Component` enum**: the closed set {Filter, Transformer, Analyzer}
//!   chosen when the job is assembled. The publisher matches on it instead of
//!   inspecting types at runtime.
//!
//! Analyzers keep their accumulated state outside the component instance
//! (`Analyzer::State`). This lets the scheduler give every worker its own
//! partial state and merge the partials at the join point, while a single
//! component instance stays shared and immutable for the whole run.

use crate::pipeline::collector::OutputRowCollector;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::outcome::Category;
use crate::pipeline::result::AnalyzerResult;
use crate::pipeline::row::InputRow;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a component for a single row.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ComponentError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The three component categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    Filter,
    Transformer,
    Analyzer,
}

impl ComponentCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentCategory::Filter => "Filter",
            ComponentCategory::Transformer => "Transformer",
            ComponentCategory::Analyzer => "Analyzer",
        }
    }

    pub fn all() -> &'static [ComponentCategory] {
        &[
            ComponentCategory::Filter,
            ComponentCategory::Transformer,
            ComponentCategory::Analyzer,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComponentCategory::Filter => {
                "Categorizes each row into exactly one outcome.\n\
                 Downstream components can require an outcome\n\
                 to only receive the rows on that branch."
            }
            ComponentCategory::Transformer => {
                "Derives new columns from its inputs.\n\
                 May emit zero, one or many rows per input row\n\
                 through the output row collector."
            }
            ComponentCategory::Analyzer => {
                "Consumes rows and accumulates a result.\n\
                 Never emits rows. Results may offer\n\
                 drill-to-detail producers."
            }
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Static metadata describing a kind of component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Registry identifier, e.g. `token_splitter`.
    pub kind: String,
    pub display_name: String,
    pub category: ComponentCategory,
    /// Whether calls for different rows may run in parallel.
    pub concurrent: bool,
    pub description: String,
}

/// Metadata shared by every component capability.
pub trait ComponentInfo {
    /// Registry identifier of the component kind.
    fn kind(&self) -> &str;

    /// Whether this component may process several rows at once. Components
    /// that are not concurrent are invoked strictly serially.
    fn is_concurrent(&self) -> bool {
        true
    }

    /// Check the resolved input columns. Called once at plan-build time.
    fn validate_inputs(&self, _inputs: &[ColumnDescriptor]) -> Result<(), String> {
        Ok(())
    }
}

/// Categorizes each row into exactly one of its declared categories.
pub trait Filter: ComponentInfo + Send + Sync {
    /// Every category `categorize` may return. Must not be empty.
    fn categories(&self) -> Vec<Category>;

    fn categorize(&self, row: &InputRow<'_>) -> Result<Category, ComponentError>;
}

/// Derives new columns, emitting 0..N rows per input row.
pub trait Transformer: ComponentInfo + Send + Sync {
    /// Output column shape. Fixed once the transformer is configured; may
    /// depend on the number of input columns.
    fn output_columns(&self, inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor>;

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> Result<(), ComponentError>;
}

/// Consumes rows into an accumulator and produces a result.
///
/// The accumulator (`State`) lives outside the analyzer. Concurrent analyzers
/// get one state per worker, merged with [`Analyzer::merge`] at the join
/// point; `merge` must be commutative for the result to be independent of
/// row arrival order. Analyzers whose result depends on arrival order must
/// return `false` from `is_concurrent`.
pub trait Analyzer: ComponentInfo + Send + Sync + 'static {
    type State: Send + Sync + 'static;

    fn create_state(&self) -> Self::State;

    fn consume(&self, state: &mut Self::State, row: &InputRow<'_>)
        -> Result<(), ComponentError>;

    fn merge(&self, into: &mut Self::State, other: Self::State);

    fn result(&self, state: &Self::State, inputs: &[ColumnDescriptor]) -> AnalyzerResult;

    /// Selectors accepted by [`Analyzer::drill_down`].
    fn drill_down_keys(&self, _state: &Self::State) -> Vec<String> {
        Vec::new()
    }

    /// Narrower result for one selector, computed from the final state.
    fn drill_down(
        &self,
        _state: &Self::State,
        _key: &str,
        _inputs: &[ColumnDescriptor],
    ) -> Option<AnalyzerResult> {
        None
    }
}

/// Type-erased analyzer accumulator.
pub struct AnalyzerState(Box<dyn Any + Send + Sync>);

impl fmt::Debug for AnalyzerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AnalyzerState")
    }
}

fn state_mismatch(kind: &str) -> ComponentError {
    ComponentError::new(format!("accumulator of analyzer '{kind}' has an unexpected type"))
}

/// Object-safe form of [`Analyzer`], implemented for every analyzer.
pub trait DynAnalyzer: ComponentInfo + Send + Sync {
    fn create_state(&self) -> AnalyzerState;

    fn consume(&self, state: &mut AnalyzerState, row: &InputRow<'_>)
        -> Result<(), ComponentError>;

    fn merge(&self, into: &mut AnalyzerState, other: AnalyzerState) -> Result<(), ComponentError>;

    fn result(
        &self,
        state: &AnalyzerState,
        inputs: &[ColumnDescriptor],
    ) -> Result<AnalyzerResult, ComponentError>;

    fn drill_down_keys(&self, state: &AnalyzerState) -> Vec<String>;

    fn drill_down(
        &self,
        state: &AnalyzerState,
        key: &str,
        inputs: &[ColumnDescriptor],
    ) -> Option<AnalyzerResult>;
}

impl<A: Analyzer> DynAnalyzer for A {
    fn create_state(&self) -> AnalyzerState {
        AnalyzerState(Box::new(Analyzer::create_state(self)))
    }

    fn consume(
        &self,
        state: &mut AnalyzerState,
        row: &InputRow<'_>,
    ) -> Result<(), ComponentError> {
        let state = state
            .0
            .downcast_mut::<A::State>()
            .ok_or_else(|| state_mismatch(self.kind()))?;
        Analyzer::consume(self, state, row)
    }

    fn merge(&self, into: &mut AnalyzerState, other: AnalyzerState) -> Result<(), ComponentError> {
        let other = other
            .0
            .downcast::<A::State>()
            .map_err(|_| state_mismatch(self.kind()))?;
        let into = into
            .0
            .downcast_mut::<A::State>()
            .ok_or_else(|| state_mismatch(self.kind()))?;
        Analyzer::merge(self, into, *other);
        Ok(())
    }

    fn result(
        &self,
        state: &AnalyzerState,
        inputs: &[ColumnDescriptor],
    ) -> Result<AnalyzerResult, ComponentError> {
        let state = state
            .0
            .downcast_ref::<A::State>()
            .ok_or_else(|| state_mismatch(self.kind()))?;
        Ok(Analyzer::result(self, state, inputs))
    }

    fn drill_down_keys(&self, state: &AnalyzerState) -> Vec<String> {
        state
            .0
            .downcast_ref::<A::State>()
            .map(|state| Analyzer::drill_down_keys(self, state))
            .unwrap_or_default()
    }

    fn drill_down(
        &self,
        state: &AnalyzerState,
        key: &str,
        inputs: &[ColumnDescriptor],
    ) -> Option<AnalyzerResult> {
        let state = state.0.downcast_ref::<A::State>()?;
        Analyzer::drill_down(self, state, key, inputs)
    }
}

/// A configured component instance, tagged by category.
#[derive(Clone)]
pub enum Component {
    Filter(Arc<dyn Filter>),
    Transformer(Arc<dyn Transformer>),
    Analyzer(Arc<dyn DynAnalyzer>),
}

impl Component {
    pub fn filter(filter: impl Filter + 'static) -> Self {
        Component::Filter(Arc::new(filter))
    }

    pub fn transformer(transformer: impl Transformer + 'static) -> Self {
        Component::Transformer(Arc::new(transformer))
    }

    pub fn analyzer(analyzer: impl Analyzer) -> Self {
        Component::Analyzer(Arc::new(analyzer))
    }

    pub fn category(&self) -> ComponentCategory {
        match self {
            Component::Filter(_) => ComponentCategory::Filter,
            Component::Transformer(_) => ComponentCategory::Transformer,
            Component::Analyzer(_) => ComponentCategory::Analyzer,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Component::Filter(c) => c.kind(),
            Component::Transformer(c) => c.kind(),
            Component::Analyzer(c) => c.kind(),
        }
    }

    pub fn is_concurrent(&self) -> bool {
        match self {
            Component::Filter(c) => c.is_concurrent(),
            Component::Transformer(c) => c.is_concurrent(),
            Component::Analyzer(c) => c.is_concurrent(),
        }
    }

    pub fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        match self {
            Component::Filter(c) => c.validate_inputs(inputs),
            Component::Transformer(c) => c.validate_inputs(inputs),
            Component::Analyzer(c) => c.validate_inputs(inputs),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(self.category().display_name())
            .field(&self.kind())
            .finish()
    }
}
