//! Pipeline-specific error types.

use crate::pipeline::component::{ComponentCategory, ComponentError};
use crate::pipeline::id::{NodeId, RowId};
use crate::pipeline::outcome::Category;
use thiserror::Error;

/// Error produced by a row source, surfaced unchanged.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Plan-build failures. Raised before any row is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphValidationError {
    #[error("Component '{component}' consumes unknown column '{column}'")]
    UnresolvedColumn { component: String, column: String },

    #[error("Cyclic dependency between components: {}", components.join(", "))]
    Cycle { components: Vec<String> },

    #[error("Column '{column}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        column: String,
        first: String,
        second: String,
    },

    #[error("Component '{component}' requires unknown outcome {filter}={category}")]
    UnknownRequirement {
        component: String,
        filter: NodeId,
        category: String,
    },

    #[error("Component '{component}' requires an outcome of '{target}', which is a {category} and not a filter")]
    RequirementOnNonFilter {
        component: String,
        target: String,
        category: ComponentCategory,
    },

    #[error("Component '{component}' is misconfigured: {message}")]
    InvalidComponent { component: String, message: String },
}

/// Errors that abort a job.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    GraphValidation(#[from] GraphValidationError),

    #[error("Filter '{component}' returned undeclared category '{category}' for row {row}")]
    UnknownOutcome {
        component: String,
        category: Category,
        row: RowId,
    },

    #[error("Component '{component}' failed on row {row}: {source}")]
    RowProcessing {
        component: String,
        node: NodeId,
        row: RowId,
        #[source]
        source: ComponentError,
    },

    #[error("Row source failed after {rows_read} rows: {source}")]
    SourceIteration {
        rows_read: u64,
        #[source]
        source: SourceError,
    },

    #[error("Job cancelled after {rows_read} rows")]
    Cancelled { rows_read: u64 },

    #[error("A worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl PipelineError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::GraphValidation(_) => "graph_validation",
            PipelineError::UnknownOutcome { .. } => "unknown_outcome",
            PipelineError::RowProcessing { .. } => "row_processing",
            PipelineError::SourceIteration { .. } => "source_iteration",
            PipelineError::Cancelled { .. } => "cancelled",
            PipelineError::WorkerPanicked(_) => "worker_panicked",
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised when reading results after a run.
#[derive(Error, Debug)]
pub enum ResultError {
    #[error("Node {0} is not an analyzer of this job")]
    NotAnAnalyzer(NodeId),

    #[error("No analyzer named '{0}'")]
    UnknownAnalyzer(String),

    #[error("Analyzer '{analyzer}' has no detail for '{selector}'")]
    UnknownSelector { analyzer: String, selector: String },

    #[error("Analyzer '{analyzer}' could not produce its result: {source}")]
    Finalization {
        analyzer: String,
        #[source]
        source: ComponentError,
    },
}
