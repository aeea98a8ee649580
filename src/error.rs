//! Error handling for RowFlow-RS
//!
//! This module defines the crate-level error type and a Result alias for use
//! outside the pipeline core (configuration, scripting, the registry and the
//! command line).

use crate::pipeline::error::{GraphValidationError, PipelineError, ResultError};
use crate::pipeline::registry::RegistryError;
use thiserror::Error;

/// Main error type for RowFlow-RS operations
#[derive(Error, Debug)]
pub enum RowFlowError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to Rhai script compilation
    #[error("Script error: {0}")]
    Script(String),

    /// Unknown component kinds or invalid component configuration
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Plan-build failures
    #[error("Invalid job: {0}")]
    GraphValidation(#[from] GraphValidationError),

    /// Job aborts
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Result retrieval failures
    #[error("Result error: {0}")]
    Result(#[from] ResultError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RowFlowError>,
    },
}

impl RowFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RowFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        RowFlowError::Script(err.to_string())
    }
}

impl From<serde_json::Error> for RowFlowError {
    fn from(err: serde_json::Error) -> Self {
        RowFlowError::Serialization(err.to_string())
    }
}

/// Result type alias for RowFlow-RS operations
pub type Result<T> = std::result::Result<T, RowFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RowFlowError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| RowFlowError::from_rhai_error(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RowFlowError::Config("worker_count must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: worker_count must be at least 1"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = RowFlowError::Script("unexpected token".to_string());
        let with_ctx = err.with_context("Failed to compile transformer 'tag'");
        assert!(with_ctx.to_string().starts_with("Failed to compile transformer 'tag'"));
    }

    #[test]
    fn test_graph_error_converts() {
        let err: RowFlowError = GraphValidationError::Cycle {
            components: vec!["a".to_string()],
        }
        .into();
        assert!(err.to_string().contains("Cyclic dependency"));
    }
}
