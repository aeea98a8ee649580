//! # RowFlow-RS: Row-Processing Pipeline Engine
//!
//! An execution engine for data-quality jobs. A job is a set of configured
//! components wired to the columns of a row source:
//!
//! - **Filters** categorize rows; their outcomes gate other components.
//! - **Transformers** derive new columns, emitting zero or more rows per row.
//! - **Analyzers** accumulate rows into results that can be drilled into.
//!
//! ## Architecture
//!
//! - **Pipeline**: plan building, the row publisher and result accumulation
//! - **Scripting**: sandboxed Rhai engine behind the script transformer
//! - **Config**: TOML engine settings (worker count, error limits, logging)
//! - **Communication**: crossbeam channels between the dispatcher and workers
//!
//! ## Configuration
//!
//! Engine settings are read from the platform config directory:
//!
//! - **Linux**: `~/.config/rowflow-rs/engine.toml`
//! - **macOS**: `~/Library/Application Support/rowflow-rs/engine.toml`
//! - **Windows**: `%APPDATA%\rowflow-rs\engine.toml`
//!
//! ## Example
//!
//! ```no_run
//! use rowflow_rs::config::ExecutionConfig;
//! use rowflow_rs::pipeline::{
//!     components::{EqualsFilter, RowCountAnalyzer},
//!     run_job, Category, ColumnDescriptor, Component, ComponentDefinition, JobDefinition,
//!     VecSource,
//! };
//!
//! let mut job = JobDefinition::new(vec![ColumnDescriptor::text("name")]);
//! let is_bob = job.add(
//!     ComponentDefinition::new("is bob", Component::filter(EqualsFilter::new(vec!["bob".into()])))
//!         .input("name"),
//! );
//! job.add(
//!     ComponentDefinition::new("bobs", Component::analyzer(RowCountAnalyzer))
//!         .input("name")
//!         .requires(is_bob, Category::MATCH),
//! );
//!
//! let mut source = VecSource::single_column(["ann", "bob"]);
//! let result = run_job(&job, &mut source, &ExecutionConfig::default()).unwrap();
//! assert_eq!(result.results.result("bobs").unwrap().as_count(), Some(1));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scripting;

// Re-export commonly used types
pub use config::{EngineConfig, ExecutionConfig, LogConfig};
pub use error::{Result, RowFlowError};
pub use pipeline::{
    run_job, ComponentRegistry, JobConfig, JobDefinition, JobFailure, JobResult,
    RowProcessingPublisher,
};
