//! Row-processing pipeline.
//!
//! A job wires configured components to source columns and to each other's
//! output columns. The plan builder validates the wiring and compiles it into
//! an [`ExecutionPlan`]; the [`RowProcessingPublisher`] pushes every source row
//! through the plan and hands the analyzers' final states to a
//! [`ResultAccumulator`].
//!
//! # Architecture
//!
//! ```text
//! JobDefinition ──► ExecutionPlanBuilder ──► ExecutionPlan
//!                                                │
//! RowSource ──► RowProcessingPublisher ──► [filters → transformers → analyzers]
//!                     │ (inline or worker pool)               │
//!                     └──────────── join point ──► ResultAccumulator ──► ResultProducer
//! ```
//!
//! # Components
//!
//! - **Filters** categorize each row into exactly one declared category. The
//!   resulting outcome gates downstream components that require it.
//! - **Transformers** add output columns and may emit any number of derived
//!   rows per input row. Each derived row runs the transformer's dependents
//!   to completion before the next one starts.
//! - **Analyzers** accumulate state and produce a result after the run.
//!
//! # Design
//!
//! - **Enum dispatch on the hot path**: `Component` is a closed enum over the
//!   three capability traits.
//! - **Plan-time resolution**: column names, outcome categories and the
//!   fan-out schedule are resolved once; rows carry indices only.
//! - **Per-worker analyzer state**: concurrent analyzers accumulate without
//!   locks and merge at the join point; serial components share a gate.
//! - **Fail fast**: a row error aborts the job unless the component is fault
//!   tolerant, in which case it is recorded and the row continues without that
//!   component's effect.

pub mod collector;
pub mod column;
pub mod compiled_plan;
pub mod compiler;
pub mod component;
pub mod components;
pub mod control;
pub mod error;
pub mod executor;
pub mod id;
pub mod job;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod result;
pub mod row;
pub mod scheduler;
pub mod source;

pub use collector::OutputRowCollector;
pub use column::{ColumnDescriptor, ColumnType};
pub use compiled_plan::{ExecutionPlan, PlanNode, PlanStats};
pub use compiler::ExecutionPlanBuilder;
pub use component::{
    Analyzer, Component, ComponentCategory, ComponentDescriptor, ComponentError, ComponentInfo,
    Filter, Transformer,
};
pub use control::{CancellationToken, LogProgress, NoProgress, ProgressListener};
pub use error::{GraphValidationError, PipelineError, PipelineResult, ResultError, SourceError};
pub use executor::{run_job, RowProcessingPublisher};
pub use id::{ColumnId, NodeId, RowId};
pub use job::{ComponentDefinition, JobDefinition};
pub use outcome::{Category, Outcome, Requirement};
pub use registry::{ComponentRegistry, JobConfig, RegistryError};
pub use report::{ErrorRecord, FailureReport, JobFailure, JobResult, NodeStats, RunSummary};
pub use result::{
    AnalyzerResult, AnnotatedRows, DetailRow, NumberStatistics, ResultAccumulator, ResultProducer,
    ValueDistribution,
};
pub use row::{InputRow, Row, Value};
pub use scheduler::DispatchMode;
pub use source::{IterSource, LineSource, RowSource, VecSource};
