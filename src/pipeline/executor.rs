//! Row processing publisher: the run loop.
//!
//! A single coordinating thread pulls rows from the source, assigns sequence
//! ids and dispatches each row, either inline or to the worker pool. For
//! every row, the compiled schedule is walked in topological order:
//! 1. Filters record exactly one outcome in the row's outcome set.
//! 2. Nodes whose requirements do not hold are skipped and counted as
//!    excluded.
//! 3. Transformers emit derived rows; each derived row runs the
//!    transformer's downstream steps to completion before the next one.
//! 4. Analyzers consume the row into their accumulator.
//!
//! After the source is exhausted (the join point) worker partials are merged
//! and the final states handed to a [`ResultAccumulator`].

use crate::config::ExecutionConfig;
use crate::pipeline::collector::OutputRowCollector;
use crate::pipeline::compiled_plan::{ExecutionPlan, PlanNode, Step};
use crate::pipeline::compiler::ExecutionPlanBuilder;
use crate::pipeline::component::{
    AnalyzerState, Component, ComponentError, DynAnalyzer, Filter, Transformer,
};
use crate::pipeline::control::{CancellationToken, NoProgress, ProgressListener};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{NodeId, RowId};
use crate::pipeline::job::JobDefinition;
use crate::pipeline::outcome::{OutcomeKey, OutcomeSet};
use crate::pipeline::report::{ErrorRecord, FailureReport, JobFailure, JobResult, NodeStats, RunSummary};
use crate::pipeline::result::ResultAccumulator;
use crate::pipeline::row::{InputRow, Row, Value};
use crate::pipeline::scheduler::{panic_message, run_pool, DispatchMode, Scheduler};
use crate::pipeline::source::RowSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Build the plan for `job` and run it over `source`.
///
/// Plan-build failures are reported before any row is read.
pub fn run_job(
    job: &JobDefinition,
    source: &mut dyn RowSource,
    config: &ExecutionConfig,
) -> Result<JobResult, JobFailure> {
    let plan = match ExecutionPlanBuilder::build(job) {
        Ok(plan) => plan,
        Err(e) => {
            let error = PipelineError::from(e);
            let now = Utc::now();
            let summary = RunSummary {
                rows_read: 0,
                rows_skipped: 0,
                started_at: now,
                finished_at: now,
                nodes: Vec::new(),
                errors: Vec::new(),
                errors_dropped: 0,
                cancelled: false,
            };
            return Err(JobFailure {
                report: FailureReport::new(&error, summary),
                error,
                partial: None,
            });
        }
    };
    RowProcessingPublisher::new(&plan)
        .with_config(config.clone())
        .run(source)
}

/// Drives rows from a source through a compiled plan.
pub struct RowProcessingPublisher<'p> {
    plan: &'p ExecutionPlan,
    config: ExecutionConfig,
    cancel: CancellationToken,
    listener: Arc<dyn ProgressListener>,
}

impl<'p> RowProcessingPublisher<'p> {
    pub fn new(plan: &'p ExecutionPlan) -> Self {
        Self {
            plan,
            config: ExecutionConfig::default(),
            cancel: CancellationToken::new(),
            listener: Arc::new(NoProgress),
        }
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Process every source row and finalize the run.
    ///
    /// Returns the result accumulator on success. On failure the error comes
    /// with a report; analyzer states accumulated so far are attached after
    /// a row-processing abort, and after cancellation or a source failure
    /// when `best_effort_results` is set.
    pub fn run(&self, source: &mut dyn RowSource) -> Result<JobResult, JobFailure> {
        let started_at = Utc::now();
        let mode = DispatchMode::from_config(&self.config);
        let state = RunState::new(self.plan, mode, &self.config, self.cancel.clone());

        tracing::info!(
            "Starting run: {} nodes, {} worker(s)",
            self.plan.nodes().len(),
            mode.workers()
        );

        let mut rows_read = 0u64;
        let mut stop: Option<PipelineError> = None;
        let mut panics = Vec::new();

        let locals = match mode {
            DispatchMode::Inline => {
                let mut local = state.worker_local();
                loop {
                    match self.pull(source, &state, &mut rows_read) {
                        Pull::Row(row) => {
                            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                                state.process_row(&mut local, row)
                            }));
                            if let Err(panic) = outcome {
                                panics.push(panic_message(panic.as_ref()));
                                break;
                            }
                        }
                        Pull::Stop(reason) => {
                            stop = reason;
                            break;
                        }
                    }
                }
                vec![local]
            }
            DispatchMode::Pool {
                workers,
                queue_capacity,
            } => {
                let output = run_pool(
                    workers,
                    queue_capacity,
                    |_| state.worker_local(),
                    |local, row| state.process_row(local, row),
                    |tx| loop {
                        match self.pull(source, &state, &mut rows_read) {
                            Pull::Row(row) => {
                                if tx.send(row).is_err() {
                                    break;
                                }
                            }
                            Pull::Stop(reason) => {
                                stop = reason;
                                break;
                            }
                        }
                    },
                );
                panics = output.panics;
                output.locals
            }
        };

        // Join point
        if stop.is_none() && self.cancel.is_cancelled() && !state.aborted() {
            stop = Some(PipelineError::Cancelled { rows_read });
        }

        let fatal = state
            .fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let error = if panics.is_empty() {
            fatal.or(stop)
        } else {
            Some(PipelineError::WorkerPanicked(panics.join("; ")))
        };

        let cancelled = matches!(error, Some(PipelineError::Cancelled { .. }));
        let summary = state.summary(rows_read, started_at, cancelled);
        self.listener.on_finished(&summary);

        let states = state
            .scheduler
            .into_final_states(self.plan, locals.into_iter().map(|l| l.partials).collect());

        let Some(error) = error else {
            tracing::info!(
                "Run completed: {} rows, {} row errors",
                summary.rows_read,
                summary.total_errors()
            );
            return Ok(JobResult {
                results: ResultAccumulator::new(self.plan, states),
                summary,
            });
        };

        let partial = match &error {
            PipelineError::RowProcessing { .. } | PipelineError::UnknownOutcome { .. } => true,
            PipelineError::Cancelled { .. } | PipelineError::SourceIteration { .. } => {
                self.config.best_effort_results
            }
            PipelineError::WorkerPanicked(_) | PipelineError::GraphValidation(_) => false,
        };

        if cancelled {
            tracing::warn!("Run cancelled after {} rows", rows_read);
        } else {
            tracing::error!("Run failed: {}", error);
        }

        Err(JobFailure {
            report: FailureReport::new(&error, summary),
            partial: partial.then(|| ResultAccumulator::new(self.plan, states)),
            error,
        })
    }

    /// Next source row, or the reason to stop dispatching.
    fn pull(&self, source: &mut dyn RowSource, state: &RunState<'_>, rows_read: &mut u64) -> Pull {
        if self.cancel.is_cancelled() {
            return Pull::Stop(Some(PipelineError::Cancelled {
                rows_read: *rows_read,
            }));
        }
        if state.aborted() {
            return Pull::Stop(None);
        }
        match source.next_row() {
            None => Pull::Stop(None),
            Some(Err(source)) => Pull::Stop(Some(PipelineError::SourceIteration {
                rows_read: *rows_read,
                source,
            })),
            Some(Ok(values)) => {
                // Ids follow read order; `RowId(0)` stands for "nothing read yet".
                let row_id = RowId(*rows_read).next();
                *rows_read = row_id.0;
                let interval = self.config.progress_interval;
                if interval > 0 && *rows_read % interval == 0 {
                    self.listener.on_progress(*rows_read);
                }
                Pull::Row(Row::from_source(
                    row_id,
                    values,
                    self.plan.source_width,
                    self.plan.width(),
                ))
            }
        }
    }
}

enum Pull {
    Row(Row),
    Stop(Option<PipelineError>),
}

#[derive(Default)]
struct NodeCounters {
    processed: AtomicU64,
    excluded: AtomicU64,
    errored: AtomicU64,
    emitted: AtomicU64,
    categories: Vec<AtomicU64>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct ErrorLog {
    records: Vec<ErrorRecord>,
    dropped: u64,
    limit: usize,
}

/// Result of a shared node, reused within one source row.
enum Memo {
    Outcome(Option<u16>),
    Fragments(Option<Rc<Vec<Vec<Value>>>>),
}

type MemoKey = (NodeId, Vec<(NodeId, usize)>);

/// Per-row bookkeeping on the processing thread.
#[derive(Default)]
struct RowFrame {
    /// Enclosing fan-outs: (transformer, derived row index).
    lineage: Vec<(NodeId, usize)>,
    memo: HashMap<MemoKey, Memo>,
}

/// State owned by one processing thread.
struct WorkerLocal {
    partials: Vec<Option<AnalyzerState>>,
}

/// State shared by all processing threads of one run.
struct RunState<'p> {
    plan: &'p ExecutionPlan,
    scheduler: Scheduler,
    counters: Vec<NodeCounters>,
    errors: Mutex<ErrorLog>,
    aborted: AtomicBool,
    fatal: Mutex<Option<PipelineError>>,
    skipped: AtomicU64,
    cancel: CancellationToken,
}

impl<'p> RunState<'p> {
    fn new(
        plan: &'p ExecutionPlan,
        mode: DispatchMode,
        config: &ExecutionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let counters = plan
            .nodes()
            .iter()
            .map(|node| NodeCounters {
                categories: node.categories.iter().map(|_| AtomicU64::new(0)).collect(),
                ..NodeCounters::default()
            })
            .collect();
        Self {
            plan,
            scheduler: Scheduler::new(plan, mode),
            counters,
            errors: Mutex::new(ErrorLog {
                records: Vec::new(),
                dropped: 0,
                limit: config.max_recorded_errors,
            }),
            aborted: AtomicBool::new(false),
            fatal: Mutex::new(None),
            skipped: AtomicU64::new(0),
            cancel,
        }
    }

    fn worker_local(&self) -> WorkerLocal {
        WorkerLocal {
            partials: self.scheduler.worker_partials(self.plan),
        }
    }

    fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn abort(&self, error: PipelineError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            tracing::error!("Aborting run: {}", error);
            *fatal = Some(error);
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn process_row(&self, local: &mut WorkerLocal, row: Row) {
        if self.aborted() || self.cancel.is_cancelled() {
            bump(&self.skipped);
            return;
        }
        tracing::trace!("Processing row {}", row.id());

        let mut outcomes = OutcomeSet::new();
        let mut frame = RowFrame::default();
        if let Err(error) =
            self.run_steps(&self.plan.schedule, &row, &mut outcomes, &mut frame, local)
        {
            self.abort(error);
        }
    }

    fn run_steps(
        &self,
        steps: &[Step],
        row: &Row,
        outcomes: &mut OutcomeSet,
        frame: &mut RowFrame,
        local: &mut WorkerLocal,
    ) -> PipelineResult<()> {
        for step in steps {
            let (id, downstream) = match step {
                Step::Node(id) => (*id, &[] as &[Step]),
                Step::FanOut {
                    transformer,
                    downstream,
                } => (*transformer, downstream.as_slice()),
            };
            let node = &self.plan.nodes[id.index()];
            match &node.component {
                Component::Filter(filter) => {
                    self.run_filter(node, filter.as_ref(), row, outcomes, frame)?
                }
                Component::Transformer(transformer) => self.run_fan_out(
                    node,
                    transformer.as_ref(),
                    downstream,
                    row,
                    outcomes,
                    frame,
                    local,
                )?,
                Component::Analyzer(analyzer) => {
                    self.run_analyzer(node, analyzer.as_ref(), row, outcomes, local)?
                }
            }
        }
        Ok(())
    }

    fn is_active(node: &PlanNode, outcomes: &OutcomeSet) -> bool {
        node.requirements.iter().all(|r| r.is_satisfied_by(outcomes))
    }

    /// Memo key of a shared node: only the fan-outs it depends on matter.
    fn memo_key(node: &PlanNode, frame: &RowFrame) -> MemoKey {
        let lineage = frame
            .lineage
            .iter()
            .filter(|(transformer, _)| node.fan_in.binary_search(transformer).is_ok())
            .copied()
            .collect();
        (node.id, lineage)
    }

    fn run_filter(
        &self,
        node: &PlanNode,
        filter: &dyn Filter,
        row: &Row,
        outcomes: &mut OutcomeSet,
        frame: &mut RowFrame,
    ) -> PipelineResult<()> {
        let key = node.shared.then(|| Self::memo_key(node, frame));
        if let Some(Memo::Outcome(category)) = key.as_ref().and_then(|k| frame.memo.get(k)) {
            if let Some(category) = category {
                outcomes.record(OutcomeKey {
                    filter: node.id,
                    category: *category,
                });
            }
            return Ok(());
        }

        let category = self.categorize(node, filter, row, outcomes)?;
        if let Some(category) = category {
            outcomes.record(OutcomeKey {
                filter: node.id,
                category,
            });
        }
        if let Some(key) = key {
            frame.memo.insert(key, Memo::Outcome(category));
        }
        Ok(())
    }

    fn categorize(
        &self,
        node: &PlanNode,
        filter: &dyn Filter,
        row: &Row,
        outcomes: &OutcomeSet,
    ) -> PipelineResult<Option<u16>> {
        let counters = &self.counters[node.id.index()];
        if !Self::is_active(node, outcomes) {
            bump(&counters.excluded);
            return Ok(None);
        }

        let input = InputRow::new(row, &node.inputs);
        let result = {
            let _gate = self.scheduler.gate(node.id);
            filter.categorize(&input)
        };

        match result {
            Ok(category) => match node.category_index(&category) {
                Some(idx) => {
                    bump(&counters.processed);
                    bump(&counters.categories[idx as usize]);
                    tracing::trace!("Row {} is {} for '{}'", row.id(), category, node.name);
                    Ok(Some(idx))
                }
                None => Err(PipelineError::UnknownOutcome {
                    component: node.name.clone(),
                    category,
                    row: row.id(),
                }),
            },
            Err(e) => {
                self.row_error(node, row.id(), e)?;
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_fan_out(
        &self,
        node: &PlanNode,
        transformer: &dyn Transformer,
        downstream: &[Step],
        row: &Row,
        outcomes: &OutcomeSet,
        frame: &mut RowFrame,
        local: &mut WorkerLocal,
    ) -> PipelineResult<()> {
        let key = node.shared.then(|| Self::memo_key(node, frame));
        let memoized = match key.as_ref().and_then(|k| frame.memo.get(k)) {
            Some(Memo::Fragments(fragments)) => Some(fragments.clone()),
            _ => None,
        };

        // Held until every derived row has run downstream.
        let _gate = self.scheduler.gate(node.id);

        let fragments = match memoized {
            Some(fragments) => fragments,
            None => {
                let fragments = self.transform(node, transformer, row, outcomes)?.map(Rc::new);
                if let Some(key) = key {
                    frame.memo.insert(key, Memo::Fragments(fragments.clone()));
                }
                fragments
            }
        };
        let Some(fragments) = fragments else {
            return Ok(());
        };

        for (idx, fragment) in fragments.iter().enumerate() {
            if self.aborted() {
                break;
            }
            let derived = row.derive(&node.outputs, fragment.clone());
            let mut derived_outcomes = outcomes.clone();
            frame.lineage.push((node.id, idx));
            let result = self.run_steps(downstream, &derived, &mut derived_outcomes, frame, local);
            frame.lineage.pop();
            result?;
        }
        Ok(())
    }

    fn transform(
        &self,
        node: &PlanNode,
        transformer: &dyn Transformer,
        row: &Row,
        outcomes: &OutcomeSet,
    ) -> PipelineResult<Option<Vec<Vec<Value>>>> {
        let counters = &self.counters[node.id.index()];
        if !Self::is_active(node, outcomes) {
            bump(&counters.excluded);
            return Ok(None);
        }

        let input = InputRow::new(row, &node.inputs);
        let mut out = OutputRowCollector::new(node.outputs.len());
        match transformer.transform(&input, &mut out) {
            Ok(()) => {
                bump(&counters.processed);
                counters
                    .emitted
                    .fetch_add(out.len() as u64, Ordering::Relaxed);
                tracing::trace!("'{}' emitted {} rows for row {}", node.name, out.len(), row.id());
                Ok(Some(out.into_fragments()))
            }
            Err(e) => {
                self.row_error(node, row.id(), e)?;
                Ok(None)
            }
        }
    }

    fn run_analyzer(
        &self,
        node: &PlanNode,
        analyzer: &dyn DynAnalyzer,
        row: &Row,
        outcomes: &OutcomeSet,
        local: &mut WorkerLocal,
    ) -> PipelineResult<()> {
        let counters = &self.counters[node.id.index()];
        if !Self::is_active(node, outcomes) {
            bump(&counters.excluded);
            return Ok(());
        }

        let input = InputRow::new(row, &node.inputs);
        let result = match local
            .partials
            .get_mut(node.id.index())
            .and_then(Option::as_mut)
        {
            Some(state) => analyzer.consume(state, &input),
            None => match self.scheduler.shared_state(node.id) {
                Some(mut state) => analyzer.consume(&mut state, &input),
                None => Err(ComponentError::new("analyzer has no accumulator")),
            },
        };

        match result {
            Ok(()) => {
                bump(&counters.processed);
                Ok(())
            }
            Err(e) => self.row_error(node, row.id(), e),
        }
    }

    /// Record a failed component call. Fatal unless the node is fault
    /// tolerant.
    fn row_error(&self, node: &PlanNode, row: RowId, error: ComponentError) -> PipelineResult<()> {
        bump(&self.counters[node.id.index()].errored);
        {
            let mut log = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
            if log.records.len() < log.limit {
                log.records.push(ErrorRecord {
                    node: node.id,
                    component: node.name.clone(),
                    row,
                    kind: "row_processing".to_string(),
                    message: error.to_string(),
                });
            } else {
                log.dropped += 1;
            }
        }

        if node.fault_tolerant {
            tracing::warn!("'{}' failed on row {}: {}", node.name, row, error);
            Ok(())
        } else {
            Err(PipelineError::RowProcessing {
                component: node.name.clone(),
                node: node.id,
                row,
                source: error,
            })
        }
    }

    fn summary(&self, rows_read: u64, started_at: DateTime<Utc>, cancelled: bool) -> RunSummary {
        let nodes = self
            .plan
            .nodes()
            .iter()
            .zip(&self.counters)
            .map(|(node, counters)| NodeStats {
                node: node.id,
                name: node.name.clone(),
                category: node.category(),
                processed: counters.processed.load(Ordering::Relaxed),
                excluded: counters.excluded.load(Ordering::Relaxed),
                errored: counters.errored.load(Ordering::Relaxed),
                emitted: counters.emitted.load(Ordering::Relaxed),
                categories: node
                    .categories
                    .iter()
                    .cloned()
                    .zip(counters.categories.iter().map(|c| c.load(Ordering::Relaxed)))
                    .collect(),
            })
            .collect();

        let log = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        RunSummary {
            rows_read,
            rows_skipped: self.skipped.load(Ordering::Relaxed),
            started_at,
            finished_at: Utc::now(),
            nodes,
            errors: log.records.clone(),
            errors_dropped: log.dropped,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::column::ColumnDescriptor;
    use crate::pipeline::component::ComponentInfo;
    use crate::pipeline::components::{
        EqualsFilter, RowCountAnalyzer, SampleRowsAnalyzer, TokenSplitter,
    };
    use crate::pipeline::control::MockProgressListener;
    use crate::pipeline::job::ComponentDefinition;
    use crate::pipeline::outcome::Category;
    use crate::pipeline::source::VecSource;

    struct Failing {
        on: &'static str,
    }

    impl ComponentInfo for Failing {
        fn kind(&self) -> &str {
            "failing"
        }
    }

    impl Transformer for Failing {
        fn output_columns(&self, _inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
            vec![ColumnDescriptor::text("echo")]
        }

        fn transform(
            &self,
            row: &InputRow<'_>,
            out: &mut OutputRowCollector,
        ) -> Result<(), ComponentError> {
            if row.get(0).as_str() == Some(self.on) {
                return Err(ComponentError::new(format!("refusing {}", self.on)));
            }
            out.put_value(row.get(0).clone())
        }
    }

    fn inline() -> ExecutionConfig {
        ExecutionConfig::inline()
    }

    #[test]
    fn test_shared_transformer_runs_once_per_row() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("a"), ColumnDescriptor::text("b")]);
        job.add(ComponentDefinition::new("split a", Component::transformer(TokenSplitter::new(";"))).input("a"));
        let split_b = job.add(
            ComponentDefinition::new("split b", Component::transformer(TokenSplitter::new(";"))).input("b"),
        );
        job.add(
            ComponentDefinition::new("pairs", Component::analyzer(RowCountAnalyzer))
                .inputs(["a (token)", "b (token)"]),
        );
        job.add(ComponentDefinition::new("b tokens", Component::analyzer(RowCountAnalyzer)).input("b (token)"));

        let mut source = VecSource::new(vec![
            vec!["x;y".into(), "1;2;3".into()],
            vec!["z".into(), "4".into()],
        ]);
        let result = run_job(&job, &mut source, &inline()).unwrap();

        // Cross product for the consumer of both, plain fan-out for the other.
        assert_eq!(result.results.result("pairs").unwrap().as_count(), Some(2 * 3 + 1));
        assert_eq!(result.results.result("b tokens").unwrap().as_count(), Some(4));
        let stats = result.summary.node(split_b).unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.emitted, 4);
    }

    #[test]
    fn test_fault_tolerant_transformer_records_and_continues() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("v")]);
        job.add(
            ComponentDefinition::new("echo", Component::transformer(Failing { on: "bad" }))
                .input("v")
                .fault_tolerant(),
        );
        job.add(ComponentDefinition::new("count", Component::analyzer(RowCountAnalyzer)).input("echo"));

        let mut source = VecSource::single_column(["ok", "bad", "ok"]);
        let result = run_job(&job, &mut source, &inline()).unwrap();

        assert_eq!(result.results.result("count").unwrap().as_count(), Some(2));
        assert_eq!(result.summary.errors.len(), 1);
        assert_eq!(result.summary.errors[0].row, RowId(2));
        assert_eq!(result.summary.errors[0].message, "refusing bad");
        let stats = result.summary.node_by_name("echo").unwrap();
        assert_eq!((stats.processed, stats.errored), (2, 1));
    }

    #[test]
    fn test_intolerant_transformer_aborts_with_partial_results() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("v")]);
        job.add(ComponentDefinition::new("echo", Component::transformer(Failing { on: "bad" })).input("v"));
        job.add(ComponentDefinition::new("count", Component::analyzer(RowCountAnalyzer)).input("echo"));

        let mut source = VecSource::single_column(["ok", "ok", "bad", "ok", "ok"]);
        let failure = run_job(&job, &mut source, &inline()).unwrap_err();

        assert!(matches!(failure.error, PipelineError::RowProcessing { row: RowId(3), .. }));
        assert_eq!(failure.report.component.as_deref(), Some("echo"));
        assert_eq!(failure.report.summary.rows_read, 3);
        let partial = failure.partial.unwrap();
        assert_eq!(partial.result("count").unwrap().as_count(), Some(2));
    }

    #[test]
    fn test_error_cap_counts_overflow() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("v")]);
        job.add(
            ComponentDefinition::new("echo", Component::transformer(Failing { on: "bad" }))
                .input("v")
                .fault_tolerant(),
        );

        let config = ExecutionConfig {
            max_recorded_errors: 2,
            ..ExecutionConfig::inline()
        };
        let mut source = VecSource::single_column(["bad"; 5]);
        let result = run_job(&job, &mut source, &config).unwrap();
        assert_eq!(result.summary.errors.len(), 2);
        assert_eq!(result.summary.errors_dropped, 3);
        assert_eq!(result.summary.total_errors(), 5);
    }

    #[test]
    fn test_progress_listener_called_at_interval() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("v")]);
        job.add(ComponentDefinition::new("count", Component::analyzer(RowCountAnalyzer)).input("v"));
        let plan = ExecutionPlanBuilder::build(&job).unwrap();

        let mut listener = MockProgressListener::new();
        listener
            .expect_on_progress()
            .withf(|rows| *rows == 2 || *rows == 4)
            .times(2)
            .return_const(());
        listener
            .expect_on_finished()
            .withf(|summary| summary.rows_read == 5)
            .times(1)
            .return_const(());

        let config = ExecutionConfig {
            progress_interval: 2,
            ..ExecutionConfig::inline()
        };
        let mut source = VecSource::single_column(["a", "b", "c", "d", "e"]);
        RowProcessingPublisher::new(&plan)
            .with_config(config)
            .with_progress(Arc::new(listener))
            .run(&mut source)
            .unwrap();
    }

    #[test]
    fn test_sample_rows_inline_keep_source_order() {
        let mut job = JobDefinition::new(vec![ColumnDescriptor::text("name")]);
        let filter = job.add(
            ComponentDefinition::new("is bob", Component::filter(EqualsFilter::new(vec!["bob".into()])))
                .input("name"),
        );
        job.add(
            ComponentDefinition::new("others", Component::analyzer(SampleRowsAnalyzer::new(2)))
                .input("name")
                .requires(filter, Category::NON_MATCH),
        );

        let mut source = VecSource::single_column(["ann", "bob", "cid", "dan"]);
        let result = run_job(&job, &mut source, &inline()).unwrap();
        let rows = result.results.result("others").unwrap().as_rows().unwrap().clone();
        let ids: Vec<_> = rows.rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![RowId(1), RowId(3)]);
        assert_eq!(rows.total, 3);
        assert_eq!(result.summary.node_by_name("others").unwrap().excluded, 1);
    }
}
