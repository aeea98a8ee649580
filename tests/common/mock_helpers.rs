//! Mock construction helpers and instrumented test components

use mockall::mock;
use rowflow_rs::pipeline::{
    AnalyzerResult, AnnotatedRows, Analyzer, CancellationToken, Category, ColumnDescriptor,
    ComponentError, ComponentInfo, DetailRow, Filter, InputRow, OutputRowCollector,
    ProgressListener, RowSource, RunSummary, SourceError, Transformer, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Listener {}

    impl ProgressListener for Listener {
        fn on_progress(&self, rows_dispatched: u64);
        fn on_finished(&self, summary: &RunSummary);
    }
}

/// Emits `copies` rows per input row, `"<value>#<i>"`, and counts its calls.
pub struct Repeat {
    pub copies: usize,
    pub calls: Arc<AtomicUsize>,
}

impl Repeat {
    pub fn new(copies: usize) -> Self {
        Self {
            copies,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ComponentInfo for Repeat {
    fn kind(&self) -> &str {
        "repeat"
    }
}

impl Transformer for Repeat {
    fn output_columns(&self, inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        vec![ColumnDescriptor::text(format!("{} (copy)", inputs[0].name))]
    }

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> Result<(), ComponentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for i in 0..self.copies {
            out.put_value(format!("{}#{}", row.get(0), i))?;
        }
        Ok(())
    }
}

/// MATCH / NON_MATCH filter that fails on one value and answers an
/// undeclared category for another.
pub struct Picky {
    pub matches: &'static str,
    pub fails_on: Option<&'static str>,
    pub rogue_on: Option<&'static str>,
}

impl ComponentInfo for Picky {
    fn kind(&self) -> &str {
        "picky"
    }
}

impl Filter for Picky {
    fn categories(&self) -> Vec<Category> {
        vec![Category::MATCH, Category::NON_MATCH]
    }

    fn categorize(&self, row: &InputRow<'_>) -> Result<Category, ComponentError> {
        let value = row.get(0).to_string();
        if Some(value.as_str()) == self.fails_on {
            return Err(ComponentError::new(format!("cannot categorize {value}")));
        }
        if Some(value.as_str()) == self.rogue_on {
            return Ok(Category::from_static("MAYBE"));
        }
        Ok(if value == self.matches {
            Category::MATCH
        } else {
            Category::NON_MATCH
        })
    }
}

/// Serial analyzer recording every row it receives, in arrival order.
pub struct OrderRecorder;

impl ComponentInfo for OrderRecorder {
    fn kind(&self) -> &str {
        "order_recorder"
    }

    fn is_concurrent(&self) -> bool {
        false
    }
}

impl Analyzer for OrderRecorder {
    type State = Vec<DetailRow>;

    fn create_state(&self) -> Vec<DetailRow> {
        Vec::new()
    }

    fn consume(&self, state: &mut Vec<DetailRow>, row: &InputRow<'_>) -> Result<(), ComponentError> {
        state.push(DetailRow {
            row_id: row.id(),
            values: row.to_vec(),
        });
        Ok(())
    }

    fn merge(&self, into: &mut Vec<DetailRow>, other: Vec<DetailRow>) {
        into.extend(other);
    }

    fn result(&self, state: &Vec<DetailRow>, inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Rows(AnnotatedRows {
            columns: inputs.to_vec(),
            rows: state.clone(),
            total: state.len() as u64,
        })
    }
}

/// Pass-through transformer that tracks how many calls overlap.
pub struct OverlapTracker {
    pub concurrent: bool,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl OverlapTracker {
    pub fn new(concurrent: bool) -> Self {
        Self {
            concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ComponentInfo for OverlapTracker {
    fn kind(&self) -> &str {
        "overlap_tracker"
    }

    fn is_concurrent(&self) -> bool {
        self.concurrent
    }
}

impl Transformer for OverlapTracker {
    fn output_columns(&self, _inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        vec![ColumnDescriptor::text("tracked")]
    }

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> Result<(), ComponentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_micros(200));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out.put_value(row.get(0).clone())
    }
}

/// Analyzer that panics on one value.
pub struct Panicky {
    pub on: &'static str,
}

impl ComponentInfo for Panicky {
    fn kind(&self) -> &str {
        "panicky"
    }
}

impl Analyzer for Panicky {
    type State = ();

    fn create_state(&self) {}

    fn consume(&self, _state: &mut (), row: &InputRow<'_>) -> Result<(), ComponentError> {
        if row.get(0).as_str() == Some(self.on) {
            panic!("analyzer blew up on {}", self.on);
        }
        Ok(())
    }

    fn merge(&self, _into: &mut (), _other: ()) {}

    fn result(&self, _state: &(), _inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Count { rows: 0 }
    }
}

/// Yields `rows` single-column rows, then fails.
pub struct FailingSource {
    remaining: usize,
}

impl FailingSource {
    pub fn new(rows: usize) -> Self {
        Self { remaining: rows }
    }
}

impl RowSource for FailingSource {
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>> {
        if self.remaining == 0 {
            return Some(Err("connection reset".into()));
        }
        self.remaining -= 1;
        Some(Ok(vec![Value::from("row")]))
    }
}

/// Endless source that cancels `token` once `cancel_after` rows were pulled.
pub struct CancellingSource {
    pulled: usize,
    cancel_after: usize,
    token: CancellationToken,
}

impl CancellingSource {
    pub fn new(cancel_after: usize, token: CancellationToken) -> Self {
        Self {
            pulled: 0,
            cancel_after,
            token,
        }
    }
}

impl RowSource for CancellingSource {
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>> {
        self.pulled += 1;
        if self.pulled >= self.cancel_after {
            self.token.cancel();
        }
        Some(Ok(vec![Value::from(format!("row-{}", self.pulled))]))
    }
}
