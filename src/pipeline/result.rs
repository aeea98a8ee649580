//! Analyzer results, the result accumulator and drill-to-detail producers.
//!
//! After a run every analyzer node owns one final accumulator state. The
//! [`ResultAccumulator`] turns states into [`AnalyzerResult`]s on demand and
//! caches them, so finalizing twice never recomputes. A [`ResultProducer`]
//! shares the same state and re-derives a narrower result (e.g. the rows
//! behind one value of a distribution) whenever it is asked.

use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::compiled_plan::ExecutionPlan;
use crate::pipeline::component::{AnalyzerState, Component, DynAnalyzer};
use crate::pipeline::error::ResultError;
use crate::pipeline::id::{NodeId, RowId};
use crate::pipeline::row::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Numeric summary of a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberStatistics {
    /// Rows with a numeric value.
    pub count: u64,
    pub null_count: u64,
    /// Rows with a non-null value that is not a number.
    pub non_numeric_count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Occurrence count per distinct value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueDistribution {
    pub counts: BTreeMap<String, u64>,
    pub null_count: u64,
    pub total: u64,
}

impl ValueDistribution {
    pub fn count(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }
}

/// A row kept for presentation, identified by its source sequence id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub row_id: RowId,
    pub values: Vec<Value>,
}

/// Rows with their column headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRows {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<DetailRow>,
    /// Number of rows that matched, which may exceed the rows kept.
    pub total: u64,
}

/// Final result of one analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyzerResult {
    Count { rows: u64 },
    Statistics(NumberStatistics),
    Distribution(ValueDistribution),
    Rows(AnnotatedRows),
}

impl AnalyzerResult {
    pub fn as_count(&self) -> Option<u64> {
        match self {
            AnalyzerResult::Count { rows } => Some(*rows),
            _ => None,
        }
    }

    pub fn as_statistics(&self) -> Option<&NumberStatistics> {
        match self {
            AnalyzerResult::Statistics(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn as_distribution(&self) -> Option<&ValueDistribution> {
        match self {
            AnalyzerResult::Distribution(dist) => Some(dist),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&AnnotatedRows> {
        match self {
            AnalyzerResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

struct ResultEntry {
    node: NodeId,
    name: String,
    analyzer: Arc<dyn DynAnalyzer>,
    inputs: Arc<[ColumnDescriptor]>,
    state: Arc<AnalyzerState>,
    finalized: OnceLock<AnalyzerResult>,
}

/// Final analyzer states of a run, finalized lazily and at most once.
pub struct ResultAccumulator {
    entries: Vec<ResultEntry>,
}

impl ResultAccumulator {
    /// Pair each analyzer node of `plan` with its final state.
    pub(crate) fn new(plan: &ExecutionPlan, states: Vec<(NodeId, AnalyzerState)>) -> Self {
        let entries = states
            .into_iter()
            .filter_map(|(node, state)| {
                let plan_node = plan.node(node)?;
                let Component::Analyzer(analyzer) = &plan_node.component else {
                    return None;
                };
                Some(ResultEntry {
                    node,
                    name: plan_node.name.clone(),
                    analyzer: Arc::clone(analyzer),
                    inputs: plan_node.input_columns.clone().into(),
                    state: Arc::new(state),
                    finalized: OnceLock::new(),
                })
            })
            .collect();
        Self { entries }
    }

    fn entry(&self, node: NodeId) -> Result<&ResultEntry, ResultError> {
        self.entries
            .iter()
            .find(|e| e.node == node)
            .ok_or(ResultError::NotAnAnalyzer(node))
    }

    /// Analyzer nodes with results, in plan order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.entries.iter().map(|e| (e.node, e.name.as_str()))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final result of an analyzer node.
    ///
    /// Computed from the accumulated state on the first call and cached;
    /// later calls return the cached result without touching the state.
    pub fn finalize_result(&self, node: NodeId) -> Result<&AnalyzerResult, ResultError> {
        let entry = self.entry(node)?;
        if let Some(result) = entry.finalized.get() {
            return Ok(result);
        }
        let result = entry
            .analyzer
            .result(&entry.state, &entry.inputs)
            .map_err(|source| ResultError::Finalization {
                analyzer: entry.name.clone(),
                source,
            })?;
        Ok(entry.finalized.get_or_init(|| result))
    }

    /// Result of the analyzer with instance name `name`.
    pub fn result(&self, name: &str) -> Result<&AnalyzerResult, ResultError> {
        let node = self
            .find(name)
            .ok_or_else(|| ResultError::UnknownAnalyzer(name.to_string()))?;
        self.finalize_result(node)
    }

    /// Finalize every analyzer, keyed by instance name.
    pub fn finalize_all(&self) -> Result<BTreeMap<String, AnalyzerResult>, ResultError> {
        self.entries
            .iter()
            .map(|e| Ok((e.name.clone(), self.finalize_result(e.node)?.clone())))
            .collect()
    }

    /// Selectors accepted by [`ResultAccumulator::result_producer`].
    pub fn drill_down_keys(&self, node: NodeId) -> Result<Vec<String>, ResultError> {
        let entry = self.entry(node)?;
        Ok(entry.analyzer.drill_down_keys(&entry.state))
    }

    /// A producer for the full result (`selector == None`) or the detail
    /// behind one selector.
    pub fn result_producer(
        &self,
        node: NodeId,
        selector: Option<&str>,
    ) -> Result<ResultProducer, ResultError> {
        let entry = self.entry(node)?;
        if let Some(selector) = selector {
            if !entry
                .analyzer
                .drill_down_keys(&entry.state)
                .iter()
                .any(|k| k == selector)
            {
                return Err(ResultError::UnknownSelector {
                    analyzer: entry.name.clone(),
                    selector: selector.to_string(),
                });
            }
        }
        Ok(ResultProducer {
            name: entry.name.clone(),
            analyzer: Arc::clone(&entry.analyzer),
            inputs: Arc::clone(&entry.inputs),
            state: Arc::clone(&entry.state),
            selector: selector.map(str::to_string),
        })
    }
}

impl fmt::Debug for ResultAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.node, &e.name)))
            .finish()
    }
}

/// Recomputes a result from an analyzer's final state on demand.
///
/// Read-only and cheap to clone; independent producers may be used from
/// different threads at the same time.
#[derive(Clone)]
pub struct ResultProducer {
    name: String,
    analyzer: Arc<dyn DynAnalyzer>,
    inputs: Arc<[ColumnDescriptor]>,
    state: Arc<AnalyzerState>,
    selector: Option<String>,
}

impl ResultProducer {
    pub fn analyzer_name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    pub fn get_result(&self) -> Result<AnalyzerResult, ResultError> {
        match &self.selector {
            None => self
                .analyzer
                .result(&self.state, &self.inputs)
                .map_err(|source| ResultError::Finalization {
                    analyzer: self.name.clone(),
                    source,
                }),
            Some(selector) => self
                .analyzer
                .drill_down(&self.state, selector, &self.inputs)
                .ok_or_else(|| ResultError::UnknownSelector {
                    analyzer: self.name.clone(),
                    selector: selector.clone(),
                }),
        }
    }
}

impl fmt::Debug for ResultProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultProducer")
            .field("analyzer", &self.name)
            .field("selector", &self.selector)
            .finish()
    }
}
