//! Number statistics analyzer.

use super::exactly_one_input;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Analyzer, ComponentError, ComponentInfo};
use crate::pipeline::result::{AnalyzerResult, NumberStatistics};
use crate::pipeline::row::InputRow;

/// Count, sum, min, max and mean of a numeric column.
///
/// Text values are parsed; values that are not numbers are counted
/// separately instead of failing the row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberStatisticsAnalyzer;

#[derive(Debug, Clone, Default)]
pub struct StatisticsState {
    count: u64,
    null_count: u64,
    non_numeric_count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl StatisticsState {
    fn add(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }
}

impl ComponentInfo for NumberStatisticsAnalyzer {
    fn kind(&self) -> &str {
        "number_statistics"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        exactly_one_input(self.kind(), inputs)
    }
}

impl Analyzer for NumberStatisticsAnalyzer {
    type State = StatisticsState;

    fn create_state(&self) -> StatisticsState {
        StatisticsState::default()
    }

    fn consume(&self, state: &mut StatisticsState, row: &InputRow<'_>) -> Result<(), ComponentError> {
        let value = row.get(0);
        match value.as_f64() {
            _ if value.is_null() => state.null_count += 1,
            Some(v) if v.is_finite() => state.add(v),
            _ => state.non_numeric_count += 1,
        }
        Ok(())
    }

    fn merge(&self, into: &mut StatisticsState, other: StatisticsState) {
        into.count += other.count;
        into.null_count += other.null_count;
        into.non_numeric_count += other.non_numeric_count;
        into.sum += other.sum;
        into.min = match (into.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        into.max = match (into.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    fn result(&self, state: &StatisticsState, _inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Statistics(NumberStatistics {
            count: state.count,
            null_count: state.null_count,
            non_numeric_count: state.non_numeric_count,
            sum: state.sum,
            min: state.min,
            max: state.max,
            mean: (state.count > 0).then(|| state.sum / state.count as f64),
        })
    }
}
