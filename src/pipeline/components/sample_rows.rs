use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Analyzer, ComponentError, ComponentInfo};
use crate::pipeline::result::{AnalyzerResult, AnnotatedRows, DetailRow};
use crate::pipeline::row::InputRow;
use serde::{Deserialize, Serialize};

fn default_max_rows() -> usize {
    20
}

/// Keeps the first rows it receives, in arrival order.
///
/// The result depends on arrival order, so the analyzer is serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRowsAnalyzer {
    #[serde(default = "default_max_rows")]
    max_rows: usize,
}

impl SampleRowsAnalyzer {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

impl Default for SampleRowsAnalyzer {
    fn default() -> Self {
        Self::new(default_max_rows())
    }
}

#[derive(Debug, Default)]
pub struct SampleState {
    rows: Vec<DetailRow>,
    total: u64,
}

impl ComponentInfo for SampleRowsAnalyzer {
    fn kind(&self) -> &str {
        "sample_rows"
    }

    fn is_concurrent(&self) -> bool {
        false
    }
}

impl Analyzer for SampleRowsAnalyzer {
    type State = SampleState;

    fn create_state(&self) -> SampleState {
        SampleState::default()
    }

    fn consume(&self, state: &mut SampleState, row: &InputRow<'_>) -> Result<(), ComponentError> {
        state.total += 1;
        if state.rows.len() < self.max_rows {
            state.rows.push(DetailRow {
                row_id: row.id(),
                values: row.to_vec(),
            });
        }
        Ok(())
    }

    fn merge(&self, into: &mut SampleState, other: SampleState) {
        into.total += other.total;
        let room = self.max_rows.saturating_sub(into.rows.len());
        into.rows.extend(other.rows.into_iter().take(room));
    }

    fn result(&self, state: &SampleState, inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Rows(AnnotatedRows {
            columns: inputs.to_vec(),
            rows: state.rows.clone(),
            total: state.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::components::testing::with_input;
    use crate::pipeline::row::Value;

    #[test]
    fn test_keeps_first_rows() {
        let analyzer = SampleRowsAnalyzer::new(2);
        let mut state = analyzer.create_state();
        for id in 1..=4 {
            with_input(id, vec![Value::Integer(id as i64)], |row| analyzer.consume(&mut state, row))
                .unwrap();
        }
        let result = analyzer.result(&state, &[ColumnDescriptor::any("n")]);
        let rows = result.as_rows().unwrap();
        assert_eq!(rows.total, 4);
        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[1].values, vec![Value::Integer(2)]);
        assert!(!analyzer.is_concurrent());
    }
}
