use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Analyzer, ComponentError, ComponentInfo};
use crate::pipeline::result::AnalyzerResult;
use crate::pipeline::row::InputRow;

/// Counts the rows it receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCountAnalyzer;

impl ComponentInfo for RowCountAnalyzer {
    fn kind(&self) -> &str {
        "row_count"
    }
}

impl Analyzer for RowCountAnalyzer {
    type State = u64;

    fn create_state(&self) -> u64 {
        0
    }

    fn consume(&self, state: &mut u64, _row: &InputRow<'_>) -> Result<(), ComponentError> {
        *state += 1;
        Ok(())
    }

    fn merge(&self, into: &mut u64, other: u64) {
        *into += other;
    }

    fn result(&self, state: &u64, _inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Count { rows: *state }
    }
}
