//! Value distribution analyzer with drill-to-detail.
//!
//! Counts occurrences of each distinct value of the first input column. For
//! every value it also keeps the rows with the lowest sequence ids (up to a
//! cap), so the rows behind any count can be shown after the run. Keeping the
//! lowest ids instead of the first arrivals makes the kept rows independent of
//! how rows were spread over workers.
//!
//! Drill-down selectors are the value text, except that null rows use
//! [`NULL_KEY`] and text that would clash with it (or starts with the escape
//! character) is prefixed with `\`. See [`value_selector`].

use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Analyzer, ComponentError, ComponentInfo};
use crate::pipeline::result::{AnalyzerResult, AnnotatedRows, DetailRow, ValueDistribution};
use crate::pipeline::row::InputRow;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Drill-down selector for rows whose value is null.
pub const NULL_KEY: &str = "<null>";

const ESCAPE: char = '\\';

/// Drill-down selector of a non-null value's text.
pub fn value_selector(text: &str) -> Cow<'_, str> {
    if text == NULL_KEY || text.starts_with(ESCAPE) {
        Cow::Owned(format!("{ESCAPE}{text}"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Value text behind a non-null selector; `None` when the selector is not
/// one [`value_selector`] produces.
fn selected_value(selector: &str) -> Option<&str> {
    let text = selector.strip_prefix(ESCAPE).unwrap_or(selector);
    (value_selector(text) == selector).then_some(text)
}

fn default_max_detail_rows() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDistributionAnalyzer {
    /// Rows kept per distinct value for drill-down.
    #[serde(default = "default_max_detail_rows")]
    max_detail_rows: usize,
}

impl Default for ValueDistributionAnalyzer {
    fn default() -> Self {
        Self {
            max_detail_rows: default_max_detail_rows(),
        }
    }
}

impl ValueDistributionAnalyzer {
    pub fn new(max_detail_rows: usize) -> Self {
        Self { max_detail_rows }
    }
}

#[derive(Debug, Default)]
pub struct DistributionState {
    counts: BTreeMap<String, u64>,
    null_count: u64,
    total: u64,
    /// Kept rows per value text.
    details: BTreeMap<String, Vec<DetailRow>>,
    null_details: Vec<DetailRow>,
}

impl ValueDistributionAnalyzer {
    fn keep(&self, rows: &mut Vec<DetailRow>) {
        // Stable: derived rows of one source row keep their emission order.
        rows.sort_by_key(|r| r.row_id);
        rows.truncate(self.max_detail_rows);
    }
}

impl ComponentInfo for ValueDistributionAnalyzer {
    fn kind(&self) -> &str {
        "value_distribution"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        if inputs.is_empty() {
            return Err("value_distribution needs at least one input column".to_string());
        }
        Ok(())
    }
}

impl Analyzer for ValueDistributionAnalyzer {
    type State = DistributionState;

    fn create_state(&self) -> DistributionState {
        DistributionState::default()
    }

    fn consume(&self, state: &mut DistributionState, row: &InputRow<'_>) -> Result<(), ComponentError> {
        let value = row.get(0);
        state.total += 1;
        let rows = if value.is_null() {
            state.null_count += 1;
            &mut state.null_details
        } else {
            let key = value.to_string();
            *state.counts.entry(key.clone()).or_insert(0) += 1;
            state.details.entry(key).or_default()
        };

        if self.max_detail_rows > 0 {
            let full = rows.len() >= self.max_detail_rows;
            // Rows arrive in id order per worker; a full list only takes lower ids.
            if !full || rows.last().is_some_and(|last| row.id() < last.row_id) {
                rows.push(DetailRow {
                    row_id: row.id(),
                    values: row.to_vec(),
                });
                if full {
                    self.keep(rows);
                }
            }
        }
        Ok(())
    }

    fn merge(&self, into: &mut DistributionState, other: DistributionState) {
        for (key, count) in other.counts {
            *into.counts.entry(key).or_insert(0) += count;
        }
        into.null_count += other.null_count;
        into.total += other.total;
        for (key, rows) in other.details {
            let kept = into.details.entry(key).or_default();
            kept.extend(rows);
            self.keep(kept);
        }
        into.null_details.extend(other.null_details);
        self.keep(&mut into.null_details);
    }

    fn result(&self, state: &DistributionState, _inputs: &[ColumnDescriptor]) -> AnalyzerResult {
        AnalyzerResult::Distribution(ValueDistribution {
            counts: state.counts.clone(),
            null_count: state.null_count,
            total: state.total,
        })
    }

    fn drill_down_keys(&self, state: &DistributionState) -> Vec<String> {
        let mut keys: Vec<String> = state
            .counts
            .keys()
            .map(|k| value_selector(k).into_owned())
            .collect();
        if state.null_count > 0 {
            keys.push(NULL_KEY.to_string());
        }
        keys
    }

    fn drill_down(
        &self,
        state: &DistributionState,
        key: &str,
        inputs: &[ColumnDescriptor],
    ) -> Option<AnalyzerResult> {
        let (total, mut rows) = if key == NULL_KEY {
            (state.null_count, state.null_details.clone())
        } else {
            let text = selected_value(key)?;
            (
                *state.counts.get(text)?,
                state.details.get(text).cloned().unwrap_or_default(),
            )
        };
        if total == 0 {
            return None;
        }
        self.keep(&mut rows);
        Some(AnalyzerResult::Rows(AnnotatedRows {
            columns: inputs.to_vec(),
            rows,
            total,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::components::testing::with_input;
    use crate::pipeline::id::RowId;
    use crate::pipeline::row::Value;

    fn consume(analyzer: &ValueDistributionAnalyzer, state: &mut DistributionState, id: u64, value: Value) {
        with_input(id, vec![value], |row| analyzer.consume(state, row)).unwrap();
    }

    #[test]
    fn test_counts_and_drill_down() {
        let analyzer = ValueDistributionAnalyzer::new(2);
        let mut state = analyzer.create_state();
        for (id, v) in [(1, "a"), (2, "b"), (3, "a"), (4, "a")] {
            consume(&analyzer, &mut state, id, v.into());
        }
        consume(&analyzer, &mut state, 5, Value::Null);

        let result = analyzer.result(&state, &[]);
        let dist = result.as_distribution().unwrap();
        assert_eq!((dist.count("a"), dist.count("b"), dist.null_count, dist.total), (3, 1, 1, 5));
        assert_eq!(analyzer.drill_down_keys(&state), vec!["a", "b", NULL_KEY]);

        let inputs = [ColumnDescriptor::text("v")];
        let detail = analyzer.drill_down(&state, "a", &inputs).unwrap();
        let rows = detail.as_rows().unwrap();
        assert_eq!(rows.total, 3);
        let ids: Vec<_> = rows.rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![RowId(1), RowId(3)]);
        assert_eq!(rows.columns, inputs.to_vec());

        assert!(analyzer.drill_down(&state, "zzz", &inputs).is_none());
        assert_eq!(
            analyzer.drill_down(&state, NULL_KEY, &inputs).unwrap().as_rows().unwrap().total,
            1
        );
    }

    #[test]
    fn test_merge_keeps_lowest_ids() {
        let analyzer = ValueDistributionAnalyzer::new(2);
        let mut left = analyzer.create_state();
        let mut right = analyzer.create_state();
        consume(&analyzer, &mut left, 5, "x".into());
        consume(&analyzer, &mut left, 7, "x".into());
        consume(&analyzer, &mut right, 2, "x".into());
        consume(&analyzer, &mut right, 9, "x".into());

        analyzer.merge(&mut left, right);
        let detail = analyzer.drill_down(&left, "x", &[]).unwrap();
        let ids: Vec<_> = detail.as_rows().unwrap().rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![RowId(2), RowId(5)]);
        assert_eq!(detail.as_rows().unwrap().total, 4);
    }

    #[test]
    fn test_null_and_sentinel_text_stay_apart() {
        let analyzer = ValueDistributionAnalyzer::default();
        let mut state = analyzer.create_state();
        consume(&analyzer, &mut state, 1, Value::Null);
        consume(&analyzer, &mut state, 2, NULL_KEY.into());
        consume(&analyzer, &mut state, 3, "\\x".into());

        let result = analyzer.result(&state, &[]);
        let dist = result.as_distribution().unwrap();
        assert_eq!((dist.count(NULL_KEY), dist.null_count), (1, 1));

        let keys = analyzer.drill_down_keys(&state);
        assert_eq!(keys, vec!["\\<null>", "\\\\x", NULL_KEY]);

        let ids = |key: &str| -> Vec<RowId> {
            let detail = analyzer.drill_down(&state, key, &[]).unwrap();
            detail.as_rows().unwrap().rows.iter().map(|r| r.row_id).collect()
        };
        assert_eq!(ids(NULL_KEY), vec![RowId(1)]);
        assert_eq!(ids("\\<null>"), vec![RowId(2)]);
        assert_eq!(ids("\\\\x"), vec![RowId(3)]);
        // Unescaped text that needs escaping is not a selector.
        assert!(analyzer.drill_down(&state, "\\x", &[]).is_none());
    }

    #[test]
    fn test_value_selector() {
        assert_eq!(value_selector("abc"), "abc");
        assert_eq!(value_selector(NULL_KEY), "\\<null>");
        assert_eq!(selected_value("\\<null>"), Some(NULL_KEY));
        assert_eq!(selected_value("\\abc"), None);
    }
}
