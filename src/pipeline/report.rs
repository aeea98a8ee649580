//! Run summaries and failure reports.

use crate::pipeline::component::ComponentCategory;
use crate::pipeline::error::PipelineError;
use crate::pipeline::id::{NodeId, RowId};
use crate::pipeline::outcome::Category;
use crate::pipeline::result::ResultAccumulator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row accounting for one node.
///
/// Every row that reaches a node's place in the schedule ends up in exactly
/// one of `processed`, `excluded` or `errored`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub node: NodeId,
    pub name: String,
    pub category: ComponentCategory,
    /// Rows the component was invoked for successfully.
    pub processed: u64,
    /// Rows skipped because an outcome requirement did not hold.
    pub excluded: u64,
    /// Rows whose invocation failed.
    pub errored: u64,
    /// Derived rows emitted (transformers only).
    pub emitted: u64,
    /// Rows per category (filters only).
    pub categories: Vec<(Category, u64)>,
}

impl NodeStats {
    pub fn category_count(&self, category: &Category) -> u64 {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// A row-level failure recorded against a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub node: NodeId,
    pub component: String,
    pub row: RowId,
    pub kind: String,
    pub message: String,
}

/// Summary of one run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Rows pulled from the source.
    pub rows_read: u64,
    /// Rows read but dropped unprocessed after an abort or cancellation.
    pub rows_skipped: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub nodes: Vec<NodeStats>,
    /// Recorded row errors, capped by the configured limit.
    pub errors: Vec<ErrorRecord>,
    /// Row errors beyond the cap; counted, not stored.
    pub errors_dropped: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn node(&self, node: NodeId) -> Option<&NodeStats> {
        self.nodes.iter().find(|s| s.node == node)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodeStats> {
        self.nodes.iter().find(|s| s.name == name)
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.len() as u64 + self.errors_dropped
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Structured description of a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Component the failure is attributed to, if any.
    pub component: Option<String>,
    /// Row being processed when the failure happened, if any.
    pub row: Option<RowId>,
    pub kind: String,
    pub message: String,
    pub summary: RunSummary,
}

impl FailureReport {
    pub(crate) fn new(error: &PipelineError, summary: RunSummary) -> Self {
        let (component, row) = match error {
            PipelineError::UnknownOutcome { component, row, .. }
            | PipelineError::RowProcessing { component, row, .. } => {
                (Some(component.clone()), Some(*row))
            }
            _ => (None, None),
        };
        Self {
            component,
            row,
            kind: error.kind().to_string(),
            message: error.to_string(),
            summary,
        }
    }
}

/// Successful outcome of a run.
#[derive(Debug)]
pub struct JobResult {
    pub results: ResultAccumulator,
    pub summary: RunSummary,
}

/// Failed run: the error, a report, and partial results when available.
///
/// Partial results are present after a row-processing abort, and after
/// cancellation or a source failure only when best-effort results were
/// requested.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct JobFailure {
    #[source]
    pub error: PipelineError,
    pub report: FailureReport,
    pub partial: Option<ResultAccumulator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::component::ComponentError;

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary {
            rows_read: 3,
            rows_skipped: 0,
            started_at: now,
            finished_at: now,
            nodes: vec![NodeStats {
                node: NodeId(0),
                name: "is bob".into(),
                category: ComponentCategory::Filter,
                processed: 3,
                excluded: 0,
                errored: 0,
                emitted: 0,
                categories: vec![(Category::MATCH, 1), (Category::NON_MATCH, 2)],
            }],
            errors: Vec::new(),
            errors_dropped: 2,
            cancelled: false,
        }
    }

    #[test]
    fn test_summary_lookup() {
        let summary = summary();
        let stats = summary.node_by_name("is bob").unwrap();
        assert_eq!(stats.category_count(&Category::NON_MATCH), 2);
        assert_eq!(stats.category_count(&Category::from_static("OTHER")), 0);
        assert_eq!(summary.total_errors(), 2);
        assert!(summary.node(NodeId(4)).is_none());
    }

    #[test]
    fn test_failure_report_attributes_row_errors() {
        let error = PipelineError::RowProcessing {
            component: "split".into(),
            node: NodeId(1),
            row: RowId(4),
            source: ComponentError::new("bad"),
        };
        let report = FailureReport::new(&error, summary());
        assert_eq!(report.component.as_deref(), Some("split"));
        assert_eq!(report.row, Some(RowId(4)));
        assert_eq!(report.kind, "row_processing");

        let report = FailureReport::new(&PipelineError::Cancelled { rows_read: 2 }, summary());
        assert_eq!(report.component, None);
        assert_eq!(report.kind, "cancelled");
    }

    #[test]
    fn test_summary_serializes() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["rows_read"], 3);
        assert_eq!(json["nodes"][0]["categories"][0][0], "MATCH");
    }
}
