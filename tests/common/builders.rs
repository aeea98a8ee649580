//! Test data builders for creating jobs and sources

use rowflow_rs::pipeline::components::{EqualsFilter, RowCountAnalyzer, TokenSplitter};
use rowflow_rs::pipeline::{
    Category, ColumnDescriptor, Component, ComponentDefinition, JobDefinition, NodeId, Value,
    VecSource,
};

/// Builder for jobs over text columns
pub struct JobBuilder {
    job: JobDefinition,
}

impl JobBuilder {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            job: JobDefinition::new(columns.iter().map(|c| ColumnDescriptor::text(*c)).collect()),
        }
    }

    pub fn add(&mut self, definition: ComponentDefinition) -> NodeId {
        self.job.add(definition)
    }

    /// `equals` filter on one column
    pub fn equals(&mut self, name: &str, column: &str, values: &[&str]) -> NodeId {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.add(ComponentDefinition::new(name, Component::filter(EqualsFilter::new(values))).input(column))
    }

    /// Token splitter on one column; its output is `"<column> (token)"`
    pub fn splitter(&mut self, name: &str, column: &str, delimiter: &str) -> NodeId {
        self.add(
            ComponentDefinition::new(name, Component::transformer(TokenSplitter::new(delimiter)))
                .input(column),
        )
    }

    /// Row counter, optionally gated on one outcome
    pub fn count(&mut self, name: &str, column: &str, gate: Option<(NodeId, Category)>) -> NodeId {
        let mut definition =
            ComponentDefinition::new(name, Component::analyzer(RowCountAnalyzer)).input(column);
        if let Some((filter, category)) = gate {
            definition = definition.requires(filter, category);
        }
        self.add(definition)
    }

    pub fn build(self) -> JobDefinition {
        self.job
    }
}

/// Single-column text source
pub fn text_source(values: &[&str]) -> VecSource {
    VecSource::single_column(values.iter().copied())
}

/// Source of `n` single-column rows `"row-1"`, `"row-2"`, ...
pub fn numbered_source(n: usize) -> VecSource {
    VecSource::new((1..=n).map(|i| vec![Value::from(format!("row-{i}"))]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let mut builder = JobBuilder::new(&["name"]);
        let filter = builder.equals("is bob", "name", &["bob"]);
        builder.count("bobs", "name", Some((filter, Category::MATCH)));
        let job = builder.build();

        assert_eq!(job.len(), 2);
        assert_eq!(job.find("bobs"), Some(NodeId(1)));
    }
}
