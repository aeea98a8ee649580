//! Built-in components.
//!
//! Filters, transformers and analyzers shipped with the engine. Each is also
//! registered by kind in [`ComponentRegistry::with_builtins`], which builds
//! it from a JSON configuration object.
//!
//! [`ComponentRegistry::with_builtins`]: crate::pipeline::registry::ComponentRegistry::with_builtins

mod equals;
mod features;
mod number_range;
mod number_statistics;
mod row_count;
mod sample_rows;
mod script;
mod token_splitter;
mod value_distribution;

pub use equals::EqualsFilter;
pub use features::{FeatureModifier, FeatureTransformer, ModifierConfig, OneHot, ScaledMinMax};
pub use number_range::NumberRangeFilter;
pub use number_statistics::NumberStatisticsAnalyzer;
pub use row_count::RowCountAnalyzer;
pub use sample_rows::SampleRowsAnalyzer;
pub use script::{ScriptConfig, ScriptTransformer};
pub use token_splitter::TokenSplitter;
pub use value_distribution::{value_selector, ValueDistributionAnalyzer, NULL_KEY};

use crate::pipeline::column::ColumnDescriptor;

/// Input check shared by single-column components.
fn exactly_one_input(kind: &str, inputs: &[ColumnDescriptor]) -> Result<(), String> {
    match inputs.len() {
        1 => Ok(()),
        n => Err(format!("{kind} takes exactly one input column, got {n}")),
    }
}
