//! Feature transformer: numeric feature vectors for machine-learning export.
//!
//! Each input column is paired with a [`FeatureModifier`] that turns its value
//! into one or more `f64` features. The transformer emits exactly one row per
//! input row holding every feature in input order.

use crate::pipeline::collector::OutputRowCollector;
use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{ComponentError, ComponentInfo, Transformer};
use crate::pipeline::row::{InputRow, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Turns one column value into a fixed number of features.
pub trait FeatureModifier: Send + Sync + fmt::Debug {
    /// Feature names for a column; their count is the feature count.
    fn feature_names(&self, column: &str) -> Vec<String>;

    /// Features for one value. Must return as many values as
    /// `feature_names` returns names.
    fn generate(&self, value: &Value) -> Vec<f64>;
}

/// Linear scaling of `[min, max]` onto `[0, 1]`, clamped. Nulls and
/// non-numbers become 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMinMax {
    pub min: f64,
    pub max: f64,
}

impl FeatureModifier for ScaledMinMax {
    fn feature_names(&self, column: &str) -> Vec<String> {
        vec![format!("{column} (scaled)")]
    }

    fn generate(&self, value: &Value) -> Vec<f64> {
        let scaled = match value.as_f64() {
            Some(v) if self.max > self.min => ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0),
            _ => 0.0,
        };
        // NaN input survives the clamp
        vec![if scaled.is_nan() { 0.0 } else { scaled }]
    }
}

/// One feature per known category: 1 for the value's category, 0 elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHot {
    pub categories: Vec<String>,
}

impl FeatureModifier for OneHot {
    fn feature_names(&self, column: &str) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{column}={c}"))
            .collect()
    }

    fn generate(&self, value: &Value) -> Vec<f64> {
        let text = (!value.is_null()).then(|| value.to_string());
        self.categories
            .iter()
            .map(|c| if text.as_deref() == Some(c) { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Serializable modifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierConfig {
    ScaledMinMax { min: f64, max: f64 },
    OneHot { categories: Vec<String> },
}

impl ModifierConfig {
    pub fn build(self) -> Box<dyn FeatureModifier> {
        match self {
            ModifierConfig::ScaledMinMax { min, max } => Box::new(ScaledMinMax { min, max }),
            ModifierConfig::OneHot { categories } => Box::new(OneHot { categories }),
        }
    }
}

/// Applies one modifier per input column.
#[derive(Debug, Default)]
pub struct FeatureTransformer {
    modifiers: Vec<Box<dyn FeatureModifier>>,
}

impl FeatureTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the modifier for the next input column.
    pub fn with(mut self, modifier: impl FeatureModifier + 'static) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }

    pub fn from_configs(configs: Vec<ModifierConfig>) -> Self {
        Self {
            modifiers: configs.into_iter().map(ModifierConfig::build).collect(),
        }
    }
}

impl ComponentInfo for FeatureTransformer {
    fn kind(&self) -> &str {
        "features"
    }

    fn validate_inputs(&self, inputs: &[ColumnDescriptor]) -> Result<(), String> {
        if inputs.len() != self.modifiers.len() {
            return Err(format!(
                "{} modifiers configured for {} input columns",
                self.modifiers.len(),
                inputs.len()
            ));
        }
        Ok(())
    }
}

impl Transformer for FeatureTransformer {
    fn output_columns(&self, inputs: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        inputs
            .iter()
            .zip(&self.modifiers)
            .flat_map(|(column, modifier)| modifier.feature_names(&column.name))
            .map(ColumnDescriptor::float)
            .collect()
    }

    fn transform(
        &self,
        row: &InputRow<'_>,
        out: &mut OutputRowCollector,
    ) -> Result<(), ComponentError> {
        let features: Vec<Value> = self
            .modifiers
            .iter()
            .enumerate()
            .flat_map(|(idx, modifier)| modifier.generate(row.get(idx)))
            .map(Value::Float)
            .collect();
        out.put_values(features)
    }
}
