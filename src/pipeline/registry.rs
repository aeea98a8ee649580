//! Component registry and serializable job configuration.
//!
//! The registry maps a component kind (e.g. `"token_splitter"`) to a
//! constructor that builds a configured [`Component`] from a JSON object.
//! Constructors deserialize into the component's typed configuration, so a
//! malformed configuration is reported with the kind it was meant for.
//!
//! [`JobConfig`] is the serialized form of a [`JobDefinition`]: components
//! refer to each other by instance name and are built through a registry.

use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Component, ComponentCategory, ComponentDescriptor};
use crate::pipeline::components::{
    EqualsFilter, FeatureTransformer, ModifierConfig, NumberRangeFilter, NumberStatisticsAnalyzer,
    RowCountAnalyzer, SampleRowsAnalyzer, ScriptConfig, ScriptTransformer, TokenSplitter,
    ValueDistributionAnalyzer,
};
use crate::pipeline::id::NodeId;
use crate::pipeline::job::{ComponentDefinition, JobDefinition};
use crate::pipeline::outcome::{Category, Outcome, Requirement};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while building components or jobs from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown component kind '{0}'")]
    UnknownKind(String),

    #[error("Component kind '{0}' is already registered")]
    DuplicateKind(String),

    #[error("Invalid configuration for '{kind}': {message}")]
    InvalidConfig { kind: String, message: String },

    #[error("Component name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("Component '{component}' requires unknown filter '{filter}'")]
    UnknownFilter { component: String, filter: String },
}

type Constructor =
    Box<dyn Fn(serde_json::Value) -> Result<Component, RegistryError> + Send + Sync>;

struct Entry {
    descriptor: ComponentDescriptor,
    constructor: Constructor,
}

/// Component kinds known to the engine.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in component.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (descriptor, constructor) in builtins() {
            // Built-in kinds are distinct.
            let _ = registry.register(descriptor, constructor);
        }
        registry
    }

    /// Register a constructor taking the raw JSON configuration.
    pub fn register(
        &mut self,
        descriptor: ComponentDescriptor,
        constructor: impl Fn(serde_json::Value) -> Result<Component, RegistryError>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&descriptor.kind) {
            return Err(RegistryError::DuplicateKind(descriptor.kind));
        }
        tracing::debug!("Registered component kind '{}'", descriptor.kind);
        self.entries.insert(
            descriptor.kind.clone(),
            Entry {
                descriptor,
                constructor: Box::new(constructor),
            },
        );
        Ok(())
    }

    /// Register a constructor taking a typed configuration.
    pub fn register_typed<C, F>(
        &mut self,
        descriptor: ComponentDescriptor,
        build: F,
    ) -> Result<(), RegistryError>
    where
        C: DeserializeOwned,
        F: Fn(C) -> Result<Component, String> + Send + Sync + 'static,
    {
        let kind = descriptor.kind.clone();
        self.register(descriptor, typed(kind, build))
    }

    /// Build a configured component. A `null` configuration is treated as
    /// an empty object.
    pub fn create(&self, kind: &str, config: serde_json::Value) -> Result<Component, RegistryError> {
        let entry = self
            .entries
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))?;
        (entry.constructor)(config)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn descriptor(&self, kind: &str) -> Option<&ComponentDescriptor> {
        self.entries.get(kind).map(|e| &e.descriptor)
    }

    /// Descriptors of every registered kind, sorted by kind.
    pub fn descriptors(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    /// Descriptors of one category.
    pub fn descriptors_in(
        &self,
        category: ComponentCategory,
    ) -> impl Iterator<Item = &ComponentDescriptor> {
        self.descriptors().filter(move |d| d.category == category)
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

fn typed<C, F>(
    kind: String,
    build: F,
) -> impl Fn(serde_json::Value) -> Result<Component, RegistryError> + Send + Sync + 'static
where
    C: DeserializeOwned,
    F: Fn(C) -> Result<Component, String> + Send + Sync + 'static,
{
    move |config| {
        let config = if config.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            config
        };
        let invalid = |message: String| RegistryError::InvalidConfig {
            kind: kind.clone(),
            message,
        };
        let config: C = serde_json::from_value(config).map_err(|e| invalid(e.to_string()))?;
        build(config).map_err(invalid)
    }
}

/// Configuration of components that take none.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoConfig {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FeaturesConfig {
    modifiers: Vec<ModifierConfig>,
}

fn descriptor(
    kind: &str,
    display_name: &str,
    category: ComponentCategory,
    concurrent: bool,
    description: &str,
) -> ComponentDescriptor {
    ComponentDescriptor {
        kind: kind.to_string(),
        display_name: display_name.to_string(),
        category,
        concurrent,
        description: description.to_string(),
    }
}

fn builtins() -> Vec<(ComponentDescriptor, Constructor)> {
    use ComponentCategory::{Analyzer, Filter, Transformer};

    fn boxed<C, F>(kind: &str, build: F) -> Constructor
    where
        C: DeserializeOwned,
        F: Fn(C) -> Result<Component, String> + Send + Sync + 'static,
    {
        Box::new(typed(kind.to_string(), build))
    }

    vec![
        (
            descriptor("equals", "Equals", Filter, true, "MATCH when the value equals one of a list"),
            boxed("equals", |f: EqualsFilter| Ok(Component::filter(f))),
        ),
        (
            descriptor(
                "number_range",
                "Number range",
                Filter,
                true,
                "BELOW, WITHIN or ABOVE an inclusive range, or NOT_A_NUMBER",
            ),
            boxed("number_range", |f: NumberRangeFilter| {
                f.check()?;
                Ok(Component::filter(f))
            }),
        ),
        (
            descriptor(
                "token_splitter",
                "Token splitter",
                Transformer,
                true,
                "One row per token of a delimited text",
            ),
            boxed("token_splitter", |t: TokenSplitter| {
                t.check()?;
                Ok(Component::transformer(t))
            }),
        ),
        (
            descriptor("script", "Script", Transformer, false, "Rows produced by a Rhai script"),
            boxed("script", |c: ScriptConfig| {
                ScriptTransformer::new(c)
                    .map(Component::transformer)
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            descriptor(
                "features",
                "Feature vector",
                Transformer,
                true,
                "Numeric features from scaled numbers and one-hot categories",
            ),
            boxed("features", |c: FeaturesConfig| {
                Ok(Component::transformer(FeatureTransformer::from_configs(c.modifiers)))
            }),
        ),
        (
            descriptor("row_count", "Row count", Analyzer, true, "Number of rows"),
            boxed("row_count", |_: NoConfig| Ok(Component::analyzer(RowCountAnalyzer))),
        ),
        (
            descriptor(
                "number_statistics",
                "Number statistics",
                Analyzer,
                true,
                "Count, sum, min, max and mean of a numeric column",
            ),
            boxed("number_statistics", |_: NoConfig| {
                Ok(Component::analyzer(NumberStatisticsAnalyzer))
            }),
        ),
        (
            descriptor(
                "value_distribution",
                "Value distribution",
                Analyzer,
                true,
                "Occurrences per distinct value, with the rows behind each",
            ),
            boxed("value_distribution", |a: ValueDistributionAnalyzer| {
                Ok(Component::analyzer(a))
            }),
        ),
        (
            descriptor("sample_rows", "Sample rows", Analyzer, false, "The first rows received"),
            boxed("sample_rows", |a: SampleRowsAnalyzer| Ok(Component::analyzer(a))),
        ),
    ]
}

// ==================== Job Configuration ====================

/// A filter outcome referenced by filter instance name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRef {
    pub filter: String,
    pub category: String,
}

/// One activation requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementConfig {
    AnyOf { any_of: Vec<OutcomeRef> },
    Outcome(OutcomeRef),
}

/// A configured component instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub requires: Vec<RequirementConfig>,
    /// Replacement output column names (transformers only).
    #[serde(default)]
    pub outputs: Option<Vec<String>>,
    #[serde(default)]
    pub fault_tolerant: bool,
    #[serde(default)]
    pub serial: bool,
}

/// Serialized job: source columns plus component instances.
///
/// ```json
/// {
///   "columns": [{ "name": "tags", "column_type": "text" }],
///   "components": [
///     { "name": "split", "kind": "token_splitter", "config": { "delimiter": ";" }, "inputs": ["tags"] },
///     { "name": "tokens", "kind": "value_distribution", "inputs": ["tags (token)"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl JobConfig {
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build every component through `registry` and resolve filter names.
    ///
    /// Column wiring, cycles and requirement categories are checked later by
    /// the plan builder.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<JobDefinition, RegistryError> {
        let mut ids: BTreeMap<&str, NodeId> = BTreeMap::new();
        for (idx, component) in self.components.iter().enumerate() {
            if ids.insert(&component.name, NodeId(idx as u32)).is_some() {
                return Err(RegistryError::DuplicateName(component.name.clone()));
            }
        }

        let mut job = JobDefinition::new(self.columns.clone());
        for config in &self.components {
            let resolve = |outcome: &OutcomeRef| {
                ids.get(outcome.filter.as_str())
                    .map(|&filter| Outcome::new(filter, Category::new(outcome.category.clone())))
                    .ok_or_else(|| RegistryError::UnknownFilter {
                        component: config.name.clone(),
                        filter: outcome.filter.clone(),
                    })
            };

            let component = registry.create(&config.kind, config.config.clone())?;
            let mut definition =
                ComponentDefinition::new(config.name.clone(), component).inputs(config.inputs.iter().cloned());
            for requirement in &config.requires {
                definition = definition.requirement(match requirement {
                    RequirementConfig::Outcome(outcome) => Requirement::Outcome(resolve(outcome)?),
                    RequirementConfig::AnyOf { any_of } => Requirement::AnyOf(
                        any_of.iter().map(resolve).collect::<Result<_, _>>()?,
                    ),
                });
            }
            if let Some(outputs) = &config.outputs {
                definition = definition.rename_outputs(outputs.iter().cloned());
            }
            if config.fault_tolerant {
                definition = definition.fault_tolerant();
            }
            if config.serial {
                definition = definition.serial();
            }
            job.add(definition);
        }

        tracing::debug!("Built job with {} components from configuration", job.len());
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_are_registered() {
        let registry = ComponentRegistry::with_builtins();
        assert_eq!(registry.descriptors().count(), 9);
        assert_eq!(registry.descriptors_in(ComponentCategory::Filter).count(), 2);
        assert!(!registry.descriptor("script").unwrap().concurrent);
    }

    #[test]
    fn test_create_with_typed_config() {
        let registry = ComponentRegistry::with_builtins();
        let component = registry
            .create("token_splitter", json!({ "delimiter": "," }))
            .unwrap();
        assert_eq!(component.kind(), "token_splitter");
        assert_eq!(component.category(), ComponentCategory::Transformer);

        let component = registry.create("row_count", serde_json::Value::Null).unwrap();
        assert_eq!(component.kind(), "row_count");
    }

    #[test]
    fn test_invalid_config_names_kind() {
        let registry = ComponentRegistry::with_builtins();
        let err = registry
            .create("number_range", json!({ "min": 5, "max": 1 }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { ref kind, .. } if kind == "number_range"));

        let err = registry.create("row_count", json!({ "bogus": 1 })).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));

        let err = registry.create("script", json!({ "script": "(", "outputs": ["x"] })).unwrap_err();
        assert!(err.to_string().contains("script"));
    }

    #[test]
    fn test_unknown_and_duplicate_kind() {
        let mut registry = ComponentRegistry::with_builtins();
        assert_eq!(
            registry.create("nope", json!({})).unwrap_err(),
            RegistryError::UnknownKind("nope".into())
        );
        let descriptor = registry.descriptor("equals").unwrap().clone();
        let err = registry
            .register_typed(descriptor, |f: EqualsFilter| Ok(Component::filter(f)))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKind("equals".into()));
    }

    #[test]
    fn test_job_config_resolves_filter_names() {
        let config: JobConfig = serde_json::from_value(json!({
            "columns": [{ "name": "name", "column_type": "text" }],
            "components": [
                { "name": "count", "kind": "row_count", "inputs": ["name"],
                  "requires": [{ "filter": "is bob", "category": "NON_MATCH" }] },
                { "name": "is bob", "kind": "equals", "config": { "values": ["bob"] }, "inputs": ["name"] },
                { "name": "any", "kind": "row_count", "inputs": ["name"], "fault_tolerant": true,
                  "requires": [{ "any_of": [
                      { "filter": "is bob", "category": "MATCH" },
                      { "filter": "is bob", "category": "NON_MATCH" }
                  ] }] }
            ]
        }))
        .unwrap();

        let job = config.build(&ComponentRegistry::with_builtins()).unwrap();
        assert_eq!(job.len(), 3);
        let count = job.component(NodeId(0)).unwrap();
        assert_eq!(
            count.requirements,
            vec![Requirement::Outcome(Outcome::new(NodeId(1), Category::NON_MATCH))]
        );
        let any = job.component(NodeId(2)).unwrap();
        assert!(any.fault_tolerant);
        assert!(matches!(&any.requirements[0], Requirement::AnyOf(o) if o.len() == 2));
    }

    #[test]
    fn test_job_config_errors() {
        let registry = ComponentRegistry::with_builtins();
        let config: JobConfig = serde_json::from_value(json!({
            "columns": [],
            "components": [
                { "name": "a", "kind": "row_count", "requires": [{ "filter": "ghost", "category": "MATCH" }] }
            ]
        }))
        .unwrap();
        assert!(matches!(
            config.build(&registry).unwrap_err(),
            RegistryError::UnknownFilter { .. }
        ));

        let config: JobConfig = serde_json::from_value(json!({
            "columns": [],
            "components": [
                { "name": "a", "kind": "row_count" },
                { "name": "a", "kind": "row_count" }
            ]
        }))
        .unwrap();
        assert_eq!(
            config.build(&registry).unwrap_err(),
            RegistryError::DuplicateName("a".into())
        );
    }
}
