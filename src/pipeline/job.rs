//! Job definition: the inbound contract of the plan builder.
//!
//! A job lists the source columns and the configured component instances with
//! their wiring. Inputs are referenced by column name; requirements reference
//! filters by the `NodeId` returned from [`JobDefinition::add`]. The plan
//! builder resolves both and rejects anything it cannot resolve.

use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::Component;
use crate::pipeline::id::NodeId;
use crate::pipeline::outcome::{Category, Outcome, Requirement};

/// One configured component and its wiring.
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    /// Instance name, used in logs, reports and errors.
    pub name: String,
    pub component: Component,
    /// Names of the consumed columns, in the order the component sees them.
    pub inputs: Vec<String>,
    /// Activation condition; all entries must hold.
    pub requirements: Vec<Requirement>,
    /// Replacement names for a transformer's output columns.
    pub output_names: Option<Vec<String>>,
    /// Record row errors and continue instead of aborting the job.
    pub fault_tolerant: bool,
    /// Invoke serially even if the component is concurrency-eligible.
    pub force_serial: bool,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>, component: Component) -> Self {
        Self {
            name: name.into(),
            component,
            inputs: Vec::new(),
            requirements: Vec::new(),
            output_names: None,
            fault_tolerant: false,
            force_serial: false,
        }
    }

    pub fn input(mut self, column: impl Into<String>) -> Self {
        self.inputs.push(column.into());
        self
    }

    pub fn inputs<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Only run when `filter` categorized the row as `category`.
    pub fn requires(mut self, filter: NodeId, category: impl Into<Category>) -> Self {
        self.requirements
            .push(Requirement::Outcome(Outcome::new(filter, category)));
        self
    }

    /// Only run when at least one of `outcomes` holds.
    pub fn requires_any(mut self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.requirements
            .push(Requirement::AnyOf(outcomes.into_iter().collect()));
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn rename_outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn fault_tolerant(mut self) -> Self {
        self.fault_tolerant = true;
        self
    }

    pub fn serial(mut self) -> Self {
        self.force_serial = true;
        self
    }
}

/// Source columns plus configured components, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct JobDefinition {
    source_columns: Vec<ColumnDescriptor>,
    components: Vec<ComponentDefinition>,
}

impl JobDefinition {
    pub fn new(source_columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            source_columns,
            components: Vec::new(),
        }
    }

    /// Add a component, returning the id other components use to require its
    /// outcomes.
    pub fn add(&mut self, definition: ComponentDefinition) -> NodeId {
        let id = NodeId(self.components.len() as u32);
        self.components.push(definition);
        id
    }

    pub fn source_columns(&self) -> &[ColumnDescriptor] {
        &self.source_columns
    }

    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    pub fn component(&self, id: NodeId) -> Option<&ComponentDefinition> {
        self.components.get(id.index())
    }

    /// Look up a component by instance name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.components
            .iter()
            .position(|c| c.name == name)
            .map(|idx| NodeId(idx as u32))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
