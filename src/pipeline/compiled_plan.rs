use crate::pipeline::column::ColumnDescriptor;
use crate::pipeline::component::{Component, ComponentCategory};
use crate::pipeline::id::{ColumnId, NodeId};
use crate::pipeline::outcome::{Category, ResolvedRequirement};

/// A component wrapped with everything resolved at plan-build time.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub id: NodeId,
    pub name: String,
    pub component: Component,

    /// Resolved input columns, in the order the component sees them.
    pub inputs: Vec<ColumnId>,

    /// Descriptors of `inputs`.
    pub input_columns: Vec<ColumnDescriptor>,

    /// Output columns (transformers only).
    pub outputs: Vec<ColumnId>,

    /// Declared categories (filters only).
    pub categories: Vec<Category>,

    /// Immediately gated nodes per category, parallel to `categories`.
    pub branches: Vec<Vec<NodeId>>,

    /// Whether calls for different rows may overlap.
    pub concurrent: bool,

    pub fault_tolerant: bool,

    pub(crate) requirements: Vec<ResolvedRequirement>,

    /// Transformers this node transitively depends on, sorted.
    pub(crate) fan_in: Vec<NodeId>,

    /// Executed at more than one place in the schedule; results are
    /// memoized per source row.
    pub(crate) shared: bool,
}

impl PlanNode {
    pub fn category(&self) -> ComponentCategory {
        self.component.category()
    }

    /// Index of `category` in this filter's declared categories.
    pub fn category_index(&self, category: &Category) -> Option<u16> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|idx| idx as u16)
    }

    /// Nodes gated by `category` of this filter.
    pub fn dependents_of(&self, category: &Category) -> &[NodeId] {
        match self.category_index(category) {
            Some(idx) => &self.branches[idx as usize],
            None => &[],
        }
    }
}

/// One step of the per-row schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Run a filter or analyzer on the current row.
    Node(NodeId),
    /// Run a transformer and process `downstream` once per derived row.
    FanOut {
        transformer: NodeId,
        downstream: Vec<Step>,
    },
}

/// Validated, ordered execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Nodes indexed by `NodeId`.
    pub(crate) nodes: Vec<PlanNode>,

    /// Topological order.
    pub(crate) order: Vec<NodeId>,

    /// All columns: source columns first, then transformer outputs.
    pub(crate) columns: Vec<ColumnDescriptor>,

    pub(crate) source_width: usize,

    pub(crate) schedule: Vec<Step>,

    pub(crate) stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub total_nodes: usize,
    pub filters: usize,
    pub transformers: usize,
    pub analyzers: usize,

    /// Filter categories with no gated node. Rows on these branches only
    /// reach ungated components.
    pub unwired_categories: usize,

    /// Filters and transformers that nothing downstream consumes.
    pub dangling_nodes: usize,

    /// Nodes executed at several places in the schedule.
    pub shared_nodes: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl ExecutionPlan {
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id.index())
    }

    /// Look up a node by instance name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Node ids in topological order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn source_columns(&self) -> &[ColumnDescriptor] {
        &self.columns[..self.source_width]
    }

    /// Full row width.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    pub fn analyzers(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes
            .iter()
            .filter(|n| n.category() == ComponentCategory::Analyzer)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
