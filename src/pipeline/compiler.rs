use super::column::ColumnDescriptor;
use super::compiled_plan::{ExecutionPlan, PlanNode, PlanStats, Step};
use super::component::{Component, ComponentCategory};
use super::error::GraphValidationError;
use super::id::{ColumnId, NodeId};
use super::job::{ComponentDefinition, JobDefinition};
use super::outcome::{Category, OutcomeKey, Requirement, ResolvedRequirement};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Who produces a column.
#[derive(Debug, Clone, Copy)]
struct Producer {
    column: ColumnId,
    /// `None` for source columns.
    node: Option<usize>,
}

/// Compiles a job definition into a validated execution plan.
pub struct ExecutionPlanBuilder;

impl ExecutionPlanBuilder {
    /// Validate the job and compile it into an [`ExecutionPlan`].
    ///
    /// Nodes are ordered with Kahn's algorithm over two kinds of edges:
    /// column producer → consumer, and filter → gated node. Among ready nodes
    /// the one declared first wins, so the order is deterministic.
    ///
    /// Fails when a consumed column cannot be resolved, when a column has two
    /// producers, when a requirement names an unknown filter or category, or
    /// when the dependency graph has a cycle. Unwired filter categories are
    /// logged, not rejected.
    pub fn build(job: &JobDefinition) -> Result<ExecutionPlan, GraphValidationError> {
        let start_time = std::time::Instant::now();
        let defs = job.components();
        let n = defs.len();

        let categories = Self::collect_categories(defs)?;
        let requirements = Self::resolve_requirements(defs, &categories)?;
        let gating: Vec<Vec<usize>> = requirements
            .iter()
            .map(|reqs| Self::gating_filters(reqs))
            .collect();

        // Source columns
        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut producers: HashMap<String, Producer> = HashMap::new();
        for column in job.source_columns() {
            if producers.contains_key(&column.name) {
                return Err(GraphValidationError::DuplicateProducer {
                    column: column.name.clone(),
                    first: "source".to_string(),
                    second: "source".to_string(),
                });
            }
            let id = ColumnId(columns.len() as u32);
            producers.insert(column.name.clone(), Producer { column: id, node: None });
            columns.push(column.clone());
        }
        let source_width = columns.len();

        // Kahn's algorithm: a node is ready once every consumed column is
        // known and every gating filter has been placed.
        let mut placed = vec![false; n];
        let mut order: Vec<usize> = Vec::with_capacity(n);
        let mut inputs: Vec<Vec<ColumnId>> = vec![Vec::new(); n];
        let mut input_columns: Vec<Vec<ColumnDescriptor>> = vec![Vec::new(); n];
        let mut outputs: Vec<Vec<ColumnId>> = vec![Vec::new(); n];
        let mut upstream: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];

        loop {
            let next = (0..n).find(|&i| {
                !placed[i]
                    && defs[i].inputs.iter().all(|name| producers.contains_key(name))
                    && gating[i].iter().all(|&f| placed[f])
            });
            let Some(idx) = next else { break };
            let def = &defs[idx];

            for name in &def.inputs {
                let producer = producers[name];
                inputs[idx].push(producer.column);
                input_columns[idx].push(columns[producer.column.index()].clone());
                if let Some(node) = producer.node {
                    upstream[idx].insert(node);
                }
            }
            upstream[idx].extend(gating[idx].iter().copied());

            def.component
                .validate_inputs(&input_columns[idx])
                .map_err(|message| GraphValidationError::InvalidComponent {
                    component: def.name.clone(),
                    message,
                })?;

            for column in Self::output_columns(def, &input_columns[idx])? {
                if let Some(existing) = producers.get(&column.name) {
                    return Err(GraphValidationError::DuplicateProducer {
                        column: column.name,
                        first: Self::producer_name(defs, existing.node),
                        second: def.name.clone(),
                    });
                }
                let id = ColumnId(columns.len() as u32);
                producers.insert(
                    column.name.clone(),
                    Producer {
                        column: id,
                        node: Some(idx),
                    },
                );
                outputs[idx].push(id);
                columns.push(column);
            }

            placed[idx] = true;
            order.push(idx);
        }

        if order.len() < n {
            let remaining: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
            return Err(Self::classify_unplaced(
                defs,
                &remaining,
                &producers,
                &columns,
                &gating,
            ));
        }

        let ancestors = Self::ancestors(&order, &upstream);
        let fan_in: Vec<Vec<usize>> = ancestors
            .iter()
            .map(|set| {
                set.iter()
                    .copied()
                    .filter(|&a| defs[a].component.category() == ComponentCategory::Transformer)
                    .collect()
            })
            .collect();

        let schedule = Self::schedule(defs, &order, &ancestors);
        let mut occurrences = vec![0usize; n];
        Self::count_occurrences(&schedule, &mut occurrences);

        let branches = Self::branches(&categories, &requirements);

        let mut nodes = Vec::with_capacity(n);
        for (idx, def) in defs.iter().enumerate() {
            nodes.push(PlanNode {
                id: NodeId(idx as u32),
                name: def.name.clone(),
                component: def.component.clone(),
                inputs: std::mem::take(&mut inputs[idx]),
                input_columns: std::mem::take(&mut input_columns[idx]),
                outputs: std::mem::take(&mut outputs[idx]),
                categories: categories[idx].clone(),
                branches: branches[idx].clone(),
                concurrent: def.component.is_concurrent() && !def.force_serial,
                fault_tolerant: def.fault_tolerant,
                requirements: requirements[idx].clone(),
                fan_in: fan_in[idx].iter().map(|&t| NodeId(t as u32)).collect(),
                shared: occurrences[idx] > 1,
            });
        }

        let stats = Self::stats(&nodes, &upstream, start_time);

        for node in &nodes {
            for (category, gated) in node.categories.iter().zip(&node.branches) {
                if gated.is_empty() {
                    tracing::warn!(
                        "Category {} of filter '{}' is not wired to any component",
                        category,
                        node.name
                    );
                }
            }
        }

        tracing::info!(
            "Compiled execution plan: {} nodes ({} filters, {} transformers, {} analyzers), {} columns, {} shared, in {}us",
            stats.total_nodes,
            stats.filters,
            stats.transformers,
            stats.analyzers,
            columns.len(),
            stats.shared_nodes,
            stats.compile_time_us
        );

        Ok(ExecutionPlan {
            nodes,
            order: order.iter().map(|&i| NodeId(i as u32)).collect(),
            columns,
            source_width,
            schedule,
            stats,
        })
    }

    /// Declared categories per node; empty for non-filters.
    fn collect_categories(
        defs: &[ComponentDefinition],
    ) -> Result<Vec<Vec<Category>>, GraphValidationError> {
        defs.iter()
            .map(|def| match &def.component {
                Component::Filter(filter) => {
                    let categories = filter.categories();
                    if categories.is_empty() {
                        return Err(GraphValidationError::InvalidComponent {
                            component: def.name.clone(),
                            message: "filter declares no categories".to_string(),
                        });
                    }
                    let unique: HashSet<&Category> = categories.iter().collect();
                    if unique.len() != categories.len() {
                        return Err(GraphValidationError::InvalidComponent {
                            component: def.name.clone(),
                            message: "filter declares a category twice".to_string(),
                        });
                    }
                    if categories.len() > u16::MAX as usize {
                        return Err(GraphValidationError::InvalidComponent {
                            component: def.name.clone(),
                            message: "filter declares too many categories".to_string(),
                        });
                    }
                    Ok(categories)
                }
                _ => Ok(Vec::new()),
            })
            .collect()
    }

    fn resolve_requirements(
        defs: &[ComponentDefinition],
        categories: &[Vec<Category>],
    ) -> Result<Vec<Vec<ResolvedRequirement>>, GraphValidationError> {
        defs.iter()
            .map(|def| {
                def.requirements
                    .iter()
                    .map(|requirement| {
                        let keys = requirement
                            .outcomes()
                            .iter()
                            .map(|outcome| {
                                let target = defs.get(outcome.filter.index()).ok_or_else(|| {
                                    GraphValidationError::UnknownRequirement {
                                        component: def.name.clone(),
                                        filter: outcome.filter,
                                        category: outcome.category.to_string(),
                                    }
                                })?;
                                if target.component.category() != ComponentCategory::Filter {
                                    return Err(GraphValidationError::RequirementOnNonFilter {
                                        component: def.name.clone(),
                                        target: target.name.clone(),
                                        category: target.component.category(),
                                    });
                                }
                                let category = categories[outcome.filter.index()]
                                    .iter()
                                    .position(|c| *c == outcome.category)
                                    .ok_or_else(|| GraphValidationError::UnknownRequirement {
                                        component: def.name.clone(),
                                        filter: outcome.filter,
                                        category: outcome.category.to_string(),
                                    })?;
                                Ok(OutcomeKey {
                                    filter: outcome.filter,
                                    category: category as u16,
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?;

                        match (requirement, keys.as_slice()) {
                            (Requirement::Outcome(_), [key]) => Ok(ResolvedRequirement::One(*key)),
                            (Requirement::AnyOf(_), [_, ..]) => Ok(ResolvedRequirement::AnyOf(keys)),
                            _ => Err(GraphValidationError::InvalidComponent {
                                component: def.name.clone(),
                                message: "empty outcome requirement".to_string(),
                            }),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn gating_filters(requirements: &[ResolvedRequirement]) -> Vec<usize> {
        let mut filters = BTreeSet::new();
        for requirement in requirements {
            match requirement {
                ResolvedRequirement::One(key) => {
                    filters.insert(key.filter.index());
                }
                ResolvedRequirement::AnyOf(keys) => {
                    filters.extend(keys.iter().map(|k| k.filter.index()));
                }
            }
        }
        filters.into_iter().collect()
    }

    /// Output columns of a transformer, with job-level renames applied.
    fn output_columns(
        def: &ComponentDefinition,
        inputs: &[ColumnDescriptor],
    ) -> Result<Vec<ColumnDescriptor>, GraphValidationError> {
        let Component::Transformer(transformer) = &def.component else {
            if def.output_names.is_some() {
                return Err(GraphValidationError::InvalidComponent {
                    component: def.name.clone(),
                    message: "only transformers have output columns to rename".to_string(),
                });
            }
            return Ok(Vec::new());
        };

        let mut columns = transformer.output_columns(inputs);
        if let Some(names) = &def.output_names {
            if names.len() != columns.len() {
                return Err(GraphValidationError::InvalidComponent {
                    component: def.name.clone(),
                    message: format!(
                        "{} output names given for {} output columns",
                        names.len(),
                        columns.len()
                    ),
                });
            }
            for (column, name) in columns.iter_mut().zip(names) {
                column.name = name.clone();
            }
        }
        Ok(columns)
    }

    fn producer_name(defs: &[ComponentDefinition], node: Option<usize>) -> String {
        match node {
            Some(idx) => defs[idx].name.clone(),
            None => "source".to_string(),
        }
    }

    /// Explain why some nodes could not be placed: either a consumed column
    /// exists nowhere, or the nodes wait on each other.
    fn classify_unplaced(
        defs: &[ComponentDefinition],
        remaining: &[usize],
        producers: &HashMap<String, Producer>,
        columns: &[ColumnDescriptor],
        gating: &[Vec<usize>],
    ) -> GraphValidationError {
        // Columns the unplaced transformers would produce.
        let mut pending: HashMap<String, usize> = HashMap::new();
        for &idx in remaining {
            let provisional: Vec<ColumnDescriptor> = defs[idx]
                .inputs
                .iter()
                .map(|name| match producers.get(name) {
                    Some(p) => columns[p.column.index()].clone(),
                    None => ColumnDescriptor::any(name.clone()),
                })
                .collect();
            if let Ok(outputs) = Self::output_columns(&defs[idx], &provisional) {
                for column in outputs {
                    pending.entry(column.name).or_insert(idx);
                }
            }
        }

        for &idx in remaining {
            for name in &defs[idx].inputs {
                if !producers.contains_key(name) && !pending.contains_key(name) {
                    return GraphValidationError::UnresolvedColumn {
                        component: defs[idx].name.clone(),
                        column: name.clone(),
                    };
                }
            }
        }

        // Edges among unplaced nodes; report the ones on a cycle.
        let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
        for &idx in remaining {
            for name in &defs[idx].inputs {
                if let Some(&producer) = pending.get(name) {
                    edges.entry(producer).or_default().push(idx);
                }
            }
            for &filter in &gating[idx] {
                edges.entry(filter).or_default().push(idx);
            }
        }

        let mut on_cycle: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&start| {
                let mut stack = edges.get(&start).cloned().unwrap_or_default();
                let mut seen = HashSet::new();
                while let Some(node) = stack.pop() {
                    if node == start {
                        return true;
                    }
                    if seen.insert(node) {
                        if let Some(next) = edges.get(&node) {
                            stack.extend(next.iter().copied());
                        }
                    }
                }
                false
            })
            .collect();
        if on_cycle.is_empty() {
            on_cycle = remaining.to_vec();
        }

        GraphValidationError::Cycle {
            components: on_cycle.iter().map(|&i| defs[i].name.clone()).collect(),
        }
    }

    /// Transitive upstream set of every node.
    fn ancestors(order: &[usize], upstream: &[BTreeSet<usize>]) -> Vec<BTreeSet<usize>> {
        let mut ancestors = vec![BTreeSet::new(); upstream.len()];
        for &idx in order {
            let mut set = BTreeSet::new();
            for &up in &upstream[idx] {
                set.insert(up);
                set.extend(ancestors[up].iter().copied());
            }
            ancestors[idx] = set;
        }
        ancestors
    }

    /// Build the per-row schedule.
    ///
    /// Walking a scope in topological order, each transformer becomes a
    /// fan-out step whose downstream scope holds its dependents plus the
    /// not-yet-run ancestors those dependents need. Its dependents are then
    /// removed from the enclosing scope, so nodes that do not depend on the
    /// transformer still see each row once.
    fn schedule(
        defs: &[ComponentDefinition],
        scope: &[usize],
        ancestors: &[BTreeSet<usize>],
    ) -> Vec<Step> {
        let mut remaining = scope.to_vec();
        let mut steps = Vec::new();
        let mut k = 0;

        while k < remaining.len() {
            let idx = remaining[k];
            let id = NodeId(idx as u32);

            if defs[idx].component.category() != ComponentCategory::Transformer {
                steps.push(Step::Node(id));
                k += 1;
                continue;
            }

            let later = &remaining[k + 1..];
            let dependents: BTreeSet<usize> = later
                .iter()
                .copied()
                .filter(|&m| ancestors[m].contains(&idx))
                .collect();
            let sub_scope: Vec<usize> = later
                .iter()
                .copied()
                .filter(|&m| {
                    dependents.contains(&m) || dependents.iter().any(|&d| ancestors[d].contains(&m))
                })
                .collect();

            steps.push(Step::FanOut {
                transformer: id,
                downstream: Self::schedule(defs, &sub_scope, ancestors),
            });
            remaining.retain(|m| !dependents.contains(m));
            k += 1;
        }

        steps
    }

    fn count_occurrences(steps: &[Step], counts: &mut [usize]) {
        for step in steps {
            match step {
                Step::Node(id) => counts[id.index()] += 1,
                Step::FanOut {
                    transformer,
                    downstream,
                } => {
                    counts[transformer.index()] += 1;
                    Self::count_occurrences(downstream, counts);
                }
            }
        }
    }

    /// Per filter and category, the nodes that directly require it.
    fn branches(
        categories: &[Vec<Category>],
        requirements: &[Vec<ResolvedRequirement>],
    ) -> Vec<Vec<Vec<NodeId>>> {
        let mut branches: Vec<Vec<Vec<NodeId>>> = categories
            .iter()
            .map(|cats| vec![Vec::new(); cats.len()])
            .collect();

        for (idx, reqs) in requirements.iter().enumerate() {
            let id = NodeId(idx as u32);
            for requirement in reqs {
                let keys: &[OutcomeKey] = match requirement {
                    ResolvedRequirement::One(key) => std::slice::from_ref(key),
                    ResolvedRequirement::AnyOf(keys) => keys,
                };
                for key in keys {
                    let gated = &mut branches[key.filter.index()][key.category as usize];
                    if !gated.contains(&id) {
                        gated.push(id);
                    }
                }
            }
        }

        branches
    }

    fn stats(
        nodes: &[PlanNode],
        upstream: &[BTreeSet<usize>],
        start_time: std::time::Instant,
    ) -> PlanStats {
        let count = |category| nodes.iter().filter(|n| n.category() == category).count();

        let mut has_consumer = vec![false; nodes.len()];
        for ups in upstream {
            for &up in ups {
                has_consumer[up] = true;
            }
        }
        let dangling_nodes = nodes
            .iter()
            .filter(|n| n.category() != ComponentCategory::Analyzer && !has_consumer[n.id.index()])
            .count();

        PlanStats {
            total_nodes: nodes.len(),
            filters: count(ComponentCategory::Filter),
            transformers: count(ComponentCategory::Transformer),
            analyzers: count(ComponentCategory::Analyzer),
            unwired_categories: nodes
                .iter()
                .flat_map(|n| n.branches.iter())
                .filter(|gated| gated.is_empty())
                .count(),
            dangling_nodes,
            shared_nodes: nodes.iter().filter(|n| n.shared).count(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        }
    }
}
