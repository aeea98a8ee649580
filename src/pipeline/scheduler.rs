//! Concurrency scheduling.
//!
//! Decides per node how calls for different rows may overlap and owns the
//! synchronization that follows from it:
//! - **Serial filters and transformers** get a gate (`Mutex<()>`). A serial
//!   transformer keeps its gate while its derived rows run downstream, so one
//!   row's fan-out completes before the next row enters the transformer.
//! - **Concurrent analyzers** get one partial state per worker, merged at the
//!   join point (map/reduce).
//! - **Serial analyzers** share one `Mutex`-guarded state.
//!
//! Gates are always taken in topological order (a fan-out only nests nodes
//! that come later in the plan), so nested gates cannot deadlock.

use crate::config::ExecutionConfig;
use crate::pipeline::compiled_plan::ExecutionPlan;
use crate::pipeline::component::{AnalyzerState, Component};
use crate::pipeline::id::NodeId;
use crossbeam_channel::{bounded, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How rows are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Rows are processed on the coordinating thread, in source order.
    Inline,
    /// Rows are queued to a fixed pool of worker threads.
    Pool { workers: usize, queue_capacity: usize },
}

impl DispatchMode {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        if config.worker_count <= 1 {
            DispatchMode::Inline
        } else {
            DispatchMode::Pool {
                workers: config.worker_count,
                queue_capacity: config.queue_capacity.max(1),
            }
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            DispatchMode::Inline => 1,
            DispatchMode::Pool { workers, .. } => *workers,
        }
    }
}

/// Where an analyzer's accumulator lives during the run.
enum AnalyzerSlot {
    Partitioned,
    Shared(Mutex<AnalyzerState>),
}

/// Per-node synchronization for one run.
pub(crate) struct Scheduler {
    gates: Vec<Option<Mutex<()>>>,
    analyzers: Vec<Option<AnalyzerSlot>>,
}

impl Scheduler {
    pub fn new(plan: &ExecutionPlan, mode: DispatchMode) -> Self {
        let mut gates = Vec::with_capacity(plan.nodes().len());
        let mut analyzers = Vec::with_capacity(plan.nodes().len());

        for node in plan.nodes() {
            match &node.component {
                Component::Analyzer(analyzer) => {
                    gates.push(None);
                    if node.concurrent {
                        analyzers.push(Some(AnalyzerSlot::Partitioned));
                    } else {
                        analyzers.push(Some(AnalyzerSlot::Shared(Mutex::new(
                            analyzer.create_state(),
                        ))));
                    }
                }
                _ => {
                    analyzers.push(None);
                    gates.push((!node.concurrent).then(|| Mutex::new(())));
                }
            }
            tracing::debug!(
                "{} '{}' runs {}",
                node.category(),
                node.name,
                match (node.concurrent, mode) {
                    (_, DispatchMode::Inline) => "inline",
                    (true, _) => "concurrently",
                    (false, _) => "serially",
                }
            );
        }

        Self { gates, analyzers }
    }

    /// Serial gate of a filter or transformer; `None` for concurrent nodes.
    pub fn gate(&self, node: NodeId) -> Option<MutexGuard<'_, ()>> {
        self.gates
            .get(node.index())?
            .as_ref()
            .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Shared state of a serial analyzer; `None` for partitioned analyzers.
    pub fn shared_state(&self, node: NodeId) -> Option<MutexGuard<'_, AnalyzerState>> {
        match self.analyzers.get(node.index())? {
            Some(AnalyzerSlot::Shared(state)) => {
                Some(state.lock().unwrap_or_else(PoisonError::into_inner))
            }
            _ => None,
        }
    }

    /// Fresh partial states for one worker, indexed by node.
    pub fn worker_partials(&self, plan: &ExecutionPlan) -> Vec<Option<AnalyzerState>> {
        plan.nodes()
            .iter()
            .zip(&self.analyzers)
            .map(|(node, slot)| match (&node.component, slot) {
                (Component::Analyzer(analyzer), Some(AnalyzerSlot::Partitioned)) => {
                    Some(analyzer.create_state())
                }
                _ => None,
            })
            .collect()
    }

    /// Join point: merge worker partials and release shared states.
    ///
    /// Partials are merged in worker order into a fresh state.
    pub fn into_final_states(
        self,
        plan: &ExecutionPlan,
        workers: Vec<Vec<Option<AnalyzerState>>>,
    ) -> Vec<(NodeId, AnalyzerState)> {
        let mut workers: Vec<_> = workers.into_iter().map(Vec::into_iter).collect();
        let mut states = Vec::new();

        for (node, slot) in plan.nodes().iter().zip(self.analyzers) {
            let partials: Vec<Option<AnalyzerState>> =
                workers.iter_mut().map(|w| w.next().flatten()).collect();
            let Component::Analyzer(analyzer) = &node.component else {
                continue;
            };

            let state = match slot {
                Some(AnalyzerSlot::Shared(state)) => {
                    state.into_inner().unwrap_or_else(PoisonError::into_inner)
                }
                _ => {
                    let mut merged = analyzer.create_state();
                    for partial in partials.into_iter().flatten() {
                        if let Err(e) = analyzer.merge(&mut merged, partial) {
                            tracing::error!("Dropping partial state of '{}': {}", node.name, e);
                        }
                    }
                    merged
                }
            };
            states.push((node.id, state));
        }

        states
    }
}

/// Outcome of a worker pool run.
pub(crate) struct PoolOutput<L> {
    /// Local state of every worker that finished normally.
    pub locals: Vec<L>,
    /// Panic messages of workers that did not.
    pub panics: Vec<String>,
}

/// Run `produce` on the calling thread while `workers` threads consume what
/// it sends through a bounded queue.
///
/// Returns once the producer is done and every worker has drained the queue.
pub(crate) fn run_pool<T, L>(
    workers: usize,
    queue_capacity: usize,
    init: impl Fn(usize) -> L + Sync,
    work: impl Fn(&mut L, T) + Sync,
    produce: impl FnOnce(&Sender<T>),
) -> PoolOutput<L>
where
    T: Send,
    L: Send,
{
    std::thread::scope(|s| {
        let (tx, rx) = bounded::<T>(queue_capacity);
        let init = &init;
        let work = &work;

        let handles: Vec<_> = (0..workers)
            .map(|idx| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("rowflow-worker-{idx}"))
                    .spawn_scoped(s, move || {
                        let mut local = init(idx);
                        for item in rx.iter() {
                            work(&mut local, item);
                        }
                        local
                    })
            })
            .collect();
        drop(rx);

        produce(&tx);
        drop(tx);

        let mut output = PoolOutput {
            locals: Vec::with_capacity(workers),
            panics: Vec::new(),
        };
        for handle in handles {
            match handle {
                Ok(handle) => match handle.join() {
                    Ok(local) => output.locals.push(local),
                    Err(panic) => output.panics.push(panic_message(panic.as_ref())),
                },
                Err(e) => output.panics.push(format!("failed to spawn worker: {e}")),
            }
        }
        output
    })
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
