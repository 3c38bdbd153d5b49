//! The step-loop execution engine.
//!
//! One [`StepLoop`] drives one invocation: it routes from the current node,
//! dispatches the next node (or fanout set), folds the returned updates
//! through the channel schema, persists a checkpoint, and emits a snapshot,
//! until the terminal sentinel, an interrupt, a failure, or cancellation.
//!
//! The loop owns all per-invocation mutable state (current state, step
//! counter, frontier); the compiled graph it runs against is read-only and
//! shared. Updates are folded deterministically: fanout branches dispatch
//! concurrently but their outputs merge in edge-declaration order, so two
//! runs with deterministic nodes produce identical snapshot sequences.

use futures_util::future::join_all;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use super::checkpointer::{Checkpoint, SaverError};
use crate::app::CompiledGraph;
use crate::channels::{ChannelError, ChannelRegistry};
use crate::graphs::Route;
use crate::node::{NodeContext, NodeError, NodePartial};
use crate::state::{StateData, StateSnapshot, as_update};
use crate::types::NodeKind;

/// Marker prefix for a persisted cursor that names a pending fanout rather
/// than a single node. The remainder is the encoded fanout source; routing
/// is re-resolved from it on resume, which is safe because parallel routes
/// are state-independent.
pub(crate) const FANOUT_PREFIX: &str = "__FANOUT__:";

/// Terminal errors surfaced by a running invocation.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// A node (or a conditional edge's decider) failed; carries the node id
    /// and the underlying cause.
    #[error("node `{node}` failed")]
    #[diagnostic(code(stategraph::runner::node_failed))]
    NodeFailed {
        node: NodeKind,
        #[source]
        source: NodeError,
    },

    /// A routing decision produced a label outside the edge's mapping.
    #[error("routing from `{node}` produced unmapped label `{label}`")]
    #[diagnostic(
        code(stategraph::runner::routing),
        help("Every label a condition can return must appear in the conditional edge's mapping.")
    )]
    RoutingFailed { node: NodeKind, label: String },

    /// Execution reached a node with no outgoing transition.
    #[error("node `{node}` has no outgoing transition")]
    #[diagnostic(code(stategraph::runner::dead_end))]
    DeadEnd { node: NodeKind },

    /// The dispatch table has no action for the routed node.
    #[error("no action registered for node `{node}`")]
    #[diagnostic(code(stategraph::runner::missing_node))]
    MissingNode { node: NodeKind },

    /// A channel rejected an update during the merge fold.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Channel(#[from] ChannelError),

    /// The checkpoint store failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Saver(#[from] SaverError),

    /// An operation required a checkpoint saver but none is configured.
    #[error("no checkpoint saver configured")]
    #[diagnostic(
        code(stategraph::runner::saver_unconfigured),
        help("Attach a saver via CompileConfig::with_saver to persist, resume, or inspect state.")
    )]
    SaverUnconfigured,

    /// Resume was requested but the thread has no matching checkpoint.
    #[error("no checkpoint found for thread `{thread_id}`")]
    #[diagnostic(code(stategraph::runner::no_checkpoint))]
    NoCheckpoint { thread_id: String },

    /// The invocation was cancelled cooperatively.
    #[error("invocation cancelled")]
    #[diagnostic(code(stategraph::runner::cancelled))]
    Cancelled,
}

/// What the engine dispatches next: a single node or a fanout set with its
/// precomputed join.
#[derive(Clone, Debug)]
pub(crate) enum Frontier {
    One(NodeKind),
    Fanout {
        source: NodeKind,
        branches: Vec<NodeKind>,
        join: NodeKind,
    },
}

impl Frontier {
    /// The persisted resume cursor: `None` once the run reached `End`.
    fn encode_cursor(&self) -> Option<String> {
        match self {
            Frontier::One(node) if node.is_end() => None,
            Frontier::One(node) => Some(node.encode()),
            Frontier::Fanout { source, .. } => {
                Some(format!("{FANOUT_PREFIX}{}", source.encode()))
            }
        }
    }

    /// The cursor as a `NodeKind`, as carried by emitted snapshots.
    fn as_cursor(&self) -> Option<NodeKind> {
        self.encode_cursor().map(|s| NodeKind::decode(&s))
    }
}

/// Decode a persisted cursor back into a frontier against the graph's
/// routes.
pub(crate) fn decode_frontier(
    graph: &CompiledGraph,
    cursor: &NodeKind,
) -> Result<Frontier, RunnerError> {
    if let NodeKind::Custom(name) = cursor
        && let Some(encoded_source) = name.strip_prefix(FANOUT_PREFIX)
    {
        let source = NodeKind::decode(encoded_source);
        return match graph.routes.get(&source) {
            Some(Route::Parallel { branches, join }) => Ok(Frontier::Fanout {
                source,
                branches: branches.clone(),
                join: join.clone(),
            }),
            _ => Err(RunnerError::RoutingFailed {
                node: source,
                label: name.clone(),
            }),
        };
    }
    Ok(Frontier::One(cursor.clone()))
}

/// Seed a fresh invocation's state: schema defaults overlaid with the
/// caller's input, folded through the channels like any other update.
pub(crate) fn seed_state(
    schema: &ChannelRegistry,
    input: StateData,
) -> Result<StateData, ChannelError> {
    let state = schema.initial_state();
    schema.apply(&state, &as_update(input))
}

/// Drives one invocation of a compiled graph.
pub(crate) struct StepLoop {
    graph: CompiledGraph,
    config: super::RunConfig,
    tx: flume::Sender<Result<StateSnapshot, RunnerError>>,
}

impl StepLoop {
    pub(crate) fn new(
        graph: CompiledGraph,
        config: super::RunConfig,
        tx: flume::Sender<Result<StateSnapshot, RunnerError>>,
    ) -> Self {
        Self { graph, config, tx }
    }

    /// Run to the terminal sentinel, an interrupt, failure, or cancellation.
    ///
    /// Pauses (interrupts, dropped consumers) return `Ok`; the persisted
    /// cursor is the resumable handle. Failures return `Err` and are
    /// forwarded to the snapshot stream by the caller.
    #[instrument(skip_all, fields(thread_id = %self.config.thread_id))]
    pub(crate) async fn drive(self, input: StateData) -> Result<(), RunnerError> {
        let metadata = Arc::new(self.config.metadata.clone());
        let resuming = self.config.checkpoint_id.is_some() || self.config.next_node.is_some();
        let mut step: u64 = 0;

        let (mut state, mut frontier, mut just_resumed) = if resuming {
            let saver = self
                .graph
                .saver
                .clone()
                .ok_or(RunnerError::SaverUnconfigured)?;
            let checkpoint = saver
                .get(&self.config.thread_id, self.config.checkpoint_id.as_deref())
                .await?
                .ok_or_else(|| RunnerError::NoCheckpoint {
                    thread_id: self.config.thread_id.clone(),
                })?;
            let state = self.graph.serializer.deserialize(&checkpoint.state)?;
            let cursor = self
                .config
                .next_node
                .clone()
                .or_else(|| checkpoint.next_node.as_deref().map(NodeKind::decode));
            let Some(cursor) = cursor else {
                // The thread already ran to completion.
                return Ok(());
            };
            tracing::debug!(cursor = %cursor, "resuming from checkpoint");
            (state, decode_frontier(&self.graph, &cursor)?, true)
        } else {
            let mut state = seed_state(&self.graph.schema, input)?;
            let frontier = self
                .route_from(&NodeKind::Start, &mut state, 0, &metadata)
                .await?;
            self.persist(&NodeKind::Start, &state, &frontier).await?;
            (state, frontier, false)
        };

        loop {
            if let Frontier::One(node) = &frontier
                && node.is_end()
            {
                break;
            }
            if !just_resumed && self.hits_interrupt_before(&frontier) {
                tracing::debug!(step, "pausing before dispatch");
                return Ok(());
            }
            just_resumed = false;
            if self.config.cancel.is_cancelled() {
                return Err(RunnerError::Cancelled);
            }
            step += 1;

            match frontier.clone() {
                Frontier::One(node) => {
                    let partial = self.dispatch(&node, state.clone(), step, &metadata).await?;
                    if self.config.cancel.is_cancelled() {
                        return Err(RunnerError::Cancelled);
                    }
                    state = self.graph.schema.apply(&state, &partial.update)?;
                    let next = match partial.goto {
                        Some(label) => self.resolve_hint(&node, label)?,
                        None => self.route_from(&node, &mut state, step, &metadata).await?,
                    };
                    let checkpoint_id = self.persist(&node, &state, &next).await?;
                    let snapshot = StateSnapshot {
                        node: node.clone(),
                        state: state.clone(),
                        next_node: next.as_cursor(),
                        checkpoint_id,
                    };
                    if !self.emit(snapshot) {
                        return Ok(());
                    }
                    if self.graph.interrupt_after.contains(&node) {
                        tracing::debug!(node = %node, step, "pausing after merge");
                        return Ok(());
                    }
                    frontier = next;
                }
                Frontier::Fanout { branches, join, .. } => {
                    let mut actions = Vec::with_capacity(branches.len());
                    for branch in &branches {
                        let action = self.graph.nodes.get(branch).cloned().ok_or_else(|| {
                            RunnerError::MissingNode {
                                node: branch.clone(),
                            }
                        })?;
                        actions.push((branch.clone(), action));
                    }
                    let runs = actions.into_iter().map(|(branch, action)| {
                        let snapshot = state.clone();
                        let ctx = self.node_context(&branch, step, &metadata);
                        async move {
                            let outcome = action.run(snapshot, ctx).await;
                            (branch, outcome)
                        }
                    });
                    // join_all preserves declaration order regardless of
                    // completion order, which keeps the fold deterministic.
                    let results = join_all(runs).await;
                    if self.config.cancel.is_cancelled() {
                        return Err(RunnerError::Cancelled);
                    }
                    let mut folded: Vec<(NodeKind, StateData)> =
                        Vec::with_capacity(results.len());
                    for (branch, outcome) in results {
                        let partial = outcome.map_err(|source| RunnerError::NodeFailed {
                            node: branch.clone(),
                            source,
                        })?;
                        if partial.goto.is_some() {
                            tracing::warn!(node = %branch, "routing hint from fanout branch ignored");
                        }
                        state = self.graph.schema.apply(&state, &partial.update)?;
                        folded.push((branch, state.clone()));
                    }
                    let next = Frontier::One(join);
                    let Some((last_branch, _)) = folded.last() else {
                        frontier = next;
                        continue;
                    };
                    let checkpoint_id = self.persist(last_branch, &state, &next).await?;
                    for (branch, branch_state) in &folded {
                        let snapshot = StateSnapshot {
                            node: branch.clone(),
                            state: branch_state.clone(),
                            next_node: next.as_cursor(),
                            checkpoint_id: checkpoint_id.clone(),
                        };
                        if !self.emit(snapshot) {
                            return Ok(());
                        }
                    }
                    if branches
                        .iter()
                        .any(|branch| self.graph.interrupt_after.contains(branch))
                    {
                        tracing::debug!(step, "pausing after fanout merge");
                        return Ok(());
                    }
                    frontier = next;
                }
            }
        }

        if self.graph.release_thread
            && let Some(saver) = &self.graph.saver
        {
            saver.release(&self.config.thread_id).await?;
        }
        tracing::debug!(step, "run complete");
        Ok(())
    }

    fn node_context(
        &self,
        node: &NodeKind,
        step: u64,
        metadata: &Arc<FxHashMap<String, Value>>,
    ) -> NodeContext {
        NodeContext {
            node: node.clone(),
            step,
            thread_id: self.config.thread_id.clone(),
            metadata: metadata.clone(),
        }
    }

    async fn dispatch(
        &self,
        node: &NodeKind,
        snapshot: StateData,
        step: u64,
        metadata: &Arc<FxHashMap<String, Value>>,
    ) -> Result<NodePartial, RunnerError> {
        let action =
            self.graph
                .nodes
                .get(node)
                .cloned()
                .ok_or_else(|| RunnerError::MissingNode {
                    node: node.clone(),
                })?;
        tracing::debug!(node = %node, step, "dispatching node");
        let ctx = self.node_context(node, step, metadata);
        action
            .run(snapshot, ctx)
            .await
            .map_err(|source| RunnerError::NodeFailed {
                node: node.clone(),
                source,
            })
    }

    /// Resolve the node's outgoing transition. A conditional edge's decider
    /// runs here; its command update is applied to the state before the
    /// jump is taken.
    async fn route_from(
        &self,
        node: &NodeKind,
        state: &mut StateData,
        step: u64,
        metadata: &Arc<FxHashMap<String, Value>>,
    ) -> Result<Frontier, RunnerError> {
        match self.graph.routes.get(node) {
            None => Err(RunnerError::DeadEnd { node: node.clone() }),
            Some(Route::Direct(target)) => Ok(Frontier::One(target.clone())),
            Some(Route::Parallel { branches, join }) => Ok(Frontier::Fanout {
                source: node.clone(),
                branches: branches.clone(),
                join: join.clone(),
            }),
            Some(Route::Conditional { condition, mapping }) => {
                let ctx = self.node_context(node, step, metadata);
                let command = condition.decide(state.clone(), ctx).await.map_err(
                    |source| RunnerError::NodeFailed {
                        node: node.clone(),
                        source,
                    },
                )?;
                if !command.update.is_empty() {
                    *state = self.graph.schema.apply(state, &command.update)?;
                }
                let label = command.goto.ok_or_else(|| RunnerError::RoutingFailed {
                    node: node.clone(),
                    label: "<no label>".to_string(),
                })?;
                let target = mapping
                    .iter()
                    .find(|(candidate, _)| candidate == &label)
                    .map(|(_, target)| target.clone())
                    .ok_or_else(|| RunnerError::RoutingFailed {
                        node: node.clone(),
                        label,
                    })?;
                Ok(Frontier::One(target))
            }
        }
    }

    /// Resolve a routing hint returned by the node itself. With a
    /// conditional edge the label goes through the mapping (the decider is
    /// skipped); otherwise the label must name `End` or a registered node.
    fn resolve_hint(&self, node: &NodeKind, label: String) -> Result<Frontier, RunnerError> {
        match self.graph.routes.get(node) {
            Some(Route::Conditional { mapping, .. }) => mapping
                .iter()
                .find(|(candidate, _)| candidate == &label)
                .map(|(_, target)| Frontier::One(target.clone()))
                .ok_or_else(|| RunnerError::RoutingFailed {
                    node: node.clone(),
                    label,
                }),
            _ => {
                let target = NodeKind::decode(&label);
                if target.is_end() || self.graph.nodes.contains_key(&target) {
                    Ok(Frontier::One(target))
                } else {
                    Err(RunnerError::RoutingFailed {
                        node: node.clone(),
                        label,
                    })
                }
            }
        }
    }

    async fn persist(
        &self,
        node: &NodeKind,
        state: &StateData,
        next: &Frontier,
    ) -> Result<Option<String>, RunnerError> {
        let Some(saver) = &self.graph.saver else {
            return Ok(None);
        };
        let bytes = self.graph.serializer.serialize(state)?;
        let checkpoint = Checkpoint::new(node.encode(), next.encode_cursor(), bytes);
        let id = saver.put(&self.config.thread_id, checkpoint).await?;
        Ok(Some(id))
    }

    /// Send a snapshot to the consumer; `false` when the stream was dropped.
    fn emit(&self, snapshot: StateSnapshot) -> bool {
        self.tx.send(Ok(snapshot)).is_ok()
    }

    fn hits_interrupt_before(&self, frontier: &Frontier) -> bool {
        match frontier {
            Frontier::One(node) => self.graph.interrupt_before.contains(node),
            Frontier::Fanout { branches, .. } => branches
                .iter()
                .any(|branch| self.graph.interrupt_before.contains(branch)),
        }
    }
}
