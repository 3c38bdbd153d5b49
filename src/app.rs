use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::channels::ChannelRegistry;
use crate::graphs::Route;
use crate::node::Node;
use crate::render::{GraphRepresentation, RenderKind};
use crate::runtimes::checkpointer::{Checkpoint, CheckpointSaver};
use crate::runtimes::persistence::StateSerializer;
use crate::runtimes::runner::{StepLoop, seed_state};
use crate::runtimes::{CompileConfig, RunConfig, RunnerError, SnapshotStream};
use crate::state::{StateData, StateSnapshot, StateUpdate};
use crate::types::NodeKind;

/// An executable workflow graph.
///
/// `CompiledGraph` is the immutable artifact produced by
/// [`StateGraph::compile`](crate::graphs::StateGraph::compile): dispatch
/// tables (node actions and routes), the channel schema, and the compile
/// configuration (saver, interrupt sets). It is stateless across
/// invocations and cheap to clone: every run owns its own step loop, so a
/// single compiled graph may serve many threads concurrently.
///
/// # Examples
///
/// ```rust,no_run
/// use stategraph::channels::ChannelRegistry;
/// use stategraph::graphs::StateGraph;
/// use stategraph::node::{node_fn, NodePartial};
/// use stategraph::runtimes::{CompileConfig, RunConfig};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let compiled = StateGraph::new(ChannelRegistry::new())
///     .add_node_arc("work", node_fn(|_s, _c| async move {
///         Ok(NodePartial::new().with_entry("done", json!(true)))
///     }))?
///     .add_edge("__START__", "work")?
///     .add_edge("work", "__END__")?
///     .compile(CompileConfig::default())?;
///
/// let final_state = compiled.invoke(Default::default(), RunConfig::new()).await?;
/// assert_eq!(final_state.get("done"), Some(&json!(true)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    pub(crate) routes: FxHashMap<NodeKind, Route>,
    pub(crate) node_order: Vec<NodeKind>,
    pub(crate) schema: ChannelRegistry,
    pub(crate) interrupt_before: Vec<NodeKind>,
    pub(crate) interrupt_after: Vec<NodeKind>,
    pub(crate) saver: Option<Arc<dyn CheckpointSaver>>,
    pub(crate) serializer: Arc<dyn StateSerializer>,
    pub(crate) release_thread: bool,
}

impl CompiledGraph {
    /// Internal (crate) factory; keeps the dispatch tables private.
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        routes: FxHashMap<NodeKind, Route>,
        node_order: Vec<NodeKind>,
        schema: ChannelRegistry,
        config: CompileConfig,
    ) -> Self {
        Self {
            nodes,
            routes,
            node_order,
            schema,
            interrupt_before: config.interrupt_before,
            interrupt_after: config.interrupt_after,
            saver: config.saver,
            serializer: config.serializer,
            release_thread: config.release_thread,
        }
    }

    /// The registered node actions, keyed by id.
    #[must_use]
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    /// The compiled transition per source node.
    #[must_use]
    pub fn routes(&self) -> &FxHashMap<NodeKind, Route> {
        &self.routes
    }

    /// The channel schema this graph runs over.
    #[must_use]
    pub fn schema(&self) -> &ChannelRegistry {
        &self.schema
    }

    /// Start an invocation and stream its snapshots lazily.
    ///
    /// The step loop runs on a background task; snapshots arrive in step
    /// order. A run failure is delivered as the stream's final `Err` item.
    /// When `config` carries a resume cursor (`checkpoint_id` or
    /// `next_node`), the input is ignored and execution continues from the
    /// persisted state.
    #[must_use]
    pub fn stream(&self, input: StateData, config: RunConfig) -> SnapshotStream {
        let (tx, rx) = flume::unbounded();
        let graph = self.clone();
        let errors = tx.clone();
        let handle = tokio::spawn(async move {
            let run = StepLoop::new(graph, config, tx);
            if let Err(err) = run.drive(input).await {
                let _ = errors.send(Err(err));
            }
        });
        SnapshotStream::new(rx, handle)
    }

    /// Run to completion and return the final state.
    ///
    /// Consumes the snapshot stream; an invocation that pauses at an
    /// interrupt returns the state reached so far (use
    /// [`get_state`](Self::get_state) for the resume cursor).
    #[instrument(skip(self, input, config), fields(thread_id = %config.thread_id), err)]
    pub async fn invoke(
        &self,
        input: StateData,
        config: RunConfig,
    ) -> Result<StateData, RunnerError> {
        let fallback = input.clone();
        let mut stream = self.stream(input, config);
        let mut last: Option<StateData> = None;
        while let Some(item) = stream.next().await {
            last = Some(item?.state);
        }
        match last {
            Some(state) => Ok(state),
            // Degenerate graphs (Start wired straight to End) emit nothing.
            None => Ok(seed_state(&self.schema, fallback)?),
        }
    }

    /// The latest persisted snapshot for the thread (or the specific
    /// checkpoint named by `config.checkpoint_id`).
    pub async fn get_state(&self, config: &RunConfig) -> Result<StateSnapshot, RunnerError> {
        let saver = self.saver.as_ref().ok_or(RunnerError::SaverUnconfigured)?;
        let checkpoint = saver
            .get(&config.thread_id, config.checkpoint_id.as_deref())
            .await?
            .ok_or_else(|| RunnerError::NoCheckpoint {
                thread_id: config.thread_id.clone(),
            })?;
        self.snapshot_from(checkpoint)
    }

    /// The thread's full snapshot history, oldest first.
    pub async fn state_history(
        &self,
        config: &RunConfig,
    ) -> Result<Vec<StateSnapshot>, RunnerError> {
        let saver = self.saver.as_ref().ok_or(RunnerError::SaverUnconfigured)?;
        let checkpoints = saver.list(&config.thread_id).await?;
        checkpoints
            .into_iter()
            .map(|checkpoint| self.snapshot_from(checkpoint))
            .collect()
    }

    /// Fold `values` into the thread's latest state and persist the result
    /// as a synthetic checkpoint, as if `as_node` had produced it.
    ///
    /// Returns a config pointing at the new checkpoint, ready to resume
    /// from. When the thread has no history yet, the update applies over
    /// the schema defaults.
    pub async fn update_state(
        &self,
        config: &RunConfig,
        values: StateUpdate,
        as_node: Option<&str>,
    ) -> Result<RunConfig, RunnerError> {
        let saver = self.saver.as_ref().ok_or(RunnerError::SaverUnconfigured)?;
        let latest = saver
            .get(&config.thread_id, config.checkpoint_id.as_deref())
            .await?;
        let (base_state, base_node, base_next) = match latest {
            Some(checkpoint) => {
                let state = self.serializer.deserialize(&checkpoint.state)?;
                (
                    state,
                    NodeKind::decode(&checkpoint.node),
                    checkpoint.next_node,
                )
            }
            None => (self.schema.initial_state(), NodeKind::Start, None),
        };

        let new_state = self.schema.apply(&base_state, &values)?;
        let node = as_node.map(NodeKind::decode).unwrap_or(base_node);
        // With an explicit author node, the cursor follows that node's
        // direct edge; otherwise the previous cursor is preserved.
        let next_node = if as_node.is_some() {
            match self.routes.get(&node) {
                Some(Route::Direct(target)) if target.is_end() => None,
                Some(Route::Direct(target)) => Some(target.encode()),
                _ => base_next,
            }
        } else {
            base_next
        };

        let checkpoint = Checkpoint::new(
            node.encode(),
            next_node,
            self.serializer.serialize(&new_state)?,
        );
        let id = saver.put(&config.thread_id, checkpoint).await?;
        Ok(config.clone().with_checkpoint_id(id))
    }

    /// Render the compiled topology as a textual diagram.
    #[must_use]
    pub fn get_graph(
        &self,
        kind: RenderKind,
        title: &str,
        print_conditional: bool,
    ) -> GraphRepresentation {
        crate::render::render_topology(kind, title, print_conditional, &self.node_order, |source| {
            self.routes.get(source).map(|route| match route {
                Route::Direct(target) => crate::render::EdgeView::Direct(vec![target.clone()]),
                Route::Parallel { branches, .. } => {
                    crate::render::EdgeView::Direct(branches.clone())
                }
                Route::Conditional { mapping, .. } => {
                    crate::render::EdgeView::Conditional(mapping.clone())
                }
            })
        })
    }

    fn snapshot_from(&self, checkpoint: Checkpoint) -> Result<StateSnapshot, RunnerError> {
        let state = self.serializer.deserialize(&checkpoint.state)?;
        Ok(StateSnapshot {
            node: NodeKind::decode(&checkpoint.node),
            state,
            next_node: checkpoint.next_node.as_deref().map(NodeKind::decode),
            checkpoint_id: Some(checkpoint.id),
        })
    }
}
