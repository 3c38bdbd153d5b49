//! StateGraph builder: the fluent API for declaring workflow graphs.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::sync::Arc;

use super::GraphError;
use super::edges::{ConditionMapping, ConditionalEdge, PlainEdges};
use crate::channels::ChannelRegistry;
use crate::command::{Command, CommandAction, GOTO_KEY};
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::{StateData, UpdateValue};
use crate::types::{END_ID, NodeKind, START_ID};

/// Builder for workflow graphs.
///
/// A `StateGraph` collects nodes, edges, and nested subgraphs over a channel
/// schema, then lowers into an executable
/// [`CompiledGraph`](crate::app::CompiledGraph) via
/// [`compile`](Self::compile). Every operation validates its arguments and
/// fails fast with a [`GraphError`]; the fluent methods take and return
/// `self` so declarations chain with `?`.
///
/// # Required Shape
///
/// - at least one edge must leave `Start` (the entry point)
/// - `End` may never be an edge source, `Start` never a target
/// - each source owns one transition: plain targets or a conditional edge
///
/// # Examples
///
/// ## Conditional Routing
///
/// ```rust
/// use stategraph::channels::ChannelRegistry;
/// use stategraph::command::{command_fn, Command};
/// use stategraph::graphs::StateGraph;
/// use stategraph::node::{node_fn, NodePartial};
/// use stategraph::runtimes::CompileConfig;
///
/// # fn main() -> Result<(), stategraph::graphs::GraphError> {
/// let route = command_fn(|snapshot, _ctx| async move {
///     let label = if snapshot.contains_key("urgent") { "fast" } else { "slow" };
///     Ok(Command::goto(label))
/// });
///
/// let compiled = StateGraph::new(ChannelRegistry::new())
///     .add_node_arc("fast", node_fn(|_s, _c| async move { Ok(NodePartial::new()) }))?
///     .add_node_arc("slow", node_fn(|_s, _c| async move { Ok(NodePartial::new()) }))?
///     .add_edge("__START__", "fast")?
///     .add_conditional_edges("fast", route, [("fast", "slow"), ("slow", "__END__")])?
///     .add_edge("slow", "__END__")?
///     .compile(CompileConfig::default())?;
/// # let _ = compiled;
/// # Ok(())
/// # }
/// ```
pub struct StateGraph {
    /// Per-key update policies shared by the whole graph (and its subgraphs).
    pub(super) schema: ChannelRegistry,
    /// Registry of executable nodes, keyed by their identifier.
    pub(super) nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    /// Node ids in registration order, for deterministic validation and
    /// rendering output.
    pub(super) node_order: Vec<NodeKind>,
    /// Plain edges: one target list per source (several targets = fanout).
    pub(super) plain: PlainEdges,
    /// Conditional edges, at most one per source.
    pub(super) conditional: FxHashMap<NodeKind, ConditionalEdge>,
    /// Uncompiled subgraphs to be flattened at compile time, in
    /// registration order.
    pub(super) subgraphs: Vec<(NodeKind, StateGraph)>,
}

impl StateGraph {
    /// Create an empty graph over the given channel schema.
    #[must_use]
    pub fn new(schema: ChannelRegistry) -> Self {
        Self {
            schema,
            nodes: FxHashMap::default(),
            node_order: Vec::new(),
            plain: PlainEdges::default(),
            conditional: FxHashMap::default(),
            subgraphs: Vec::new(),
        }
    }

    /// The channel schema this graph runs over.
    #[must_use]
    pub fn schema(&self) -> &ChannelRegistry {
        &self.schema
    }

    fn check_registrable(&self, id: &NodeKind) -> Result<(), GraphError> {
        match id {
            NodeKind::Start | NodeKind::End => {
                return Err(GraphError::ReservedNode { id: id.clone() });
            }
            NodeKind::Custom(name) => {
                if name.is_empty() || name == START_ID || name == END_ID {
                    return Err(GraphError::InvalidNodeId { id: name.clone() });
                }
            }
        }
        if self.is_registered(id) {
            return Err(GraphError::DuplicateNode { id: id.clone() });
        }
        Ok(())
    }

    pub(super) fn is_registered(&self, id: &NodeKind) -> bool {
        self.nodes.contains_key(id) || self.subgraphs.iter().any(|(sub_id, _)| sub_id == id)
    }

    /// Register a node.
    ///
    /// Rejects the virtual `Start`/`End` ids, empty ids, and duplicates.
    pub fn add_node(
        self,
        id: impl Into<NodeKind>,
        node: impl Node + 'static,
    ) -> Result<Self, GraphError> {
        self.add_node_arc(id, Arc::new(node))
    }

    /// Register an already-shared node (e.g. from
    /// [`node_fn`](crate::node::node_fn)).
    pub fn add_node_arc(
        mut self,
        id: impl Into<NodeKind>,
        node: Arc<dyn Node>,
    ) -> Result<Self, GraphError> {
        let id = id.into();
        self.check_registrable(&id)?;
        self.nodes.insert(id.clone(), node);
        self.node_order.push(id);
        Ok(self)
    }

    /// Register a command node: sugar for a node wrapping a
    /// [`CommandAction`] plus conditional edges from it.
    ///
    /// The wrapper stages the command's chosen label under a reserved state
    /// key; the installed conditional edge reads the label, resolves it
    /// through `mapping`, and scrubs the key before the jump, so the staged
    /// label never survives a routing round.
    pub fn add_command_node<S, N>(
        self,
        id: impl Into<NodeKind>,
        action: Arc<dyn CommandAction>,
        mapping: impl IntoIterator<Item = (S, N)>,
    ) -> Result<Self, GraphError>
    where
        S: Into<String>,
        N: Into<NodeKind>,
    {
        let id = id.into();
        self.add_node_arc(id.clone(), Arc::new(CommandNode { action }))?
            .add_conditional_edges(id, Arc::new(StagedGotoCondition), mapping)
    }

    /// Register an uncompiled subgraph under `id`.
    ///
    /// The subgraph shares this graph's channel schema and is flattened into
    /// the parent at compile time: its nodes are inlined with `id.`-prefixed
    /// names and the `id` vertex is replaced by an enter/exit edge splice.
    pub fn add_subgraph(
        mut self,
        id: impl Into<NodeKind>,
        subgraph: StateGraph,
    ) -> Result<Self, GraphError> {
        let id = id.into();
        self.check_registrable(&id)?;
        if subgraph.plain.is_empty() && subgraph.conditional.is_empty() {
            return Err(GraphError::SubgraphFlatten {
                node: id,
                reason: "subgraph has no edges".to_string(),
            });
        }
        self.node_order.push(id.clone());
        self.subgraphs.push((id, subgraph));
        Ok(self)
    }

    /// Register an already-compiled graph as an opaque nested node.
    ///
    /// The nested graph runs as a single step of the parent: it receives the
    /// parent's state snapshot as input and its final state replaces the
    /// touched keys wholesale (appender keys included).
    pub fn add_compiled_subgraph(
        self,
        id: impl Into<NodeKind>,
        subgraph: crate::app::CompiledGraph,
    ) -> Result<Self, GraphError> {
        let registry = self.schema.clone();
        self.add_node_arc(
            id,
            Arc::new(super::compilation::CompiledSubgraphNode::new(
                subgraph, registry,
            )),
        )
    }

    /// Declare a plain edge.
    ///
    /// A second edge from the same source appends to the target list and
    /// turns the transition into a parallel fanout.
    pub fn add_edge(
        mut self,
        from: impl Into<NodeKind>,
        to: impl Into<NodeKind>,
    ) -> Result<Self, GraphError> {
        let from = from.into();
        let to = to.into();
        if from.is_end() {
            return Err(GraphError::EdgeFromEnd);
        }
        if to.is_start() {
            return Err(GraphError::EdgeToStart { node: from });
        }
        if self.conditional.contains_key(&from) {
            return Err(GraphError::ConditionalOnParallel { node: from });
        }
        self.plain.entry(from).or_default().push(to);
        Ok(self)
    }

    /// Declare a conditional edge.
    ///
    /// The mapping must be non-empty and the source may carry neither a
    /// second conditional edge nor plain edges.
    pub fn add_conditional_edges<S, N>(
        mut self,
        from: impl Into<NodeKind>,
        condition: Arc<dyn CommandAction>,
        mapping: impl IntoIterator<Item = (S, N)>,
    ) -> Result<Self, GraphError>
    where
        S: Into<String>,
        N: Into<NodeKind>,
    {
        let from = from.into();
        if from.is_end() {
            return Err(GraphError::EdgeFromEnd);
        }
        if self.conditional.contains_key(&from) {
            return Err(GraphError::DuplicateConditionalEdge { node: from });
        }
        if self.plain.contains_key(&from) {
            return Err(GraphError::ConditionalOnParallel { node: from });
        }
        let mapping: ConditionMapping = mapping
            .into_iter()
            .map(|(label, target)| (label.into(), target.into()))
            .collect();
        if mapping.is_empty() {
            return Err(GraphError::EmptyMapping { node: from });
        }
        if mapping.iter().any(|(_, target)| target.is_start()) {
            return Err(GraphError::EdgeToStart { node: from });
        }
        self.conditional.insert(
            from.clone(),
            ConditionalEdge {
                from,
                condition,
                mapping,
            },
        );
        Ok(self)
    }

    /// Number of registered nodes (subgraph placeholders included, virtual
    /// endpoints excluded).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    /// Number of declared edge targets, plain and conditional.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        let plain: usize = self.plain.values().map(Vec::len).sum();
        let conditional: usize = self.conditional.values().map(|ce| ce.mapping.len()).sum();
        plain + conditional
    }

    /// Render the declared topology as a textual diagram.
    ///
    /// Subgraph placeholders render as single vertices; compile first to
    /// see the flattened shape.
    #[must_use]
    pub fn get_graph(
        &self,
        kind: crate::render::RenderKind,
        title: &str,
        print_conditional: bool,
    ) -> crate::render::GraphRepresentation {
        crate::render::render_topology(kind, title, print_conditional, &self.node_order, |source| {
            if let Some(targets) = self.plain.get(source) {
                return Some(crate::render::EdgeView::Direct(targets.clone()));
            }
            self.conditional
                .get(source)
                .map(|edge| crate::render::EdgeView::Conditional(edge.mapping.clone()))
        })
    }

    /// Nodes that no path from `Start` can reach.
    ///
    /// Compiled graphs are expected to have none; the method exists so
    /// callers and tests can assert reachability explicitly.
    #[must_use]
    pub fn unreachable_nodes(&self) -> Vec<NodeKind> {
        let mut visited: FxHashSet<NodeKind> = FxHashSet::default();
        let mut frontier = vec![NodeKind::Start];
        while let Some(current) = frontier.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(targets) = self.plain.get(&current) {
                frontier.extend(targets.iter().cloned());
            }
            if let Some(edge) = self.conditional.get(&current) {
                frontier.extend(edge.mapping.iter().map(|(_, target)| target.clone()));
            }
        }
        self.node_order
            .iter()
            .filter(|id| !visited.contains(id))
            .cloned()
            .collect()
    }
}

/// Wrapper installed by [`StateGraph::add_command_node`]: runs the command
/// action and stages its label under the reserved routing key.
pub(super) struct CommandNode {
    pub(super) action: Arc<dyn CommandAction>,
}

#[async_trait]
impl Node for CommandNode {
    async fn run(&self, snapshot: StateData, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let command = self.action.decide(snapshot, ctx).await?;
        let mut update = command.update;
        if let Some(label) = command.goto {
            update.insert(GOTO_KEY.to_string(), UpdateValue::Value(Value::String(label)));
        }
        Ok(NodePartial {
            update,
            goto: None,
        })
    }
}

/// Condition installed by [`StateGraph::add_command_node`]: reads the staged
/// label and scrubs the reserved key via its own command update.
pub(super) struct StagedGotoCondition;

#[async_trait]
impl CommandAction for StagedGotoCondition {
    async fn decide(&self, snapshot: StateData, _ctx: NodeContext) -> Result<Command, NodeError> {
        let label = snapshot
            .get(GOTO_KEY)
            .and_then(Value::as_str)
            .ok_or(NodeError::MissingInput { what: GOTO_KEY })?
            .to_string();
        Ok(Command::goto(label).with_entry(GOTO_KEY, UpdateValue::Remove))
    }
}
