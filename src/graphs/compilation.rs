//! Graph compilation: subgraph flattening and route lowering.
//!
//! Compilation consumes the builder in three passes: uncompiled subgraphs
//! are inlined into the parent namespace, the flattened topology is
//! validated, and the edge declarations are lowered into the dispatch
//! routes the execution engine consumes.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::GraphError;
use super::builder::StateGraph;
use super::edges::{ConditionalEdge, Route};
use crate::app::CompiledGraph;
use crate::channels::ChannelRegistry;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::runtimes::{CompileConfig, RunConfig};
use crate::state::{StateData, StateUpdate, UpdateValue};
use crate::types::NodeKind;

impl StateGraph {
    /// Compile the graph into an executable [`CompiledGraph`].
    ///
    /// Flattens nested subgraphs, runs the structural validator, and lowers
    /// the declared edges into dispatch routes. The compiled artifact is
    /// immutable, cheap to clone, and reusable across invocations.
    pub fn compile(self, config: CompileConfig) -> Result<CompiledGraph, GraphError> {
        let flat = self.flatten()?;
        let interrupts: Vec<NodeKind> = config
            .interrupt_before
            .iter()
            .chain(config.interrupt_after.iter())
            .cloned()
            .collect();
        flat.validate(&interrupts)?;
        let routes = flat.build_routes()?;
        tracing::debug!(
            nodes = flat.node_order.len(),
            routes = routes.len(),
            "graph compiled"
        );
        Ok(CompiledGraph::from_parts(
            flat.nodes,
            routes,
            flat.node_order,
            flat.schema,
            config,
        ))
    }

    fn flatten(mut self) -> Result<Self, GraphError> {
        if self.subgraphs.is_empty() {
            return Ok(self);
        }
        let subgraphs = std::mem::take(&mut self.subgraphs);
        for (id, sub) in subgraphs {
            let sub = sub.flatten()?;
            self.inline_subgraph(&id, sub)?;
        }
        Ok(self)
    }

    /// Inline one flattened subgraph: its nodes land in the parent under
    /// `id.`-prefixed names and the `id` vertex is replaced by an enter/exit
    /// edge splice.
    fn inline_subgraph(&mut self, id: &NodeKind, sub: StateGraph) -> Result<(), GraphError> {
        let flatten_err = |reason: &str| GraphError::SubgraphFlatten {
            node: id.clone(),
            reason: reason.to_string(),
        };

        let prefix = id.encode();
        let map_kind = |kind: &NodeKind| -> NodeKind {
            match kind {
                NodeKind::Custom(name) => NodeKind::Custom(format!("{prefix}.{name}")),
                other => other.clone(),
            }
        };

        let StateGraph {
            nodes: sub_nodes,
            node_order: sub_order,
            plain: sub_plain,
            conditional: sub_conditional,
            ..
        } = sub;

        // Enter edge: parent references to `id` are re-pointed at the
        // subgraph's own entry targets.
        if sub_conditional.contains_key(&NodeKind::Start) {
            return Err(flatten_err("subgraph entry may not be conditional"));
        }
        let entry: Vec<NodeKind> = sub_plain
            .get(&NodeKind::Start)
            .ok_or_else(|| flatten_err("subgraph has no entry edge"))?
            .iter()
            .map(|kind| map_kind(kind))
            .collect();

        // Exit edge: the parent transition leaving the `id` vertex becomes
        // the continuation for every subgraph path that reaches `End`.
        let continuation = self.plain.remove(id);
        let continuation_cond = self.conditional.remove(id);
        if continuation.is_none() && continuation_cond.is_none() {
            return Err(flatten_err("subgraph node has no outgoing edge"));
        }

        let mut inlined_ids = Vec::with_capacity(sub_order.len());
        for child in &sub_order {
            let mapped = map_kind(child);
            if self.is_registered(&mapped) {
                return Err(GraphError::DuplicateNode { id: mapped });
            }
            inlined_ids.push(mapped);
        }
        for (child, node) in sub_nodes {
            self.nodes.insert(map_kind(&child), node);
        }
        let position = self
            .node_order
            .iter()
            .position(|n| n == id)
            .ok_or_else(|| flatten_err("subgraph vertex missing from registration order"))?;
        self.node_order.splice(position..=position, inlined_ids);

        for targets in self.plain.values_mut() {
            let mut rewritten = Vec::with_capacity(targets.len());
            for target in targets.drain(..) {
                if &target == id {
                    for e in &entry {
                        if !rewritten.contains(e) {
                            rewritten.push(e.clone());
                        }
                    }
                } else {
                    rewritten.push(target);
                }
            }
            *targets = rewritten;
        }
        for edge in self.conditional.values_mut() {
            for (_, target) in edge.mapping.iter_mut() {
                if target == id {
                    if entry.len() == 1 {
                        *target = entry[0].clone();
                    } else {
                        return Err(GraphError::SubgraphFlatten {
                            node: id.clone(),
                            reason: "conditional edge cannot target a multi-entry subgraph"
                                .to_string(),
                        });
                    }
                }
            }
        }

        // Subgraph plain edges, with `End` targets spliced onto the
        // parent continuation.
        for (child_src, child_targets) in sub_plain {
            if child_src.is_start() {
                continue;
            }
            let mapped_src = map_kind(&child_src);
            let mut mapped_targets: Vec<NodeKind> = Vec::new();
            let mut takes_conditional_exit = false;
            for target in &child_targets {
                if target.is_end() {
                    match (&continuation, &continuation_cond) {
                        (Some(cont), None) => {
                            for t in cont {
                                if !mapped_targets.contains(t) {
                                    mapped_targets.push(t.clone());
                                }
                            }
                        }
                        (None, Some(_)) => {
                            if child_targets.len() > 1 {
                                return Err(flatten_err(
                                    "parallel exit cannot take a conditional continuation",
                                ));
                            }
                            takes_conditional_exit = true;
                        }
                        // The builder enforces a single transition per
                        // source, so exactly one continuation exists here.
                        _ => return Err(flatten_err("subgraph continuation is ambiguous")),
                    }
                } else {
                    mapped_targets.push(map_kind(target));
                }
            }
            if takes_conditional_exit {
                if let Some(edge) = &continuation_cond {
                    self.conditional.insert(
                        mapped_src.clone(),
                        ConditionalEdge {
                            from: mapped_src,
                            condition: edge.condition.clone(),
                            mapping: edge.mapping.clone(),
                        },
                    );
                }
            } else if !mapped_targets.is_empty() {
                self.plain.insert(mapped_src, mapped_targets);
            }
        }

        // Subgraph conditional edges; a label that exits to `End` needs a
        // single direct continuation to re-target.
        for (child_src, edge) in sub_conditional {
            if child_src.is_start() {
                continue;
            }
            let mapped_src = map_kind(&child_src);
            let mut mapping = Vec::with_capacity(edge.mapping.len());
            for (label, target) in edge.mapping {
                let mapped_target = if target.is_end() {
                    match (&continuation, &continuation_cond) {
                        (Some(cont), None) if cont.len() == 1 => cont[0].clone(),
                        _ => {
                            return Err(flatten_err(
                                "subgraph conditional exit requires a single direct continuation",
                            ));
                        }
                    }
                } else {
                    map_kind(&target)
                };
                mapping.push((label, mapped_target));
            }
            self.conditional.insert(
                mapped_src.clone(),
                ConditionalEdge {
                    from: mapped_src,
                    condition: edge.condition,
                    mapping,
                },
            );
        }

        Ok(())
    }

    fn build_routes(&self) -> Result<FxHashMap<NodeKind, Route>, GraphError> {
        let mut routes: FxHashMap<NodeKind, Route> = FxHashMap::default();
        for (source, targets) in &self.plain {
            let route = if targets.len() == 1 {
                Route::Direct(targets[0].clone())
            } else {
                let join = self.parallel_join(source, targets)?;
                Route::Parallel {
                    branches: targets.clone(),
                    join,
                }
            };
            routes.insert(source.clone(), route);
        }
        for (source, edge) in &self.conditional {
            routes.insert(
                source.clone(),
                Route::Conditional {
                    condition: edge.condition.clone(),
                    mapping: edge.mapping.clone(),
                },
            );
        }
        Ok(routes)
    }

    /// Compute the join node a parallel fanout converges on.
    ///
    /// Every branch must be a regular node with a single direct edge, and
    /// all branch edges must agree on one target. This keeps the persisted
    /// `next` cursor single-valued and the fold order deterministic.
    fn parallel_join(
        &self,
        source: &NodeKind,
        branches: &[NodeKind],
    ) -> Result<NodeKind, GraphError> {
        let shape_err = |reason: String| GraphError::InvalidParallelShape {
            node: source.clone(),
            reason,
        };
        let mut join: Option<NodeKind> = None;
        for branch in branches {
            if !branch.is_custom() {
                return Err(shape_err(format!("branch `{branch}` is a virtual endpoint")));
            }
            if self.conditional.contains_key(branch) {
                return Err(shape_err(format!("branch `{branch}` routes conditionally")));
            }
            let Some(targets) = self.plain.get(branch) else {
                return Err(shape_err(format!("branch `{branch}` has no outgoing edge")));
            };
            if targets.len() != 1 {
                return Err(shape_err(format!("branch `{branch}` fans out again")));
            }
            match &join {
                None => join = Some(targets[0].clone()),
                Some(existing) if existing == &targets[0] => {}
                Some(existing) => {
                    return Err(shape_err(format!(
                        "branches diverge: `{existing}` vs `{}`",
                        targets[0]
                    )));
                }
            }
        }
        join.ok_or_else(|| shape_err("fanout has no branches".to_string()))
    }
}

/// Opaque node wrapping an already-compiled graph.
///
/// The nested graph runs on its own thread id against the parent's state
/// snapshot; its final state replaces the touched keys wholesale (appender
/// keys use `ReplaceAll` so the nested sequence is not re-appended).
pub(super) struct CompiledSubgraphNode {
    graph: CompiledGraph,
    registry: ChannelRegistry,
}

impl CompiledSubgraphNode {
    pub(super) fn new(graph: CompiledGraph, registry: ChannelRegistry) -> Self {
        Self { graph, registry }
    }
}

#[async_trait]
impl Node for CompiledSubgraphNode {
    async fn run(&self, snapshot: StateData, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let config = RunConfig {
            metadata: (*ctx.metadata).clone(),
            ..RunConfig::default()
        };
        let final_state = self
            .graph
            .invoke(snapshot, config)
            .await
            .map_err(|err| NodeError::Subgraph {
                message: err.to_string(),
            })?;
        let mut update = StateUpdate::default();
        for (key, value) in final_state {
            let entry = match value {
                Value::Array(items) if self.registry.is_appender(&key) => {
                    UpdateValue::ReplaceAll(items)
                }
                other => UpdateValue::Value(other),
            };
            update.insert(key, entry);
        }
        Ok(NodePartial { update, goto: None })
    }
}
