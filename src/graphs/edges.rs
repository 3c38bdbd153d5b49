//! Edge types for declared transitions and compiled routing.
//!
//! A source node owns at most one transition: either a plain edge (one
//! target, or several for a parallel fanout) or a conditional edge whose
//! decider maps labels to targets. The compiler lowers both into [`Route`]
//! entries consumed by the execution engine.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::command::CommandAction;
use crate::types::NodeKind;

/// Label → target pairs of a conditional edge, in declaration order.
///
/// Kept as an ordered list rather than a hash map so renderings and
/// validation reports are deterministic; lookups scan linearly, which is
/// fine at mapping sizes.
pub type ConditionMapping = Vec<(String, NodeKind)>;

/// A conditional edge: an async decider plus the mapping its labels resolve
/// through.
///
/// At routing time the decider receives the current state snapshot and
/// returns a [`Command`](crate::command::Command); the command's label must
/// be a key of the mapping, and its update is applied before the jump.
#[derive(Clone)]
pub struct ConditionalEdge {
    /// The source node for this conditional edge.
    pub from: NodeKind,
    /// The async decider evaluated against the current state.
    pub condition: Arc<dyn CommandAction>,
    /// Label → target mapping, in declaration order.
    pub mapping: ConditionMapping,
}

impl ConditionalEdge {
    /// Look up the target a label resolves to.
    #[must_use]
    pub fn target_for(&self, label: &str) -> Option<&NodeKind> {
        self.mapping
            .iter()
            .find(|(candidate, _)| candidate == label)
            .map(|(_, target)| target)
    }
}

/// A compiled transition, one per source node.
#[derive(Clone)]
pub enum Route {
    /// Single direct successor.
    Direct(NodeKind),
    /// Parallel fanout: the branches are dispatched concurrently on the same
    /// input state and their updates are folded in declaration order, after
    /// which control converges on `join`.
    Parallel {
        branches: Vec<NodeKind>,
        join: NodeKind,
    },
    /// Conditional routing through a label mapping.
    Conditional {
        condition: Arc<dyn CommandAction>,
        mapping: ConditionMapping,
    },
}

impl Route {
    /// Look up the target a conditional label resolves to.
    #[must_use]
    pub fn target_for(&self, label: &str) -> Option<&NodeKind> {
        match self {
            Route::Conditional { mapping, .. } => mapping
                .iter()
                .find(|(candidate, _)| candidate == label)
                .map(|(_, target)| target),
            _ => None,
        }
    }

    /// Every target this route can reach, in declaration order.
    #[must_use]
    pub fn targets(&self) -> Vec<&NodeKind> {
        match self {
            Route::Direct(target) => vec![target],
            Route::Parallel { branches, .. } => branches.iter().collect(),
            Route::Conditional { mapping, .. } => {
                mapping.iter().map(|(_, target)| target).collect()
            }
        }
    }
}

/// Plain edges of a graph under construction: one target list per source.
///
/// A single entry is a direct edge; multiple entries form a parallel fanout.
/// Two edge records are considered the same edge when their sources match,
/// which is why `add_edge` appends rather than inserting a second record.
pub type PlainEdges = FxHashMap<NodeKind, Vec<NodeKind>>;
