//! Graph definition, validation, and compilation.
//!
//! The main entry point is [`StateGraph`], a fluent builder for declaring
//! nodes, plain and conditional edges, and nested subgraphs over a channel
//! schema. Calling [`StateGraph::compile`] flattens subgraphs, runs the
//! structural validator, and lowers the declaration into an executable
//! [`CompiledGraph`](crate::app::CompiledGraph).
//!
//! # Core Concepts
//!
//! - **Nodes**: executable units implementing [`Node`](crate::node::Node)
//! - **Edges**: one transition per source: direct, parallel fanout, or
//!   conditional with a label mapping
//! - **Virtual endpoints**: `NodeKind::Start` / `NodeKind::End` frame the
//!   topology but never execute
//! - **Subgraphs**: uncompiled graphs are flattened into the parent at
//!   compile time; already-compiled graphs run as opaque nested nodes
//!
//! # Quick Start
//!
//! ```rust
//! use stategraph::channels::ChannelRegistry;
//! use stategraph::graphs::StateGraph;
//! use stategraph::node::{node_fn, NodePartial};
//! use stategraph::runtimes::CompileConfig;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), stategraph::graphs::GraphError> {
//! let compiled = StateGraph::new(ChannelRegistry::new())
//!     .add_node_arc("work", node_fn(|_s, _c| async move {
//!         Ok(NodePartial::new().with_entry("done", json!(true)))
//!     }))?
//!     .add_edge("__START__", "work")?
//!     .add_edge("work", "__END__")?
//!     .compile(CompileConfig::default())?;
//! # let _ = compiled;
//! # Ok(())
//! # }
//! ```

mod builder;
mod compilation;
mod edges;
mod validation;

#[cfg(test)]
mod tests;

pub use builder::StateGraph;
pub use edges::{ConditionMapping, ConditionalEdge, PlainEdges, Route};

use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeKind;

/// Configuration errors raised while building, validating, or compiling a
/// graph. All of them are caller mistakes; none can occur at run time.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A node id was empty or collided with a reserved encoding.
    #[error("invalid node id: `{id}`")]
    #[diagnostic(
        code(stategraph::graph::invalid_node_id),
        help("Node ids must be non-empty and may not use the reserved `__START__`/`__END__` forms.")
    )]
    InvalidNodeId { id: String },

    /// `Start` or `End` was used where a real node is required.
    #[error("`{id}` is a virtual endpoint and cannot be registered as a node")]
    #[diagnostic(code(stategraph::graph::reserved_node))]
    ReservedNode { id: NodeKind },

    /// The same node id was registered twice.
    #[error("duplicate node: `{id}`")]
    #[diagnostic(code(stategraph::graph::duplicate_node))]
    DuplicateNode { id: NodeKind },

    /// An edge was declared with `End` as its source.
    #[error("`__END__` cannot be the source of an edge")]
    #[diagnostic(code(stategraph::graph::edge_from_end))]
    EdgeFromEnd,

    /// An edge was declared with `Start` as its target.
    #[error("`__START__` cannot be the target of an edge (source: `{node}`)")]
    #[diagnostic(code(stategraph::graph::edge_to_start))]
    EdgeToStart { node: NodeKind },

    /// A conditional edge was declared with an empty mapping.
    #[error("conditional edge from `{node}` has an empty mapping")]
    #[diagnostic(
        code(stategraph::graph::empty_mapping),
        help("Provide at least one label → target pair.")
    )]
    EmptyMapping { node: NodeKind },

    /// A second conditional edge was declared for the same source.
    #[error("node `{node}` already has a conditional edge")]
    #[diagnostic(code(stategraph::graph::duplicate_conditional))]
    DuplicateConditionalEdge { node: NodeKind },

    /// A source mixes plain and conditional edges.
    #[error("node `{node}` cannot carry both plain and conditional edges")]
    #[diagnostic(
        code(stategraph::graph::conditional_on_parallel),
        help("A parallel fanout must consist of direct targets only; route conditionally from a dedicated node instead.")
    )]
    ConditionalOnParallel { node: NodeKind },

    /// No edge leaves `Start`.
    #[error("graph has no entry point (no edge from `__START__`)")]
    #[diagnostic(code(stategraph::graph::missing_entry_point))]
    MissingEntryPoint,

    /// An edge references a target that is neither a node nor `End`.
    #[error("edge from `{node}` targets unknown node `{target}`")]
    #[diagnostic(code(stategraph::graph::dangling_target))]
    DanglingTarget { node: NodeKind, target: NodeKind },

    /// An edge leaves a source that was never registered.
    #[error("edge declared from unknown node `{node}`")]
    #[diagnostic(code(stategraph::graph::unknown_source))]
    UnknownSource { node: NodeKind },

    /// A parallel fanout lists the same target twice.
    #[error("parallel edge from `{node}` lists target `{target}` more than once")]
    #[diagnostic(code(stategraph::graph::duplicate_parallel_target))]
    DuplicateParallelTarget { node: NodeKind, target: NodeKind },

    /// A parallel fanout's branches cannot be dispatched and rejoined.
    #[error("invalid parallel fanout from `{node}`: {reason}")]
    #[diagnostic(
        code(stategraph::graph::invalid_parallel_shape),
        help("Every branch of a fanout must be a regular node with a direct edge, and all branches must converge on the same join node.")
    )]
    InvalidParallelShape { node: NodeKind, reason: String },

    /// An interrupt list names a node that does not exist.
    #[error("interrupt configuration names unknown node `{node}`")]
    #[diagnostic(code(stategraph::graph::unknown_interrupt_node))]
    UnknownInterruptNode { node: NodeKind },

    /// A subgraph could not be inlined into its parent.
    #[error("cannot flatten subgraph `{node}`: {reason}")]
    #[diagnostic(code(stategraph::graph::subgraph_flatten))]
    SubgraphFlatten { node: NodeKind, reason: String },
}
