//! Node execution contract for the stategraph workflow engine.
//!
//! This module provides the core abstractions for executable workflow nodes:
//! the [`Node`] trait, the execution context handed to every dispatch, the
//! [`NodePartial`] update a node returns, and the error type for fatal node
//! failures. Closure adapters ([`node_fn`], [`sync_node_fn`]) lift plain
//! functions into node trait objects so callers rarely implement the trait
//! by hand.
//!
//! # Design Principles
//!
//! - **Stateless**: nodes should be stateless and deterministic
//! - **Immutable input**: each dispatch receives an owned state snapshot;
//!   the live state is never exposed
//! - **Partial output**: a node describes only the keys it wants to change;
//!   the engine folds the partial through the schema's channels
//!
//! # Examples
//!
//! ```rust
//! use stategraph::node::{Node, NodeContext, NodeError, NodePartial};
//! use stategraph::state::StateData;
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct Tagger;
//!
//! #[async_trait]
//! impl Node for Tagger {
//!     async fn run(&self, snapshot: StateData, _ctx: NodeContext) -> Result<NodePartial, NodeError> {
//!         if !snapshot.contains_key("input") {
//!             return Err(NodeError::MissingInput { what: "input" });
//!         }
//!         Ok(NodePartial::new().with_entry("tagged", json!(true)))
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::state::{StateData, StateUpdate, UpdateValue};
use crate::types::NodeKind;

// ============================================================================
// Core Trait
// ============================================================================

/// A single unit of computation within a workflow.
///
/// Nodes receive an owned snapshot of the current state plus their execution
/// context, perform their work, and return a [`NodePartial`] describing the
/// state keys they want to change. Returning `Err` is fatal to the
/// invocation; the engine performs no retries.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against the given state snapshot.
    async fn run(&self, snapshot: StateData, ctx: NodeContext) -> Result<NodePartial, NodeError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution context passed to nodes and routing conditions.
///
/// Carries the node's identity, the current step number, and the
/// invocation's thread id and caller-supplied metadata.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// The node being dispatched (or the routing source, for conditions).
    pub node: NodeKind,
    /// Current execution step number (1-based; routing from `Start` is step 0).
    pub step: u64,
    /// The invocation's thread identifier.
    pub thread_id: String,
    /// Caller-supplied metadata from the run configuration.
    pub metadata: Arc<FxHashMap<String, Value>>,
}

// ============================================================================
// State Updates
// ============================================================================

/// The partial result a node returns: a state update plus an optional
/// routing hint.
///
/// When `goto` is set, the engine uses it at the next routing step instead
/// of evaluating the node's conditional edge (the label must appear in the
/// edge's mapping) or, for a plain target, jumps straight to that node.
///
/// # Examples
///
/// ```rust
/// use stategraph::node::NodePartial;
/// use stategraph::state::UpdateValue;
/// use serde_json::json;
///
/// // Overwrite one key.
/// let partial = NodePartial::new().with_entry("status", json!("done"));
///
/// // Append to a sequence and steer routing.
/// let partial = NodePartial::new()
///     .with_entry("msgs", UpdateValue::append(json!("step complete")))
///     .with_goto("finalize");
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    /// Keys this node wants to change, in the update algebra's vocabulary.
    pub update: StateUpdate,
    /// Optional next-node directive honored at the following routing step.
    pub goto: Option<String>,
}

impl NodePartial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole update map.
    #[must_use]
    pub fn with_update(mut self, update: StateUpdate) -> Self {
        self.update = update;
        self
    }

    /// Add one update entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<UpdateValue>) -> Self {
        self.update.insert(key.into(), value.into());
        self
    }

    /// Set the routing hint.
    #[must_use]
    pub fn with_goto(mut self, target: impl Into<String>) -> Self {
        self.goto = Some(target.into());
        self
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Fatal errors raised by node execution.
///
/// Any `NodeError` terminates the invocation; the engine wraps it with the
/// failing node's id before surfacing it to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stategraph::node::missing_input),
        help("Check that an upstream node produced the required key: {what}.")
    )]
    MissingInput { what: &'static str },

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(stategraph::node::validation),
        help("Check input data format and required fields.")
    )]
    ValidationFailed(String),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(stategraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// A nested compiled subgraph failed.
    #[error("subgraph execution failed: {message}")]
    #[diagnostic(code(stategraph::node::subgraph))]
    Subgraph { message: String },

    /// Any other node-specific failure.
    #[error("{0}")]
    #[diagnostic(code(stategraph::node::other))]
    Other(String),
}

// ============================================================================
// Closure Adapters
// ============================================================================

/// Boxed future returned by adapted node closures.
pub type NodeFuture = BoxFuture<'static, Result<NodePartial, NodeError>>;

struct FnNode {
    f: Box<dyn Fn(StateData, NodeContext) -> NodeFuture + Send + Sync>,
}

#[async_trait]
impl Node for FnNode {
    async fn run(&self, snapshot: StateData, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        (self.f)(snapshot, ctx).await
    }
}

/// Lift an async closure into a [`Node`] trait object.
///
/// ```rust
/// use stategraph::node::{node_fn, NodePartial};
/// use serde_json::json;
///
/// let greeter = node_fn(|_snapshot, _ctx| async move {
///     Ok(NodePartial::new().with_entry("greeting", json!("hello")))
/// });
/// ```
pub fn node_fn<F, Fut>(f: F) -> Arc<dyn Node>
where
    F: Fn(StateData, NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodePartial, NodeError>> + Send + 'static,
{
    Arc::new(FnNode {
        f: Box::new(move |snapshot, ctx| Box::pin(f(snapshot, ctx))),
    })
}

/// Lift a synchronous closure into a [`Node`] trait object.
///
/// The body runs inline when the node is dispatched; its return value (or
/// error) completes the node's future. Purely a convenience layer; the
/// engine only ever sees futures.
pub fn sync_node_fn<F>(f: F) -> Arc<dyn Node>
where
    F: Fn(StateData, NodeContext) -> Result<NodePartial, NodeError> + Send + Sync + 'static,
{
    node_fn(move |snapshot, ctx| std::future::ready(f(snapshot, ctx)))
}
