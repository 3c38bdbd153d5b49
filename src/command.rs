//! Routing directives emitted by conditional edges and command nodes.
//!
//! A [`Command`] bundles an optional next-node label with an optional state
//! update. Routing intent is kept separate from node output so the engine
//! can apply the update deterministically before the jump is taken; the
//! label is resolved against the conditional edge's mapping and an unmapped
//! label is a terminal routing error.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::node::{NodeContext, NodeError};
use crate::state::{StateData, StateUpdate, UpdateValue};

/// Reserved state key used by command-node sugar to stage the chosen label
/// between the node's merge and the following routing step. The installed
/// conditional edge reads the key and scrubs it, so it never survives a
/// routing round.
pub(crate) const GOTO_KEY: &str = "__goto__";

/// Routing directive: an optional jump label plus an optional state update.
///
/// An empty command (no label, empty update) is a no-op; the engine treats
/// it as "no routing decision" and fails routing if a decision was required.
#[derive(Clone, Debug, Default)]
pub struct Command {
    /// Label to jump to, resolved through the conditional edge's mapping.
    pub goto: Option<String>,
    /// State update applied before the jump is taken.
    pub update: StateUpdate,
}

impl Command {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to the given label.
    #[must_use]
    pub fn goto(label: impl Into<String>) -> Self {
        Self {
            goto: Some(label.into()),
            update: StateUpdate::default(),
        }
    }

    /// Set the jump label.
    #[must_use]
    pub fn with_goto(mut self, label: impl Into<String>) -> Self {
        self.goto = Some(label.into());
        self
    }

    /// Replace the update map.
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

    /// Returns `true` when the command carries neither a label nor an update.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.goto.is_none() && self.update.is_empty()
    }
}

/// Async decider attached to a conditional edge (or wrapped by a command
/// node). Receives the same immutable snapshot a node would.
#[async_trait]
pub trait CommandAction: Send + Sync {
    async fn decide(&self, snapshot: StateData, ctx: NodeContext) -> Result<Command, NodeError>;
}

/// Boxed future returned by adapted command closures.
pub type CommandFuture = BoxFuture<'static, Result<Command, NodeError>>;

struct FnCommandAction {
    f: Box<dyn Fn(StateData, NodeContext) -> CommandFuture + Send + Sync>,
}

#[async_trait]
impl CommandAction for FnCommandAction {
    async fn decide(&self, snapshot: StateData, ctx: NodeContext) -> Result<Command, NodeError> {
        (self.f)(snapshot, ctx).await
    }
}

/// Lift an async closure into a [`CommandAction`] trait object.
///
/// ```rust
/// use stategraph::command::{command_fn, Command};
///
/// let route = command_fn(|snapshot, _ctx| async move {
///     let label = if snapshot.contains_key("error") { "retry" } else { "done" };
///     Ok(Command::goto(label))
/// });
/// ```
pub fn command_fn<F, Fut>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(StateData, NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Command, NodeError>> + Send + 'static,
{
    Arc::new(FnCommandAction {
        f: Box::new(move |snapshot, ctx| Box::pin(f(snapshot, ctx))),
    })
}

/// Lift a synchronous closure into a [`CommandAction`] trait object.
pub fn sync_command_fn<F>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(StateData, NodeContext) -> Result<Command, NodeError> + Send + Sync + 'static,
{
    command_fn(move |snapshot, ctx| std::future::ready(f(snapshot, ctx)))
}
