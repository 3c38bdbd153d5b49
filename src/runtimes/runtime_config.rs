//! Compile-time and per-invocation configuration.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::checkpointer::CheckpointSaver;
use super::persistence::{JsonStateSerializer, StateSerializer};
use crate::types::NodeKind;
use crate::utils::id_generator::IdGenerator;

/// Settings baked into a compiled graph.
///
/// The saver and the interrupt sets are compile-time concerns: they shape
/// where the engine persists and pauses, which the validator checks against
/// the topology.
#[derive(Clone)]
pub struct CompileConfig {
    /// Checkpoint store; `None` disables persistence (and resuming).
    pub saver: Option<Arc<dyn CheckpointSaver>>,
    /// Byte codec for persisted state. Defaults to JSON.
    pub serializer: Arc<dyn StateSerializer>,
    /// Pause before dispatching any of these nodes.
    pub interrupt_before: Vec<NodeKind>,
    /// Pause after merging the output of any of these nodes.
    pub interrupt_after: Vec<NodeKind>,
    /// Drop the thread's checkpoint log once an uninterrupted run reaches
    /// `End`.
    pub release_thread: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            saver: None,
            serializer: Arc::new(JsonStateSerializer),
            interrupt_before: Vec::new(),
            interrupt_after: Vec::new(),
            release_thread: false,
        }
    }
}

impl CompileConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a checkpoint saver.
    #[must_use]
    pub fn with_saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.saver = Some(saver);
        self
    }

    /// Replace the state serializer.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Arc<dyn StateSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Pause before dispatching the listed nodes.
    #[must_use]
    pub fn with_interrupt_before<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeKind>,
    {
        self.interrupt_before = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Pause after merging the listed nodes' output.
    #[must_use]
    pub fn with_interrupt_after<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeKind>,
    {
        self.interrupt_after = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Release the thread's checkpoint log after a completed run.
    #[must_use]
    pub fn with_release_thread(mut self, release: bool) -> Self {
        self.release_thread = release;
        self
    }
}

/// Cooperative cancellation signal shared between a caller and a running
/// invocation.
///
/// The engine checks the token at step boundaries: once cancelled, it lets
/// the current step's in-flight futures settle, skips the step's checkpoint,
/// and terminates with a distinct `Cancelled` status. Node bodies that want
/// finer granularity can check the token themselves via the run config.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation configuration.
///
/// A fresh config gets a generated thread id. Passing a config whose
/// `checkpoint_id` or `next_node` is set resumes the thread from its
/// checkpoint log instead of starting over; [`StateSnapshot`]s emitted by an
/// interrupted run carry exactly that resume cursor.
///
/// [`StateSnapshot`]: crate::state::StateSnapshot
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Identifies the checkpoint log this invocation appends to.
    pub thread_id: String,
    /// Resume from this checkpoint (latest when `None` but `next_node` set).
    pub checkpoint_id: Option<String>,
    /// Node to dispatch on resume; overrides the checkpoint's own cursor.
    pub next_node: Option<NodeKind>,
    /// Caller-supplied metadata surfaced to nodes via their context.
    pub metadata: FxHashMap<String, Value>,
    /// Cooperative cancellation signal.
    pub cancel: CancelToken,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_id: IdGenerator::new().generate_thread_id(),
            checkpoint_id: None,
            next_node: None,
            metadata: FxHashMap::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    #[must_use]
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    #[must_use]
    pub fn with_next_node(mut self, next_node: impl Into<NodeKind>) -> Self {
        self.next_node = Some(next_node.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}
