//! Checkpoint persistence: the pluggable saver contract and the in-memory
//! implementation.
//!
//! Checkpoints form a per-thread append-only log; "latest" is defined by
//! insertion order. The engine persists one checkpoint per step, and resume
//! reads either a specific checkpoint id or the latest entry of the thread.
//! Durable backends (databases, object stores) implement [`CheckpointSaver`]
//! outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::id_generator::IdGenerator;

/// A durable record of one engine step.
///
/// `node` and `next_node` use the [`NodeKind`](crate::types::NodeKind)
/// string encoding; `state` is opaque bytes produced by the configured
/// [`StateSerializer`](super::persistence::StateSerializer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Unique checkpoint identifier, generated at construction.
    pub id: String,
    /// The node whose output this checkpoint captures.
    pub node: String,
    /// Cursor for resumption: the node to dispatch next, absent when the
    /// run reached `End`.
    pub next_node: Option<String>,
    /// Serialized state bytes.
    pub state: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint with a generated id and the current timestamp.
    #[must_use]
    pub fn new(node: String, next_node: Option<String>, state: Vec<u8>) -> Self {
        Self {
            id: IdGenerator::new().generate_checkpoint_id(),
            node,
            next_node,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Errors from checkpoint saver operations.
#[derive(Debug, Error, Diagnostic)]
pub enum SaverError {
    /// The thread has no checkpoint log.
    #[error("thread not found: {thread_id}")]
    #[diagnostic(
        code(stategraph::saver::not_found),
        help("Ensure the thread id `{thread_id}` is correct and the thread has been run at least once.")
    )]
    NotFound { thread_id: String },

    /// Backend storage error (database, filesystem, network, ...).
    #[error("backend error: {message}")]
    #[diagnostic(
        code(stategraph::saver::backend),
        help("Check backend connectivity and permissions; backend message: {message}.")
    )]
    Backend { message: String },

    /// State bytes could not be encoded or decoded.
    #[error("state codec error: {message}")]
    #[diagnostic(code(stategraph::saver::codec))]
    Codec { message: String },
}

pub type Result<T> = std::result::Result<T, SaverError>;

/// Pluggable storage for checkpoint logs.
///
/// # Contract
///
/// - `put` appends to the thread's log and returns the checkpoint id;
///   saving an id that already exists replaces that entry in place
/// - `get` with `None` returns the latest entry; with an id, that entry
/// - `list` returns the log in insertion order
/// - `delete` removes one entry; deleting an unknown id is a no-op
/// - `release` drops the whole log (backs the `release_thread` compile flag)
///
/// Implementations must be `Send + Sync`; concurrent access to different
/// threads must not interfere, and per-thread ordering is the only ordering
/// the store provides.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Append a checkpoint to the thread's log, returning its id.
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<String>;

    /// Fetch a checkpoint: a specific id, or the latest when `None`.
    async fn get(&self, thread_id: &str, checkpoint_id: Option<&str>)
    -> Result<Option<Checkpoint>>;

    /// The thread's full log in insertion order.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;

    /// Remove one checkpoint from the thread's log.
    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<()>;

    /// Drop the thread's log entirely. Unknown threads are a no-op.
    async fn release(&self, thread_id: &str) -> Result<()>;
}

/// Volatile, process-local saver. Suitable for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemorySaver {
    inner: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemorySaver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointSaver for InMemorySaver {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<String> {
        let id = checkpoint.id.clone();
        let mut map = self.inner.write();
        let log = map.entry(thread_id.to_string()).or_default();
        match log.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => *existing = checkpoint,
            None => log.push(checkpoint),
        }
        Ok(id)
    }

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>> {
        let map = self.inner.read();
        let Some(log) = map.get(thread_id) else {
            return Ok(None);
        };
        Ok(match checkpoint_id {
            Some(id) => log.iter().find(|cp| cp.id == id).cloned(),
            None => log.last().cloned(),
        })
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let map = self.inner.read();
        Ok(map.get(thread_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<()> {
        let mut map = self.inner.write();
        let log = map.get_mut(thread_id).ok_or_else(|| SaverError::NotFound {
            thread_id: thread_id.to_string(),
        })?;
        log.retain(|cp| cp.id != checkpoint_id);
        Ok(())
    }

    async fn release(&self, thread_id: &str) -> Result<()> {
        self.inner.write().remove(thread_id);
        Ok(())
    }
}
