//! Identifier generation for threads and checkpoints.

use uuid::Uuid;

/// Generates the opaque ids the runtime hands out.
///
/// Ids are UUIDv4-based: unique without coordination, safe to use as store
/// keys, and carrying no ordering semantics (checkpoint ordering comes from
/// the log, not the id).
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fresh thread id, prefixed for readability in logs and stores.
    #[must_use]
    pub fn generate_thread_id(&self) -> String {
        format!("thread-{}", Uuid::new_v4())
    }

    /// Fresh checkpoint id.
    #[must_use]
    pub fn generate_checkpoint_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
