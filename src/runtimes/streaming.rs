//! Snapshot streaming for workflow invocations.
//!
//! [`CompiledGraph::stream`](crate::app::CompiledGraph::stream) drives the
//! step loop on a background task and hands back a [`SnapshotStream`]: a
//! lazy sequence of [`StateSnapshot`]s delivered through a channel. The
//! stream ends when the run completes, pauses at an interrupt, or fails;
//! a failure is delivered as the final `Err` item.

use futures_util::Stream;
use tokio::task::JoinHandle;

use super::runner::RunnerError;
use crate::state::StateSnapshot;

/// Lazy sequence of snapshots emitted by a running invocation.
///
/// Dropping the stream does not abort the invocation immediately; the step
/// loop notices the closed channel at its next emission and winds down
/// without persisting further checkpoints.
pub struct SnapshotStream {
    rx: flume::Receiver<Result<StateSnapshot, RunnerError>>,
    _handle: JoinHandle<()>,
}

impl SnapshotStream {
    pub(crate) fn new(
        rx: flume::Receiver<Result<StateSnapshot, RunnerError>>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            _handle: handle,
        }
    }

    /// Await the next snapshot; `None` once the run has ended.
    pub async fn next(&mut self) -> Option<Result<StateSnapshot, RunnerError>> {
        self.rx.recv_async().await.ok()
    }

    /// Consume the stream, collecting every snapshot.
    ///
    /// Returns the snapshots emitted before the terminal condition; a run
    /// failure surfaces as the `Err` with the snapshots already consumed
    /// discarded.
    pub async fn drain(mut self) -> Result<Vec<StateSnapshot>, RunnerError> {
        let mut snapshots = Vec::new();
        while let Some(item) = self.next().await {
            snapshots.push(item?);
        }
        Ok(snapshots)
    }

    /// Convert into a [`futures_util::Stream`] of snapshot results.
    pub fn into_stream(self) -> impl Stream<Item = Result<StateSnapshot, RunnerError>> {
        self.rx.into_stream()
    }
}
