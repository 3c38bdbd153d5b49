//! Runtime infrastructure: the step-loop engine, checkpoint persistence,
//! and invocation configuration.
//!
//! The runtime layer is what a [`CompiledGraph`](crate::app::CompiledGraph)
//! delegates to when it runs:
//!
//! - **[`StepLoop`](runner) (crate-internal)** - the per-invocation engine
//! - **[`CheckpointSaver`]** - pluggable per-thread checkpoint logs
//! - **[`StateSerializer`]** - opaque byte codec for persisted state
//! - **[`CompileConfig`] / [`RunConfig`]** - compile-time and per-run settings
//! - **[`SnapshotStream`]** - the lazy sequence of emitted snapshots
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use stategraph::runtimes::{CompileConfig, InMemorySaver, RunConfig};
//! use std::sync::Arc;
//!
//! # async fn example(graph: stategraph::graphs::StateGraph) -> Result<(), Box<dyn std::error::Error>> {
//! let compiled = graph.compile(
//!     CompileConfig::new().with_saver(Arc::new(InMemorySaver::new())),
//! )?;
//!
//! let config = RunConfig::new().with_thread_id("thread-1");
//! let final_state = compiled.invoke(Default::default(), config).await?;
//! # let _ = final_state;
//! # Ok(())
//! # }
//! ```

pub mod checkpointer;
pub mod persistence;
pub mod runner;
pub mod runtime_config;
pub mod streaming;

pub use checkpointer::{Checkpoint, CheckpointSaver, InMemorySaver, SaverError};
pub use persistence::{JsonStateSerializer, StateSerializer};
pub use runner::RunnerError;
pub use runtime_config::{CancelToken, CompileConfig, RunConfig};
pub use streaming::SnapshotStream;
