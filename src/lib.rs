//! # Stategraph: Stateful Graph Execution Engine
//!
//! Stategraph orchestrates multi-step agent-style workflows as directed
//! graphs of async computations over a shared, keyed state. A caller
//! declares nodes and edges (plain, parallel fanout, or conditional),
//! compiles the declaration, and drives it with an initial input; the
//! engine advances the state step by step until the terminal sentinel,
//! yielding a lazy sequence of state snapshots along the way.
//!
//! ## Core Concepts
//!
//! - **State**: an immutable keyed mapping flowing through the graph
//! - **Channels**: per-key update policies (defaults, reducers, appenders)
//! - **Nodes**: async units of work returning partial state updates
//! - **Edges**: declared transitions, including conditional label routing
//! - **Commands**: routing directives bundling an update with a jump
//! - **Checkpoints**: per-thread logs enabling interruption and resumption
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stategraph::channels::{ChannelRegistry, LastValueChannel};
//! use stategraph::graphs::StateGraph;
//! use stategraph::node::{node_fn, NodePartial};
//! use stategraph::runtimes::{CompileConfig, RunConfig};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = ChannelRegistry::new()
//!     .with_channel("count", LastValueChannel::new().with_default(|| json!(0)));
//!
//! let compiled = StateGraph::new(schema)
//!     .add_node_arc("bump", node_fn(|snapshot, _ctx| async move {
//!         let count = snapshot.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(NodePartial::new().with_entry("count", json!(count + 1)))
//!     }))?
//!     .add_edge("__START__", "bump")?
//!     .add_edge("bump", "__END__")?
//!     .compile(CompileConfig::default())?;
//!
//! let final_state = compiled.invoke(Default::default(), RunConfig::new()).await?;
//! assert_eq!(final_state.get("count"), Some(&json!(1)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming and Interruption
//!
//! [`CompiledGraph::stream`](app::CompiledGraph::stream) yields one
//! snapshot per executed node, in step order. With a checkpoint saver
//! configured, interrupt points pause the run between steps; the last
//! snapshot carries the resume cursor, and re-invoking with that cursor
//! continues exactly where the run stopped.
//!
//! ## Module Guide
//!
//! - [`state`] - keyed state, update sentinels, snapshots
//! - [`channels`] - per-key update policies and the schema registry
//! - [`reducers`] - stock binary merge functions
//! - [`node`] - the node contract and closure adapters
//! - [`command`] - routing directives and conditional deciders
//! - [`graphs`] - graph building, validation, and compilation
//! - [`app`] - the compiled, runnable graph
//! - [`runtimes`] - the step-loop engine, checkpointing, configs
//! - [`render`] - textual diagram projections
//! - [`telemetry`] - tracing subscriber setup

pub mod app;
pub mod channels;
pub mod command;
pub mod graphs;
pub mod node;
pub mod reducers;
pub mod render;
pub mod runtimes;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;
