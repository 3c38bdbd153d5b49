#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use stategraph::channels::{AppenderChannel, ChannelRegistry, LastValueChannel};
use stategraph::reducers::SumNumbers;
use stategraph::runtimes::{CompileConfig, InMemorySaver};
use stategraph::state::StateData;

/// Schema with a `count` key: overwrite, default 0.
pub fn count_schema() -> ChannelRegistry {
    ChannelRegistry::new().with_channel("count", LastValueChannel::new().with_default(|| json!(0)))
}

/// Schema with a `count` key folded through a sum reducer, default 0.
pub fn sum_schema() -> ChannelRegistry {
    ChannelRegistry::new().with_channel(
        "count",
        LastValueChannel::new()
            .with_default(|| json!(0))
            .with_reducer(Arc::new(SumNumbers)),
    )
}

/// Schema with a `msgs` key: appender rejecting duplicates, default `[]`.
pub fn msgs_schema() -> ChannelRegistry {
    ChannelRegistry::new()
        .with_channel("msgs", AppenderChannel::reject_duplicates().with_empty_default())
}

/// Build a state from literal key/value pairs.
pub fn state_with(pairs: &[(&str, Value)]) -> StateData {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Compile config backed by a shared in-memory saver; the saver handle is
/// returned so tests can inspect the checkpoint log directly.
pub fn memory_saver_config() -> (Arc<InMemorySaver>, CompileConfig) {
    let saver = Arc::new(InMemorySaver::new());
    let config = CompileConfig::new().with_saver(saver.clone());
    (saver, config)
}
