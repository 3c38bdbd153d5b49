#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use stategraph::node::{Node, NodeError, NodePartial, node_fn};
use stategraph::state::UpdateValue;

/// Node that overwrites one key with a fixed value.
pub fn static_node(key: &str, value: Value) -> Arc<dyn Node> {
    let key = key.to_string();
    node_fn(move |_snapshot, _ctx| {
        let key = key.clone();
        let value = value.clone();
        async move { Ok(NodePartial::new().with_entry(key, value)) }
    })
}

/// Node that appends one element to a sequence key.
pub fn append_node(key: &str, value: Value) -> Arc<dyn Node> {
    let key = key.to_string();
    node_fn(move |_snapshot, _ctx| {
        let key = key.clone();
        let value = value.clone();
        async move { Ok(NodePartial::new().with_entry(key, UpdateValue::append(value))) }
    })
}

/// Node that always fails with the given message.
pub fn failing_node(message: &str) -> Arc<dyn Node> {
    let message = message.to_string();
    node_fn(move |_snapshot, _ctx| {
        let message = message.clone();
        async move { Err(NodeError::Other(message)) }
    })
}

/// Node that records its name into a shared log and returns no update.
pub fn recording_node(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Node> {
    let name = name.to_string();
    node_fn(move |_snapshot, _ctx| {
        let name = name.clone();
        let log = log.clone();
        async move {
            log.lock().push(name);
            Ok(NodePartial::new())
        }
    })
}

/// Node that sleeps before overwriting a key, for ordering and
/// cancellation tests.
pub fn slow_node(key: &str, value: Value, delay: Duration) -> Arc<dyn Node> {
    let key = key.to_string();
    node_fn(move |_snapshot, _ctx| {
        let key = key.clone();
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(NodePartial::new().with_entry(key, value))
        }
    })
}
