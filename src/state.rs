//! Keyed workflow state and the update vocabulary that drives it.
//!
//! State is a flat mapping from string keys to JSON values. Nodes never see
//! the live mapping: each dispatch receives an owned snapshot clone, and every
//! merge round produces a fresh mapping, so a step can always be replayed from
//! its inputs.
//!
//! Partial updates speak a small algebra encoded by [`UpdateValue`]:
//! plain values overwrite (or feed the key's reducer), [`UpdateValue::Reset`]
//! restores the key's channel default, [`UpdateValue::Remove`] deletes the key,
//! and the appender-only operations ([`UpdateValue::Append`],
//! [`UpdateValue::ReplaceAll`], [`UpdateValue::RemoveWhere`]) manipulate
//! ordered sequences. The sentinels are plain enum variants rather than magic
//! values, so they can never collide with legitimate data and never survive a
//! merge round.
//!
//! # Examples
//!
//! ```rust
//! use stategraph::state::{StateUpdate, UpdateValue};
//! use serde_json::json;
//!
//! let mut update = StateUpdate::default();
//! update.insert("count".to_string(), UpdateValue::Value(json!(1)));
//! update.insert("scratch".to_string(), UpdateValue::Remove);
//! update.insert("msgs".to_string(), UpdateValue::append(json!("hello")));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::types::NodeKind;

/// The live workflow state: string keys mapped to JSON values.
///
/// Always treated as immutable per step; the engine replaces it wholesale
/// after each merge round.
pub type StateData = FxHashMap<String, Value>;

/// A partial update produced by one node (or one routing command).
pub type StateUpdate = FxHashMap<String, UpdateValue>;

/// Predicate used by [`UpdateValue::RemoveWhere`] to pick the sequence
/// element to drop. Removal is first-match in iteration order; the element's
/// index is passed alongside the element.
pub type RemovePredicate = Arc<dyn Fn(&Value, usize) -> bool + Send + Sync>;

/// Identifies the element an appender channel should remove.
#[derive(Clone)]
pub enum RemoveIdentifier {
    /// Remove the first element equal to the given value.
    ///
    /// Comparison is full value equality, not a hash digest, so equal hashes
    /// on distinct values can never cause a false removal.
    ByValue(Value),
    /// Remove the first element for which the predicate returns `true`.
    ByPredicate(RemovePredicate),
}

impl RemoveIdentifier {
    /// Returns `true` if this identifier selects the element at `index`.
    #[must_use]
    pub fn matches(&self, element: &Value, index: usize) -> bool {
        match self {
            RemoveIdentifier::ByValue(v) => element == v,
            RemoveIdentifier::ByPredicate(p) => p(element, index),
        }
    }
}

impl fmt::Debug for RemoveIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveIdentifier::ByValue(v) => f.debug_tuple("ByValue").field(v).finish(),
            RemoveIdentifier::ByPredicate(_) => f.write_str("ByPredicate(..)"),
        }
    }
}

/// One value of a partial update.
///
/// The first three variants apply to every key. The last three are only
/// meaningful for keys backed by an appender channel; a base channel rejects
/// them with a channel error.
#[derive(Clone, Debug)]
pub enum UpdateValue {
    /// Overwrite the key (or feed it through the key's reducer).
    ///
    /// `Value(Value::Null)` behaves like [`Reset`](Self::Reset): the key
    /// falls back to its channel default, or disappears when there is none.
    Value(Value),
    /// Restore the key to its channel default (absent when no default).
    Reset,
    /// Delete the key from the state.
    Remove,
    /// Append elements to an ordered sequence.
    Append(Vec<Value>),
    /// Replace an ordered sequence wholesale.
    ReplaceAll(Vec<Value>),
    /// Remove the first matching element from an ordered sequence.
    RemoveWhere(RemoveIdentifier),
}

impl UpdateValue {
    /// Append a single element (scalars coerce to a singleton batch).
    #[must_use]
    pub fn append(value: Value) -> Self {
        match value {
            Value::Array(items) => UpdateValue::Append(items),
            other => UpdateValue::Append(vec![other]),
        }
    }

    /// Replace the whole sequence with the given elements.
    #[must_use]
    pub fn replace_all(items: Vec<Value>) -> Self {
        UpdateValue::ReplaceAll(items)
    }

    /// Remove the first element equal to `value`.
    #[must_use]
    pub fn remove_value(value: Value) -> Self {
        UpdateValue::RemoveWhere(RemoveIdentifier::ByValue(value))
    }
}

impl From<Value> for UpdateValue {
    fn from(value: Value) -> Self {
        UpdateValue::Value(value)
    }
}

/// Lift a plain state mapping into an overwrite-only update.
///
/// Used when an invocation's initial input is merged over the schema
/// defaults; every entry goes through its key's channel like any other
/// update.
#[must_use]
pub fn as_update(data: StateData) -> StateUpdate {
    data.into_iter()
        .map(|(k, v)| (k, UpdateValue::Value(v)))
        .collect()
}

/// A point-in-time view of an invocation, as emitted by the snapshot stream
/// and persisted by the checkpoint saver.
///
/// The last snapshot of an uninterrupted run has `next_node == None`; an
/// interrupted run's final snapshot carries the resume cursor instead
/// (`next_node` plus `checkpoint_id`).
#[derive(Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    /// The node whose output produced this state.
    pub node: NodeKind,
    /// The merged state after this node's update was folded in.
    pub state: StateData,
    /// The node the engine will dispatch next, if any.
    pub next_node: Option<NodeKind>,
    /// Identifier of the checkpoint persisted for this step, when a saver
    /// is configured.
    pub checkpoint_id: Option<String>,
}

impl StateSnapshot {
    /// Returns `true` when this snapshot terminates an uninterrupted run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next_node.is_none()
    }
}
