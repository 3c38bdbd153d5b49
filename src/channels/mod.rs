//! Per-key update policies ("channels") and the schema registry.
//!
//! A channel decides how one state key evolves when an update arrives:
//! whether the new value overwrites, feeds a reducer, or edits an ordered
//! sequence. The [`ChannelRegistry`] is the schema, a mapping from key to
//! channel, and owns the fold that turns `(current state, partial update)`
//! into the next state. Keys absent from the registry get plain overwrite
//! semantics.
//!
//! # Core Types
//!
//! - [`Channel`]: the per-key policy contract
//! - [`LastValueChannel`]: overwrite, with optional default and reducer
//! - [`AppenderChannel`]: ordered sequence with a duplicate policy
//! - [`ChannelRegistry`]: the schema plus the update fold
//!
//! # Examples
//!
//! ```rust
//! use stategraph::channels::{AppenderChannel, ChannelRegistry, LastValueChannel};
//! use stategraph::reducers::SumNumbers;
//! use stategraph::state::{StateData, UpdateValue};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = ChannelRegistry::new()
//!     .with_channel(
//!         "count",
//!         LastValueChannel::new()
//!             .with_default(|| json!(0))
//!             .with_reducer(Arc::new(SumNumbers)),
//!     )
//!     .with_channel("msgs", AppenderChannel::reject_duplicates().with_empty_default());
//!
//! let state: StateData = schema.initial_state();
//! assert_eq!(state.get("count"), Some(&json!(0)));
//!
//! let mut update = stategraph::state::StateUpdate::default();
//! update.insert("count".to_string(), UpdateValue::Value(json!(5)));
//! let next = schema.apply(&state, &update).unwrap();
//! assert_eq!(next.get("count"), Some(&json!(5)));
//! ```

pub mod errors;

pub use errors::ChannelError;

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::reducers::Reducer;
use crate::state::{StateData, StateUpdate, UpdateValue};

/// Lazily produces a channel's default value.
pub type DefaultProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Per-key update policy.
///
/// `apply` folds one update value into the key's current value. Returning
/// `Ok(None)` (or an explicit JSON null) drops the key from the merged
/// state, which is how the removal sentinel is guaranteed never to persist.
pub trait Channel: Send + Sync {
    /// Default value seeded at invocation start and restored on reset.
    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Whether this channel stores an ordered sequence.
    fn is_appender(&self) -> bool {
        false
    }

    /// Fold one update value into the key's current value.
    fn apply(
        &self,
        key: &str,
        old: Option<&Value>,
        incoming: &UpdateValue,
    ) -> Result<Option<Value>, ChannelError>;
}

fn operation_name(incoming: &UpdateValue) -> &'static str {
    match incoming {
        UpdateValue::Value(_) => "Value",
        UpdateValue::Reset => "Reset",
        UpdateValue::Remove => "Remove",
        UpdateValue::Append(_) => "Append",
        UpdateValue::ReplaceAll(_) => "ReplaceAll",
        UpdateValue::RemoveWhere(_) => "RemoveWhere",
    }
}

/// Overwrite channel with an optional default provider and optional reducer.
///
/// Without a reducer the incoming value replaces the stored one. With a
/// reducer, the incoming value is merged into the stored value (or the
/// default, when the key is not yet present).
#[derive(Clone, Default)]
pub struct LastValueChannel {
    default: Option<DefaultProvider>,
    reducer: Option<Arc<dyn Reducer>>,
}

impl LastValueChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default provider invoked on seed and reset.
    #[must_use]
    pub fn with_default(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(f));
        self
    }

    /// Set the reducer applied when the key already holds a value.
    #[must_use]
    pub fn with_reducer(mut self, reducer: Arc<dyn Reducer>) -> Self {
        self.reducer = Some(reducer);
        self
    }
}

impl Channel for LastValueChannel {
    fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(|f| f())
    }

    fn apply(
        &self,
        key: &str,
        old: Option<&Value>,
        incoming: &UpdateValue,
    ) -> Result<Option<Value>, ChannelError> {
        match incoming {
            UpdateValue::Value(Value::Null) | UpdateValue::Reset => Ok(self.default_value()),
            UpdateValue::Remove => Ok(None),
            UpdateValue::Value(new) => match &self.reducer {
                Some(reducer) => {
                    let base = old.cloned().or_else(|| self.default_value());
                    match base {
                        Some(base) => reducer
                            .reduce(base, new.clone())
                            .map(Some)
                            .map_err(|source| ChannelError::Reducer {
                                key: key.to_string(),
                                source,
                            }),
                        None => Ok(Some(new.clone())),
                    }
                }
                None => Ok(Some(new.clone())),
            },
            other => Err(ChannelError::InvalidUpdate {
                key: key.to_string(),
                operation: operation_name(other),
            }),
        }
    }
}

/// How an [`AppenderChannel`] treats an incoming element that is already
/// present in the sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Append unconditionally.
    Allow,
    /// Skip elements already present. Presence is decided by full value
    /// equality, never by a hash digest.
    Reject,
}

/// Ordered-sequence channel.
///
/// Incoming plain values append (scalars coerce to a singleton batch,
/// arrays extend element-wise). [`UpdateValue::ReplaceAll`] swaps the
/// sequence wholesale and [`UpdateValue::RemoveWhere`] drops the first
/// matching element. Every application returns a fresh list; the stored
/// sequence is never mutated in place.
#[derive(Clone)]
pub struct AppenderChannel {
    policy: DuplicatePolicy,
    default: Option<DefaultProvider>,
}

impl AppenderChannel {
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            default: None,
        }
    }

    /// Appender that keeps every element, duplicates included.
    #[must_use]
    pub fn allow_duplicates() -> Self {
        Self::new(DuplicatePolicy::Allow)
    }

    /// Appender that skips elements already present in the sequence.
    #[must_use]
    pub fn reject_duplicates() -> Self {
        Self::new(DuplicatePolicy::Reject)
    }

    /// Set the default provider invoked on seed and reset.
    #[must_use]
    pub fn with_default(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(f));
        self
    }

    /// Default to an empty sequence.
    #[must_use]
    pub fn with_empty_default(self) -> Self {
        self.with_default(|| Value::Array(Vec::new()))
    }

    fn current_items(&self, key: &str, old: Option<&Value>) -> Result<Vec<Value>, ChannelError> {
        match old {
            None => match self.default_value() {
                Some(Value::Array(items)) => Ok(items),
                Some(_) | None => Ok(Vec::new()),
            },
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(ChannelError::TypeMismatch {
                key: key.to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn extend(&self, mut items: Vec<Value>, batch: &[Value]) -> Vec<Value> {
        for element in batch {
            let duplicate = self.policy == DuplicatePolicy::Reject
                && items.iter().any(|existing| existing == element);
            if !duplicate {
                items.push(element.clone());
            }
        }
        items
    }
}

impl Channel for AppenderChannel {
    fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(|f| f())
    }

    fn is_appender(&self) -> bool {
        true
    }

    fn apply(
        &self,
        key: &str,
        old: Option<&Value>,
        incoming: &UpdateValue,
    ) -> Result<Option<Value>, ChannelError> {
        match incoming {
            UpdateValue::Value(Value::Null) | UpdateValue::Reset => Ok(self.default_value()),
            UpdateValue::Remove => Ok(None),
            UpdateValue::ReplaceAll(items) => Ok(Some(Value::Array(items.clone()))),
            UpdateValue::RemoveWhere(identifier) => {
                let mut items = self.current_items(key, old)?;
                let position = items
                    .iter()
                    .enumerate()
                    .position(|(index, element)| identifier.matches(element, index));
                if let Some(index) = position {
                    items.remove(index);
                }
                Ok(Some(Value::Array(items)))
            }
            UpdateValue::Append(batch) => {
                let items = self.current_items(key, old)?;
                Ok(Some(Value::Array(self.extend(items, batch))))
            }
            UpdateValue::Value(new) => {
                let items = self.current_items(key, old)?;
                let merged = match new {
                    Value::Array(batch) => self.extend(items, batch),
                    scalar => self.extend(items, std::slice::from_ref(scalar)),
                };
                Ok(Some(Value::Array(merged)))
            }
        }
    }
}

/// The state schema: key → channel, plus the update fold.
///
/// Cloning the registry is cheap (channels are shared behind `Arc`), so a
/// compiled graph can hand copies to subgraph wrapper nodes and the step
/// loop without duplicating policy objects.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: FxHashMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel for a key (fluent form).
    #[must_use]
    pub fn with_channel(mut self, key: impl Into<String>, channel: impl Channel + 'static) -> Self {
        self.channels.insert(key.into(), Arc::new(channel));
        self
    }

    /// Register a channel for a key.
    pub fn register(&mut self, key: impl Into<String>, channel: Arc<dyn Channel>) {
        self.channels.insert(key.into(), channel);
    }

    /// Look up the channel for a key, if one was registered.
    #[must_use]
    pub fn channel(&self, key: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(key)
    }

    /// Whether the key is backed by an ordered-sequence channel.
    #[must_use]
    pub fn is_appender(&self, key: &str) -> bool {
        self.channels
            .get(key)
            .is_some_and(|channel| channel.is_appender())
    }

    /// Seed a fresh state from the registered channel defaults.
    #[must_use]
    pub fn initial_state(&self) -> StateData {
        let mut state = StateData::default();
        for (key, channel) in &self.channels {
            if let Some(default) = channel.default_value()
                && !default.is_null()
            {
                state.insert(key.clone(), default);
            }
        }
        state
    }

    /// Fold a partial update into the current state, producing a fresh map.
    ///
    /// Each updated key is pushed through its channel (overwrite fallback
    /// for unregistered keys), then merged last-write-wins. Keys whose
    /// effective value comes back absent or null are dropped, so sentinels
    /// never survive a merge round.
    pub fn apply(
        &self,
        current: &StateData,
        update: &StateUpdate,
    ) -> Result<StateData, ChannelError> {
        let fallback = LastValueChannel::new();
        let mut next = current.clone();
        for (key, incoming) in update {
            let channel: &dyn Channel = match self.channels.get(key) {
                Some(channel) => channel.as_ref(),
                None => &fallback,
            };
            match channel.apply(key, current.get(key), incoming)? {
                Some(Value::Null) | None => {
                    next.remove(key);
                }
                Some(effective) => {
                    next.insert(key.clone(), effective);
                }
            }
        }
        Ok(next)
    }
}
