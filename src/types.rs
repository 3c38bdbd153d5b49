//! Core identity types for the stategraph workflow engine.
//!
//! This module defines [`NodeKind`], the identifier used for every vertex in
//! a workflow graph. The two reserved endpoints `Start` and `End` are virtual:
//! they carry no action, may not be registered as nodes, and mark where an
//! invocation enters and terminates.
//!
//! # Examples
//!
//! ```rust
//! use stategraph::types::NodeKind;
//!
//! let start = NodeKind::Start;
//! let router = NodeKind::Custom("router".to_string());
//!
//! // Persisted wire form round-trips.
//! assert_eq!(router.encode(), "router");
//! assert_eq!(NodeKind::decode("__START__"), NodeKind::Start);
//! assert_eq!(NodeKind::decode("router"), router);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved wire encoding for the virtual entry node.
pub const START_ID: &str = "__START__";
/// Reserved wire encoding for the virtual terminal node.
pub const END_ID: &str = "__END__";

/// Identifies a vertex within a workflow graph.
///
/// `Start` and `End` are structural sentinels: `End` may never appear as the
/// source of an edge and `Start` may never appear as a target. Everything
/// else is a [`Custom`](Self::Custom) node named by the caller.
///
/// # Persistence
///
/// `NodeKind` supports serialization for checkpointing both through serde
/// and the [`encode`](Self::encode)/[`decode`](Self::decode) string forms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point; the first edge of every graph leaves from here.
    Start,
    /// Virtual terminal; reaching it completes the invocation.
    End,
    /// Caller-defined node identified by a non-empty string.
    Custom(String),
}

impl NodeKind {
    /// Encode into the persisted string form.
    ///
    /// - `Start` → `"__START__"`
    /// - `End` → `"__END__"`
    /// - `Custom(s)` → `s`
    ///
    /// Custom ids may not collide with the reserved forms; the graph builder
    /// rejects them at registration time.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => START_ID.to_string(),
            NodeKind::End => END_ID.to_string(),
            NodeKind::Custom(s) => s.clone(),
        }
    }

    /// Decode a persisted string form back into a `NodeKind`.
    ///
    /// Any string other than the two reserved forms becomes `Custom`.
    pub fn decode(s: &str) -> Self {
        match s {
            START_ID => NodeKind::Start,
            END_ID => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }

    /// Returns `true` if this is the [`Start`](Self::Start) sentinel.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the [`End`](Self::End) sentinel.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns `true` if this is a caller-defined node.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "{START_ID}"),
            Self::End => write!(f, "{END_ID}"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

// Developer experience: allow string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        NodeKind::decode(s)
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::decode(&s)
    }
}
