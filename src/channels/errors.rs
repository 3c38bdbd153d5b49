//! Channel application errors.

use miette::Diagnostic;
use thiserror::Error;

use crate::reducers::ReducerError;

/// A channel rejected an update value.
#[derive(Debug, Error, Diagnostic)]
pub enum ChannelError {
    /// The stored value is not the ordered sequence an appender expects.
    #[error("channel `{key}` expects an ordered sequence, found {found}")]
    #[diagnostic(
        code(stategraph::channels::type_mismatch),
        help("Appender channels only operate on JSON arrays; check what was written to `{key}`.")
    )]
    TypeMismatch { key: String, found: String },

    /// A sequence operation was sent to a non-appender channel.
    #[error("channel `{key}` does not support {operation}")]
    #[diagnostic(
        code(stategraph::channels::invalid_update),
        help("Append, ReplaceAll and RemoveWhere are only valid on appender channels.")
    )]
    InvalidUpdate {
        key: String,
        operation: &'static str,
    },

    /// The key's reducer rejected its operands.
    #[error("channel `{key}` reducer failed")]
    #[diagnostic(code(stategraph::channels::reducer))]
    Reducer {
        key: String,
        #[source]
        source: ReducerError,
    },
}
