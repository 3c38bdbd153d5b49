mod concat_strings;
mod sum_numbers;

pub use concat_strings::ConcatStrings;
pub use sum_numbers::SumNumbers;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// Binary merge applied by a base channel when a key already holds a value:
/// `(old, new) -> merged`. Without a reducer the channel overwrites.
pub trait Reducer: Send + Sync {
    fn reduce(&self, old: Value, new: Value) -> Result<Value, ReducerError>;
}

/// A reducer rejected its operands (wrong JSON type, overflow, ...).
#[derive(Debug, Error, Diagnostic)]
#[error("reducer failed: {message}")]
#[diagnostic(
    code(stategraph::reducers::apply),
    help("Check that the update value matches the type the channel's reducer expects.")
)]
pub struct ReducerError {
    pub message: String,
}

impl ReducerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
