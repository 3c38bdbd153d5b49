use serde_json::Value;

use super::{Reducer, ReducerError};

/// Concatenates the incoming string onto the stored one.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct ConcatStrings;

impl Reducer for ConcatStrings {
    fn reduce(&self, old: Value, new: Value) -> Result<Value, ReducerError> {
        match (old, new) {
            (Value::String(mut a), Value::String(b)) => {
                a.push_str(&b);
                Ok(Value::String(a))
            }
            (old, new) => Err(ReducerError::msg(format!(
                "ConcatStrings expects strings, got {old} + {new}"
            ))),
        }
    }
}
