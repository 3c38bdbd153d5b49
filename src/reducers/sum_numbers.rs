use serde_json::{Number, Value};

use super::{Reducer, ReducerError};

/// Adds the incoming number to the stored one. Integer pairs stay integral;
/// anything else is summed as f64.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct SumNumbers;

impl Reducer for SumNumbers {
    fn reduce(&self, old: Value, new: Value) -> Result<Value, ReducerError> {
        let (Value::Number(a), Value::Number(b)) = (&old, &new) else {
            return Err(ReducerError::msg(format!(
                "SumNumbers expects numbers, got {old} + {new}"
            )));
        };
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return Ok(Value::Number(Number::from(x + y)));
        }
        let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
        Number::from_f64(sum)
            .map(Value::Number)
            .ok_or_else(|| ReducerError::msg(format!("sum is not a finite number: {sum}")))
    }
}
