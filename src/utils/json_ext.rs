//! JSON serialization glue.
//!
//! [`JsonSerializable`] gives persisted shapes uniform string-form helpers
//! without committing them to a concrete error type; the runtime provides a
//! blanket implementation over its saver error in
//! [`runtimes::persistence`](crate::runtimes::persistence).

/// String-form JSON round-tripping with a caller-chosen error type.
pub trait JsonSerializable<E>: Sized {
    /// Serialize to a JSON string.
    fn to_json_string(&self) -> Result<String, E>;

    /// Deserialize from a JSON string.
    fn from_json_str(s: &str) -> Result<Self, E>;
}
