use serde_json::json;

use stategraph::runtimes::{Checkpoint, JsonStateSerializer, SaverError, StateSerializer};
use stategraph::utils::json_ext::JsonSerializable;

mod common;
use common::*;

#[test]
fn serializer_round_trips_nested_values() {
    let state = state_with(&[
        ("count", json!(3)),
        ("msgs", json!(["a", "b"])),
        ("meta", json!({"nested": {"deep": true}, "list": [1, 2.5, null]})),
    ]);

    let serializer = JsonStateSerializer;
    let bytes = serializer.serialize(&state).unwrap();
    let back = serializer.deserialize(&bytes).unwrap();
    assert_eq!(back, state);
}

#[test]
fn serializer_rejects_malformed_bytes() {
    let err = JsonStateSerializer.deserialize(b"not json").unwrap_err();
    assert!(matches!(err, SaverError::Codec { .. }));
}

#[test]
fn checkpoint_round_trips_as_json() {
    let state = state_with(&[("k", json!("v"))]);
    let bytes = JsonStateSerializer.serialize(&state).unwrap();
    let checkpoint = Checkpoint::new("worker".to_string(), Some("__END__".to_string()), bytes);

    let json_string = checkpoint.to_json_string().unwrap();
    let back = Checkpoint::from_json_str(&json_string).unwrap();
    assert_eq!(back, checkpoint);
}

#[test]
fn checkpoint_ids_are_unique() {
    let a = Checkpoint::new("n".to_string(), None, Vec::new());
    let b = Checkpoint::new("n".to_string(), None, Vec::new());
    assert_ne!(a.id, b.id);
}
