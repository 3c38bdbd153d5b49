use proptest::prelude::*;
use serde_json::Value;

use stategraph::channels::{AppenderChannel, ChannelRegistry};
use stategraph::runtimes::{JsonStateSerializer, StateSerializer};
use stategraph::state::{StateData, StateUpdate, UpdateValue};

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

fn state_strategy() -> impl Strategy<Value = StateData> {
    prop::collection::vec((key_strategy(), scalar_strategy()), 0..8)
        .prop_map(|pairs| pairs.into_iter().collect())
}

proptest! {
    /// Folding an empty update through any schema is the identity.
    #[test]
    fn empty_update_is_identity(state in state_strategy()) {
        let schema = ChannelRegistry::new();
        let next = schema.apply(&state, &StateUpdate::default()).unwrap();
        prop_assert_eq!(next, state);
    }

    /// A duplicate-rejecting appender is idempotent: applying the same
    /// batch twice yields the same sequence as applying it once, and the
    /// sequence never exceeds the number of distinct elements.
    #[test]
    fn reject_duplicates_is_idempotent(batch in prop::collection::vec(scalar_strategy(), 0..8)) {
        let schema = ChannelRegistry::new()
            .with_channel("xs", AppenderChannel::reject_duplicates().with_empty_default());

        let mut update = StateUpdate::default();
        update.insert("xs".to_string(), UpdateValue::Append(batch.clone()));

        let once = schema.apply(&schema.initial_state(), &update).unwrap();
        let twice = schema.apply(&once, &update).unwrap();
        prop_assert_eq!(&once, &twice);

        let mut distinct: Vec<&Value> = Vec::new();
        for element in &batch {
            if !distinct.contains(&element) {
                distinct.push(element);
            }
        }
        let stored = once
            .get("xs")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        prop_assert_eq!(stored, distinct.len());
    }

    /// The default serializer round-trips every state the schema can
    /// produce.
    #[test]
    fn serializer_round_trips(state in state_strategy()) {
        let serializer = JsonStateSerializer;
        let bytes = serializer.serialize(&state).unwrap();
        let back = serializer.deserialize(&bytes).unwrap();
        prop_assert_eq!(back, state);
    }
}
