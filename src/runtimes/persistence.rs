/*!
Persistence primitives for serializing workflow state.

The engine treats persisted state as opaque bytes behind the
[`StateSerializer`] contract; [`JsonStateSerializer`] is the default codec.
This module performs no I/O; it is pure data transformation glue between
the step loop and whatever [`CheckpointSaver`](super::CheckpointSaver)
backend is plugged in.
*/

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::checkpointer::SaverError;
use crate::state::StateData;
use crate::utils::json_ext::JsonSerializable;

/// Byte-level codec for persisted workflow state.
///
/// Implementations must round-trip: `deserialize(serialize(state))` yields
/// a state equal to the input for every state the schema can produce.
pub trait StateSerializer: Send + Sync {
    fn serialize(&self, state: &StateData) -> Result<Vec<u8>, SaverError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<StateData, SaverError>;
}

/// Default serializer: compact JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStateSerializer;

impl StateSerializer for JsonStateSerializer {
    fn serialize(&self, state: &StateData) -> Result<Vec<u8>, SaverError> {
        serde_json::to_vec(state).map_err(|e| SaverError::Codec {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<StateData, SaverError> {
        serde_json::from_slice(bytes).map_err(|e| SaverError::Codec {
            message: e.to_string(),
        })
    }
}

/// Blanket [`JsonSerializable`] implementation for all serde types using
/// [`SaverError`], giving persisted shapes (checkpoints included) uniform
/// `to_json_string`/`from_json_str` helpers.
impl<T> JsonSerializable<SaverError> for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_json_string(&self) -> Result<String, SaverError> {
        serde_json::to_string(self).map_err(|e| SaverError::Codec {
            message: e.to_string(),
        })
    }

    fn from_json_str(s: &str) -> Result<Self, SaverError> {
        serde_json::from_str(s).map_err(|e| SaverError::Codec {
            message: e.to_string(),
        })
    }
}
