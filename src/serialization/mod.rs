//! Conversion between in-memory values and cache blobs
//!
//! Two tiers exist: [`Serializer`] handles plain data values passed between
//! stages and used for bookkeeping, while [`snapshot::SnapshotSerializer`]
//! captures a whole DAG including the callable behind every stage.

pub mod snapshot;

pub use snapshot::{PipelineSnapshot, SnapshotSerializer};

use crate::error::SerializationError;
use crate::persistence::CacheValue;
use serde_json::Value;
use std::sync::Arc;

/// Plain-data serializer injected into stages and executors
pub trait Serializer: Send + Sync {
    /// Encode a value into a byte blob
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializationError>;

    /// Decode a stored blob; values stored as text are rejected
    fn deserialize(&self, stored: &CacheValue) -> Result<Value, SerializationError>;
}

/// Serializer handle shared across stages
pub type SharedSerializer = Arc<dyn Serializer>;

/// JSON-encoded blobs
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn shared() -> SharedSerializer {
        Arc::new(JsonSerializer)
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(SerializationError::Encode)
    }

    fn deserialize(&self, stored: &CacheValue) -> Result<Value, SerializationError> {
        match stored {
            CacheValue::Bytes(bytes) => {
                serde_json::from_slice(bytes).map_err(SerializationError::Decode)
            }
            CacheValue::Text(_) => Err(SerializationError::InvalidTypeForDeserialization("text")),
        }
    }
}

/// Serialize a list of stage names (bookkeeping records)
pub(crate) fn encode_names(
    serializer: &dyn Serializer,
    names: &[String],
) -> Result<CacheValue, SerializationError> {
    let value = Value::from(names.to_vec());
    Ok(CacheValue::Bytes(serializer.serialize(&value)?))
}

/// Deserialize a list of stage names (bookkeeping records)
pub(crate) fn decode_names(
    serializer: &dyn Serializer,
    stored: &CacheValue,
) -> Result<Vec<String>, SerializationError> {
    let value = serializer.deserialize(stored)?;
    serde_json::from_value(value).map_err(SerializationError::Decode)
}
