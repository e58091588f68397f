//! DAG snapshot tier: persists the whole graph with enough to revive every stage

use crate::core::StageDescriptor;
use crate::error::SerializationError;
use crate::persistence::CacheValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to rebuild a pipeline from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub name: String,

    /// Node names in insertion order, including unregistered placeholders
    pub nodes: Vec<String>,

    /// `(preceding, dependent)` pairs
    pub edges: Vec<(String, String)>,

    /// One descriptor per registered stage
    pub stages: Vec<StageDescriptor>,

    pub created_at: DateTime<Utc>,
}

impl PipelineSnapshot {
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<String>,
        edges: Vec<(String, String)>,
        stages: Vec<StageDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            nodes,
            edges,
            stages,
            created_at: Utc::now(),
        }
    }
}

/// Serializer for [`PipelineSnapshot`]s
///
/// Operators are stored by kind and config; the reader must supply a
/// [`crate::core::StageRegistry`] that knows every kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotSerializer;

impl SnapshotSerializer {
    pub fn serialize(&self, snapshot: &PipelineSnapshot) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(snapshot).map_err(SerializationError::Encode)
    }

    pub fn deserialize(&self, stored: &CacheValue) -> Result<PipelineSnapshot, SerializationError> {
        match stored {
            CacheValue::Bytes(bytes) => {
                serde_json::from_slice(bytes).map_err(SerializationError::Decode)
            }
            CacheValue::Text(_) => Err(SerializationError::InvalidTypeForDeserialization("text")),
        }
    }
}
