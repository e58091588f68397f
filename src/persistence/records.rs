//! Typed cache records built from loosely-typed input
//!
//! Records arriving from YAML documents carry arbitrary keys and values, so
//! this is where the cache's key/value type contract is enforced at runtime.

use crate::error::CacheError;
use crate::persistence::{CacheStore, CacheValue};
use serde_yaml::Value;
use tracing::info;

/// A validated key/value pair ready to be written to a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub key: String,
    pub value: CacheValue,
}

impl CacheRecord {
    pub fn new(key: impl Into<String>, value: impl Into<CacheValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate a loosely-typed pair
    ///
    /// Keys must be strings. Values must be strings (stored as text) or
    /// sequences of integers in `0..=255` (stored as bytes).
    pub fn from_yaml(key: &Value, value: &Value) -> Result<Self, CacheError> {
        let key = match key {
            Value::String(s) => s.clone(),
            other => {
                return Err(CacheError::InvalidKeyType(format!(
                    "expected a string key, found {}",
                    describe(other)
                )))
            }
        };

        let value = match value {
            Value::String(s) => CacheValue::Text(s.clone()),
            Value::Sequence(items) => CacheValue::Bytes(
                items
                    .iter()
                    .map(as_byte)
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(|| {
                        CacheError::InvalidValueType(format!(
                            "value for '{key}' is a sequence but not a byte sequence"
                        ))
                    })?,
            ),
            other => {
                return Err(CacheError::InvalidValueType(format!(
                    "value for '{key}' must be a string or bytes, found {}",
                    describe(other)
                )))
            }
        };

        Ok(Self { key, value })
    }

    /// Write this record to a store
    pub async fn write_to(&self, store: &dyn CacheStore) -> Result<(), CacheError> {
        store.write(&self.key, self.value.clone()).await
    }
}

/// Parse a YAML mapping of records and write them all to `store`
///
/// Every record is validated before the first write, so a single bad key or
/// value leaves the store untouched.
pub async fn seed_cache(store: &dyn CacheStore, yaml: &str) -> anyhow::Result<usize> {
    let document: Value = serde_yaml::from_str(yaml)?;
    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(0),
        other => anyhow::bail!("cache seed must be a mapping, found {}", describe(&other)),
    };

    let records = mapping
        .iter()
        .map(|(k, v)| CacheRecord::from_yaml(k, v))
        .collect::<Result<Vec<_>, _>>()?;

    for record in &records {
        record.write_to(store).await?;
    }

    info!("Seeded {} cache records", records.len());
    Ok(records.len())
}

fn as_byte(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
