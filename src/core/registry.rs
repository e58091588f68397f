//! Operator registry used to revive stages from a DAG snapshot

use crate::core::{FnOperator, NodeStage, Operator, Stage, StageDescriptor, StageOutput};
use crate::error::PipelineError;
use crate::persistence::SharedCache;
use crate::serialization::SharedSerializer;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an operator from the `config` stored in its stage descriptor
pub type OperatorFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn Operator>> + Send + Sync>;

/// Maps operator kinds to factories
///
/// Each pipeline or runner owns its registry; there is no global table.
#[derive(Clone, Default)]
pub struct StageRegistry {
    factories: HashMap<String, OperatorFactory>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous one
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn Operator>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Register a stateless closure operator
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<StageOutput> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let operator = FnOperator::new(kind.clone(), func);
        self.register(kind, move |_| Ok(Arc::new(operator.clone()) as Arc<dyn Operator>))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Rebuild the stage described by `descriptor`
    pub fn revive(
        &self,
        descriptor: StageDescriptor,
        cache: SharedCache,
        serializer: SharedSerializer,
    ) -> Result<Arc<dyn Stage>, PipelineError> {
        let factory = self.factories.get(&descriptor.kind).ok_or_else(|| {
            PipelineError::InvalidStageType(format!(
                "no operator registered for kind '{}' (stage '{}')",
                descriptor.kind, descriptor.name
            ))
        })?;

        let operator = factory(&descriptor.config).map_err(|e| {
            PipelineError::InvalidStageType(format!(
                "operator '{}' rejected the config of stage '{}': {e}",
                descriptor.kind, descriptor.name
            ))
        })?;

        Ok(Arc::new(NodeStage::from_descriptor(
            descriptor, operator, cache, serializer,
        )))
    }
}
