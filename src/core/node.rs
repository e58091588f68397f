//! Node stage: a stage whose inputs and outputs travel through the cache

use crate::core::{Operator, Port, Stage, StageDescriptor, StageOutput, StagePhase};
use crate::error::StageError;
use crate::persistence::{CacheValue, SharedCache};
use crate::serialization::SharedSerializer;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stage that reads each input port from the cache, runs its operator, and
/// writes each output to the cache under the output port's name
pub struct NodeStage {
    name: String,
    preceding_stages: Vec<String>,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,
    config: Value,
    operator: Arc<dyn Operator>,
    cache: SharedCache,
    serializer: SharedSerializer,
    phase: AtomicU8,
}

impl NodeStage {
    /// Start building a node stage around `operator`
    pub fn builder(name: impl Into<String>, operator: impl Operator + 'static) -> NodeStageBuilder {
        NodeStageBuilder::new(name, Arc::new(operator))
    }

    /// Rebuild a node stage from a snapshot descriptor
    pub fn from_descriptor(
        descriptor: StageDescriptor,
        operator: Arc<dyn Operator>,
        cache: SharedCache,
        serializer: SharedSerializer,
    ) -> Self {
        NodeStageBuilder {
            name: descriptor.name,
            preceding_stages: descriptor.preceding_stages,
            input_ports: descriptor.input_ports,
            output_ports: descriptor.output_ports,
            config: descriptor.config,
            operator,
        }
        .build(cache, serializer)
    }

    /// Declare that this stage runs after `stage`
    pub fn after(&mut self, stage: &dyn Stage) -> &mut Self {
        self.preceding_stages.push(stage.name().to_string());
        self
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Phase reached by the most recent execution
    pub fn phase(&self) -> StagePhase {
        StagePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: StagePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        debug!(stage = %self.name, %phase, "stage phase");
    }

    /// Read and deserialize every input port, in declaration order
    pub async fn pre_execute(&self) -> Result<Vec<Value>, StageError> {
        let mut inputs = Vec::with_capacity(self.input_ports.len());

        for port in &self.input_ports {
            let stored = self.cache.read(&port.name).await.map_err(|source| StageError::Cache {
                stage: self.name.clone(),
                phase: StagePhase::ReadingInputs,
                source,
            })?;

            let value = match stored {
                Some(stored) => self.serializer.deserialize(&stored).map_err(|source| {
                    StageError::Serialization {
                        stage: self.name.clone(),
                        port: port.name.clone(),
                        source,
                    }
                })?,
                None if port.optional => Value::Null,
                None => {
                    return Err(StageError::MissingInput {
                        stage: self.name.clone(),
                        port: port.name.clone(),
                    })
                }
            };
            inputs.push(value);
        }

        Ok(inputs)
    }

    /// Serialize and write one output per declared output port
    ///
    /// Nothing is written when the number of outputs does not match the
    /// number of output ports.
    pub async fn post_execute(&self, outputs: StageOutput) -> Result<(), StageError> {
        let values = outputs.into_values();
        if values.len() != self.output_ports.len() {
            return Err(StageError::OutputArityMismatch {
                stage: self.name.clone(),
                expected: self.output_ports.len(),
                actual: values.len(),
            });
        }

        for (port, value) in self.output_ports.iter().zip(values) {
            let blob = self.serializer.serialize(&value).map_err(|source| {
                StageError::Serialization {
                    stage: self.name.clone(),
                    port: port.name.clone(),
                    source,
                }
            })?;

            self.cache
                .write(&port.name, CacheValue::Bytes(blob))
                .await
                .map_err(|source| StageError::Cache {
                    stage: self.name.clone(),
                    phase: StagePhase::WritingOutputs,
                    source,
                })?;
        }

        Ok(())
    }

    async fn run_phases(&self) -> Result<(), StageError> {
        self.set_phase(StagePhase::ReadingInputs);
        let inputs = self.pre_execute().await?;

        self.set_phase(StagePhase::Running);
        let outputs = self
            .operator
            .run(inputs)
            .await
            .map_err(|e| StageError::Run {
                stage: self.name.clone(),
                source: e.into(),
            })?;

        self.set_phase(StagePhase::WritingOutputs);
        self.post_execute(outputs).await
    }
}

#[async_trait::async_trait]
impl Stage for NodeStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn preceding_stages(&self) -> &[String] {
        &self.preceding_stages
    }

    fn input_ports(&self) -> &[Port] {
        &self.input_ports
    }

    fn output_ports(&self) -> &[Port] {
        &self.output_ports
    }

    fn kind(&self) -> &str {
        self.operator.kind()
    }

    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            name: self.name.clone(),
            kind: self.operator.kind().to_string(),
            config: self.config.clone(),
            preceding_stages: self.preceding_stages.clone(),
            input_ports: self.input_ports.clone(),
            output_ports: self.output_ports.clone(),
        }
    }

    async fn execute(&self) -> Result<(), StageError> {
        match self.run_phases().await {
            Ok(()) => {
                self.set_phase(StagePhase::Done);
                Ok(())
            }
            Err(e) => {
                warn!(stage = %self.name, phase = %self.phase(), "stage failed: {}", e);
                self.set_phase(StagePhase::Error);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for NodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStage")
            .field("name", &self.name)
            .field("kind", &self.operator.kind())
            .field("preceding_stages", &self.preceding_stages)
            .field("input_ports", &self.input_ports)
            .field("output_ports", &self.output_ports)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Declarative builder for [`NodeStage`]
pub struct NodeStageBuilder {
    name: String,
    preceding_stages: Vec<String>,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,
    config: Value,
    operator: Arc<dyn Operator>,
}

impl NodeStageBuilder {
    pub fn new(name: impl Into<String>, operator: Arc<dyn Operator>) -> Self {
        Self {
            name: name.into(),
            preceding_stages: Vec::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            config: Value::Null,
            operator,
        }
    }

    /// Append an input port
    pub fn input(mut self, port: Port) -> Self {
        self.input_ports.push(port);
        self
    }

    /// Append an output port
    pub fn output(mut self, port: Port) -> Self {
        self.output_ports.push(port);
        self
    }

    /// Run after `stage`
    pub fn after(mut self, stage: &dyn Stage) -> Self {
        self.preceding_stages.push(stage.name().to_string());
        self
    }

    /// Run after the stage called `name`, which may be registered later
    pub fn after_name(mut self, name: impl Into<String>) -> Self {
        self.preceding_stages.push(name.into());
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, cache: SharedCache, serializer: SharedSerializer) -> NodeStage {
        NodeStage {
            name: self.name,
            preceding_stages: self.preceding_stages,
            input_ports: self.input_ports,
            output_ports: self.output_ports,
            config: self.config,
            operator: self.operator,
            cache,
            serializer,
            phase: AtomicU8::new(StagePhase::Idle as u8),
        }
    }
}
