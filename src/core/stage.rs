//! Stage domain model

use crate::core::Port;
use crate::error::StageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A unit of orchestrated work
///
/// A stage names the stages it runs after; the pipeline turns those names
/// into DAG edges when the stage is registered.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    /// Unique name within a pipeline
    fn name(&self) -> &str;

    /// Names of the stages this one runs after, in declaration order
    fn preceding_stages(&self) -> &[String];

    fn input_ports(&self) -> &[Port] {
        &[]
    }

    fn output_ports(&self) -> &[Port] {
        &[]
    }

    /// Identifier used to revive the stage's logic from a snapshot
    fn kind(&self) -> &str {
        "stage"
    }

    /// Serializable description of the stage
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            config: Value::Null,
            preceding_stages: self.preceding_stages().to_vec(),
            input_ports: self.input_ports().to_vec(),
            output_ports: self.output_ports().to_vec(),
        }
    }

    /// Run the stage to completion
    async fn execute(&self) -> Result<(), StageError>;
}

/// User logic behind a stage: positional inputs in, outputs out
#[async_trait::async_trait]
pub trait Operator: Send + Sync {
    /// Identifier under which a [`crate::core::StageRegistry`] can rebuild this operator
    fn kind(&self) -> &str;

    async fn run(&self, inputs: Vec<Value>) -> anyhow::Result<StageOutput>;
}

/// What an operator returns
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// One value, written to the single output port
    Single(Value),
    /// A fixed-size ordered sequence, one element per output port
    Tuple(Vec<Value>),
}

impl StageOutput {
    /// No outputs at all (for sink stages)
    pub fn none() -> Self {
        StageOutput::Tuple(Vec::new())
    }

    pub fn tuple(values: impl IntoIterator<Item = Value>) -> Self {
        StageOutput::Tuple(values.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        match self {
            StageOutput::Single(_) => 1,
            StageOutput::Tuple(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into one value per output port
    pub fn into_values(self) -> Vec<Value> {
        match self {
            StageOutput::Single(value) => vec![value],
            StageOutput::Tuple(values) => values,
        }
    }
}

impl From<Value> for StageOutput {
    fn from(value: Value) -> Self {
        StageOutput::Single(value)
    }
}

impl From<()> for StageOutput {
    fn from(_: ()) -> Self {
        StageOutput::none()
    }
}

type OperatorFn = dyn Fn(Vec<Value>) -> anyhow::Result<StageOutput> + Send + Sync;

/// Operator backed by a closure
#[derive(Clone)]
pub struct FnOperator {
    kind: String,
    func: Arc<OperatorFn>,
}

impl FnOperator {
    pub fn new<F>(kind: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<StageOutput> + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperator").field("kind", &self.kind).finish()
    }
}

#[async_trait::async_trait]
impl Operator for FnOperator {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn run(&self, inputs: Vec<Value>) -> anyhow::Result<StageOutput> {
        (self.func)(inputs)
    }
}

/// Execution phase of a stage within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StagePhase {
    Idle = 0,
    ReadingInputs = 1,
    Running = 2,
    WritingOutputs = 3,
    Done = 4,
    Error = 5,
}

impl StagePhase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => StagePhase::ReadingInputs,
            2 => StagePhase::Running,
            3 => StagePhase::WritingOutputs,
            4 => StagePhase::Done,
            5 => StagePhase::Error,
            _ => StagePhase::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StagePhase::Done | StagePhase::Error)
    }
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StagePhase::Idle => "idle",
            StagePhase::ReadingInputs => "reading inputs",
            StagePhase::Running => "running",
            StagePhase::WritingOutputs => "writing outputs",
            StagePhase::Done => "done",
            StagePhase::Error => "failed",
        };
        f.write_str(text)
    }
}

/// Serializable description of a stage, stored in the DAG snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub name: String,

    /// Operator kind used to revive the stage's logic
    pub kind: String,

    /// Operator configuration handed back to the factory on revival
    #[serde(default)]
    pub config: Value,

    #[serde(default)]
    pub preceding_stages: Vec<String>,

    #[serde(default)]
    pub input_ports: Vec<Port>,

    #[serde(default)]
    pub output_ports: Vec<Port>,
}
