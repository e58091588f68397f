//! dagpipe - a DAG pipeline orchestrator
//!
//! Stages declare input and output ports; values travel between stages
//! through a shared cache store. The pipeline runs stages group by group in
//! topological order and records its progress in the cache so an
//! interrupted run can be inspected.

pub mod core;
pub mod error;
pub mod execution;
pub mod logging;
pub mod persistence;
pub mod serialization;

// Re-export commonly used types
pub use core::{
    FnOperator, NodeStage, NodeStageBuilder, Operator, Pipeline, PipelineConfig, Port, PortType,
    RunStatus, RunSummary, Stage, StageDescriptor, StageOutput, StagePhase, StageRegistry,
};
pub use error::{CacheError, PipelineError, SerializationError, StageError};
pub use execution::{inspect_progress, ExecutionEngine, PipelineEvent, ProgressReport, SchedulingStrategy};
pub use persistence::{CacheStore, CacheValue, InMemoryCache, SharedCache};
pub use serialization::{JsonSerializer, Serializer, SharedSerializer};
