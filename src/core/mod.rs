//! Core domain models
//!
//! Ports, stages, the node stage that moves values through the cache, and
//! the pipeline DAG that ties them together.

pub mod config;
pub mod node;
pub mod pipeline;
pub mod port;
pub mod registry;
pub mod stage;
pub mod state;

pub use config::{CacheBackend, CacheConfig, PipelineConfig};
pub use node::{NodeStage, NodeStageBuilder};
pub use pipeline::Pipeline;
pub use port::{Port, PortType};
pub use registry::{OperatorFactory, StageRegistry};
pub use stage::{FnOperator, Operator, Stage, StageDescriptor, StageOutput, StagePhase};
pub use state::{RunStatus, RunSummary};
