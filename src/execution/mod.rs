//! Pipeline execution: grouping, bookkeeping and the run loop

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEngine, PipelineEvent};
pub use executor::{inspect_progress, ProgressReport, StageExecutor};
pub use scheduler::{ExecutionGroups, SchedulingStrategy};
