//! Error types for every layer of the orchestrator

use crate::core::StagePhase;
use thiserror::Error;

/// Boxed error produced by user stage logic
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a cache store or by cache record validation
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid key type: {0}")]
    InvalidKeyType(String),

    #[error("Invalid value type: {0}")]
    InvalidValueType(String),

    #[error("Cache backend error: {0}")]
    Backend(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while converting values to and from cache blobs
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Invalid type for deserialization: expected bytes, found {0}")]
    InvalidTypeForDeserialization(&'static str),

    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors raised while executing a single stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage '{stage}' has no cached value for required input port '{port}'")]
    MissingInput { stage: String, port: String },

    #[error("Stage '{stage}' returned {actual} outputs but declares {expected} output ports")]
    OutputArityMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stage '{stage}' failed: {source}")]
    Run {
        stage: String,
        #[source]
        source: BoxError,
    },

    #[error("Stage '{stage}' cache access failed while {phase}: {source}")]
    Cache {
        stage: String,
        phase: StagePhase,
        #[source]
        source: CacheError,
    },

    #[error("Stage '{stage}' could not convert port '{port}': {source}")]
    Serialization {
        stage: String,
        port: String,
        #[source]
        source: SerializationError,
    },
}

impl StageError {
    /// Name of the stage that failed
    pub fn stage(&self) -> &str {
        match self {
            StageError::MissingInput { stage, .. }
            | StageError::OutputArityMismatch { stage, .. }
            | StageError::Run { stage, .. }
            | StageError::Cache { stage, .. }
            | StageError::Serialization { stage, .. } => stage,
        }
    }
}

/// Errors raised while building or running a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid stage type: {0}")]
    InvalidStageType(String),

    #[error("DAG verification failed: adding '{stage}' after '{preceding}' would create a cycle")]
    DagVerification { stage: String, preceding: String },

    #[error("A different stage named '{0}' is already registered")]
    DuplicateStage(String),

    #[error("Stage '{0}' is referenced in the DAG but was never registered")]
    UnregisteredStage(String),

    #[error("No pipeline snapshot stored under the 'pipeline' key")]
    MissingSnapshot,

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
