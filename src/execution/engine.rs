//! Main execution engine - orchestrates the entire pipeline run

use crate::core::{Pipeline, RunStatus, RunSummary, Stage};
use crate::error::{PipelineError, Result, StageError};
use crate::execution::{SchedulingStrategy, StageExecutor};
use crate::persistence::{keys, CacheValue};
use crate::serialization::SnapshotSerializer;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    GroupStarted {
        index: usize,
        stages: Vec<String>,
    },
    StageStarted {
        stage: String,
    },
    StageCompleted {
        stage: String,
    },
    StageFailed {
        stage: String,
        error: String,
    },
    GroupFinished {
        index: usize,
        succeeded: bool,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Runs a pipeline group by group
#[derive(Clone, Default)]
pub struct ExecutionEngine {
    strategy: SchedulingStrategy,
    handlers: Arc<Vec<EventHandler>>,
}

impl ExecutionEngine {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            strategy,
            handlers: Arc::new(Vec::new()),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.handlers).push(Arc::new(handler));
    }

    fn emit(&self, event: PipelineEvent) {
        emit_to(&self.handlers, event);
    }

    /// Execute the entire pipeline
    ///
    /// The DAG snapshot is written under `pipeline` first. Each group then
    /// runs inside its own [`StageExecutor`] bracket, strictly in order; the
    /// first failing group aborts the run. `done` is cleared once every
    /// group has finished.
    pub async fn execute(&self, pipeline: &Pipeline) -> Result<RunSummary> {
        pipeline.verify_registered()?;

        let cache = pipeline.cache().clone();
        let serializer = pipeline.serializer().clone();

        let snapshot = SnapshotSerializer.serialize(&pipeline.snapshot())?;
        cache
            .write(keys::PIPELINE, CacheValue::Bytes(snapshot))
            .await?;

        let mut summary = RunSummary::start(pipeline.name());
        info!(
            "Starting pipeline run: {} ({})",
            summary.pipeline_name, summary.run_id
        );
        self.emit(PipelineEvent::RunStarted {
            run_id: summary.run_id,
            pipeline_name: summary.pipeline_name.clone(),
        });

        for (index, group) in pipeline.grouped_order().enumerate() {
            info!("Running group {}: {:?}", index, group);
            self.emit(PipelineEvent::GroupStarted {
                index,
                stages: group.clone(),
            });

            let outcome = StageExecutor::scope(cache.clone(), serializer.clone(), group, |stages| {
                self.run_group(pipeline, stages)
            })
            .await;

            match outcome {
                Ok(finished) => {
                    summary.record_group(&finished);
                    self.emit(PipelineEvent::GroupFinished {
                        index,
                        succeeded: true,
                    });
                }
                Err(e) => {
                    error!("Group {} of pipeline {} failed: {}", index, pipeline.name(), e);
                    summary.fail();
                    self.emit(PipelineEvent::GroupFinished {
                        index,
                        succeeded: false,
                    });
                    self.emit(PipelineEvent::RunFinished {
                        run_id: summary.run_id,
                        status: summary.status,
                    });
                    return Err(e);
                }
            }
        }

        cache.delete(keys::DONE).await?;
        summary.complete();

        info!(
            "Pipeline {} completed: {} groups, {} stages",
            summary.pipeline_name,
            summary.groups,
            summary.completed_stages.len()
        );
        self.emit(PipelineEvent::RunFinished {
            run_id: summary.run_id,
            status: summary.status,
        });
        Ok(summary)
    }

    /// Run one group, returning its stage names in completion order
    async fn run_group(&self, pipeline: &Pipeline, stages: Vec<String>) -> Result<Vec<String>> {
        match self.strategy {
            SchedulingStrategy::Sequential => self.run_serial(pipeline, stages).await,
            SchedulingStrategy::WorkerPool(workers) => {
                self.run_pooled(pipeline, stages, workers.max(1)).await
            }
        }
    }

    async fn run_serial(&self, pipeline: &Pipeline, stages: Vec<String>) -> Result<Vec<String>> {
        let mut finished = Vec::with_capacity(stages.len());

        for name in stages {
            self.emit(PipelineEvent::StageStarted {
                stage: name.clone(),
            });

            match pipeline.run_stage(&name).await {
                Ok(()) => {
                    self.emit(PipelineEvent::StageCompleted {
                        stage: name.clone(),
                    });
                    finished.push(name);
                }
                Err(e) => {
                    self.emit(PipelineEvent::StageFailed {
                        stage: name,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        Ok(finished)
    }

    /// Fan the group out over at most `workers` concurrent tasks
    ///
    /// After the first failure no further stage starts; stages already
    /// running are awaited and the first error is returned.
    async fn run_pooled(
        &self,
        pipeline: &Pipeline,
        stages: Vec<String>,
        workers: usize,
    ) -> Result<Vec<String>> {
        let handles: Vec<Arc<dyn Stage>> = stages
            .iter()
            .map(|name| pipeline.stage_handle(name))
            .collect::<Result<_>>()?;

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for stage in handles {
            let permits = permits.clone();
            let handlers = self.handlers.clone();

            tasks.spawn(async move {
                // A closed semaphore means another stage already failed.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Ok::<_, StageError>(None);
                };

                let name = stage.name().to_string();
                emit_to(&handlers, PipelineEvent::StageStarted {
                    stage: name.clone(),
                });

                match stage.execute().await {
                    Ok(()) => {
                        emit_to(&handlers, PipelineEvent::StageCompleted {
                            stage: name.clone(),
                        });
                        Ok(Some(name))
                    }
                    Err(e) => {
                        emit_to(&handlers, PipelineEvent::StageFailed {
                            stage: name,
                            error: e.to_string(),
                        });
                        Err(e)
                    }
                }
            });
        }

        let mut finished = Vec::with_capacity(stages.len());
        let mut first_error: Option<PipelineError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(name))) => finished.push(name),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    permits.close();
                    first_error.get_or_insert(e.into());
                }
                Err(join_err) => {
                    permits.close();
                    warn!("Worker task failed: {}", join_err);
                    first_error.get_or_insert(PipelineError::WorkerPool(join_err.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(finished),
        }
    }
}

fn emit_to(handlers: &[EventHandler], event: PipelineEvent) {
    for handler in handlers {
        handler(event.clone());
    }
}
