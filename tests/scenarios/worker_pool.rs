//! Test: Worker pool - a group fans out over a bounded number of workers

use crate::helpers::*;
use async_trait::async_trait;
use dagpipe::core::{NodeStage, Operator, Pipeline, Port, StageOutput};
use dagpipe::error::PipelineError;
use dagpipe::execution::{inspect_progress, ExecutionEngine, SchedulingStrategy};
use dagpipe::persistence::InMemoryCache;
use dagpipe::serialization::JsonSerializer;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Operator that tracks how many instances run at the same time
struct Gauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Operator for Gauge {
    fn kind(&self) -> &str {
        "gauge"
    }

    async fn run(&self, _inputs: Vec<Value>) -> anyhow::Result<StageOutput> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(json!(now).into())
    }
}

fn fan_out(workers: usize, width: usize) -> (Pipeline, Arc<AtomicUsize>) {
    let cache = InMemoryCache::shared();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new(format!("fan-out-{workers}"), cache.clone());

    for i in 0..width {
        let stage = NodeStage::builder(
            format!("w{i}"),
            Gauge {
                running: running.clone(),
                peak: peak.clone(),
            },
        )
        .output(Port::table(format!("out{i}")))
        .build(cache.clone(), JsonSerializer::shared());
        pipeline.add_stage(Arc::new(stage)).unwrap();
    }

    (pipeline, peak)
}

#[tokio::test]
async fn test_pool_never_exceeds_worker_count() {
    let (pipeline, peak) = fan_out(2, 6);

    let summary = pipeline.start(Some(2)).await.unwrap();

    assert_eq!(summary.groups, 1);
    assert_eq!(summary.completed_stages.len(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_serial_mode_runs_one_at_a_time() {
    let (pipeline, peak) = fan_out(0, 4);

    pipeline.start(Some(0)).await.unwrap();

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pool_actually_runs_stages_concurrently() {
    let (pipeline, peak) = fan_out(4, 4);

    ExecutionEngine::new(SchedulingStrategy::WorkerPool(4))
        .execute(&pipeline)
        .await
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_pool_failure_aborts_group_and_run() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("pool-failure", cache.clone());
    pipeline
        .add_stages([
            marker_stage(&cache, &log, "root", &[]),
            marker_stage(&cache, &log, "ok", &["root"]),
            failing_stage(&cache, "bad", &["root"], "worker exploded"),
            marker_stage(&cache, &log, "after", &["ok", "bad"]),
        ])
        .unwrap();

    let err = pipeline.start(Some(3)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Stage(ref e) if e.stage() == "bad"));
    assert!(!traced(&log).contains(&"after".to_string()));

    let progress = inspect_progress(pipeline.cache(), pipeline.serializer())
        .await
        .unwrap();
    assert_eq!(progress.in_progress, None);
    assert_eq!(progress.done, vec!["root"]);

    let stage = pipeline.stage("after").unwrap();
    assert_eq!(stage.name(), "after");
}
