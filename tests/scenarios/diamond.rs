//! Test: Diamond - A; B and C after A; D after B and C

use crate::helpers::*;
use dagpipe::core::Pipeline;
use dagpipe::execution::{ExecutionEngine, PipelineEvent, SchedulingStrategy};
use dagpipe::persistence::{InMemoryCache, SharedCache};
use serde_json::json;

fn diamond(cache: &SharedCache, log: &Trace) -> Pipeline {
    let mut pipeline = Pipeline::new("diamond", cache.clone());
    pipeline
        .add_stages([
            summing_stage(cache, log, "a", &[], &["seed"], &["x"]),
            summing_stage(cache, log, "b", &["a"], &["x"], &["y"]),
            summing_stage(cache, log, "c", &["a"], &["x", "x"], &["z"]),
            summing_stage(cache, log, "d", &["b", "c"], &["y", "z"], &["w"]),
        ])
        .unwrap();
    pipeline
}

#[test]
fn test_diamond_groups() {
    let cache = InMemoryCache::shared();
    let pipeline = diamond(&cache, &trace());

    assert_groups(&pipeline, &[&["a"], &["b", "c"], &["d"]]);
    assert_eq!(pipeline.predecessors("d"), vec!["b", "c"]);
    assert_eq!(pipeline.successors("a"), vec!["b", "c"]);
}

#[tokio::test]
async fn test_diamond_join_sees_both_branches() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let pipeline = diamond(&cache, &log);
    put(&cache, "seed", json!(2)).await;

    pipeline.start(None).await.unwrap();

    assert_eq!(get(&cache, "w").await, Some(json!(6)));
    let order = traced(&log);
    assert_eq!(order.first().map(String::as_str), Some("a"));
    assert_eq!(order.last().map(String::as_str), Some("d"));
}

#[tokio::test]
async fn test_group_brackets_close_before_the_next_group_starts() {
    let cache = InMemoryCache::shared();
    let pipeline = diamond(&cache, &trace());
    put(&cache, "seed", json!(1)).await;

    let sink = events();
    let mut engine = ExecutionEngine::new(SchedulingStrategy::WorkerPool(4));
    let recorder = sink.clone();
    engine.add_event_handler(move |event| recorder.lock().unwrap().push(event));
    engine.execute(&pipeline).await.unwrap();

    let group_one_done = position(&sink, |e| {
        matches!(e, PipelineEvent::GroupFinished { index: 1, succeeded: true })
    })
    .unwrap();
    let d_started = position(&sink, |e| {
        matches!(e, PipelineEvent::StageStarted { stage } if stage == "d")
    })
    .unwrap();
    assert!(group_one_done < d_started);
}
