//! Test: Linear chain - A, B after A, C after B

use crate::helpers::*;
use dagpipe::core::Pipeline;
use dagpipe::persistence::InMemoryCache;
use serde_json::json;

#[tokio::test]
async fn test_linear_chain_runs_in_dependency_order() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("linear", cache.clone());

    pipeline
        .add_stages([
            summing_stage(&cache, &log, "a", &[], &["seed"], &["a_out"]),
            summing_stage(&cache, &log, "b", &["a"], &["a_out", "a_out"], &["b_out"]),
            summing_stage(&cache, &log, "c", &["b"], &["b_out", "seed"], &["c_out"]),
        ])
        .unwrap();
    put(&cache, "seed", json!(5)).await;

    assert_groups(&pipeline, &[&["a"], &["b"], &["c"]]);

    let summary = pipeline.start(None).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.groups, 3);
    assert_eq!(summary.completed_stages, vec!["a", "b", "c"]);
    assert_eq!(traced(&log), vec!["a", "b", "c"]);
    assert_eq!(get(&cache, "c_out").await, Some(json!(15)));
}

#[tokio::test]
async fn test_stages_may_be_registered_before_their_predecessors() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("reversed", cache.clone());

    pipeline
        .add_stages([
            marker_stage(&cache, &log, "c", &["b"]),
            marker_stage(&cache, &log, "b", &["a"]),
            marker_stage(&cache, &log, "a", &[]),
        ])
        .unwrap();

    assert_groups(&pipeline, &[&["a"], &["b"], &["c"]]);
    pipeline.start(Some(0)).await.unwrap();
    assert_eq!(traced(&log), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_grouped_order_is_recomputed_per_call() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("twice", cache.clone());
    pipeline
        .add_stages([
            marker_stage(&cache, &log, "a", &[]),
            marker_stage(&cache, &log, "b", &["a"]),
        ])
        .unwrap();

    let mut first = pipeline.grouped_order();
    first.next();
    assert_eq!(first.count(), 1);
    assert_eq!(pipeline.grouped_order().count(), 2);

    pipeline.start(None).await.unwrap();
    pipeline.start(None).await.unwrap();
    assert_eq!(traced(&log), vec!["a", "b", "a", "b"]);
}
