//! Test: Cycle rejection - construction errors fail fast and leave the DAG intact

use crate::helpers::*;
use dagpipe::core::Pipeline;
use dagpipe::error::PipelineError;
use dagpipe::persistence::InMemoryCache;

#[test]
fn test_two_stage_cycle_is_rejected() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("cycle", cache.clone());

    pipeline.add_stage(marker_stage(&cache, &log, "a", &["b"])).unwrap();
    let err = pipeline
        .add_stage(marker_stage(&cache, &log, "b", &["a"]))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::DagVerification { ref stage, ref preceding } if stage == "b" && preceding == "a"
    ));
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_rejected_stage_does_not_change_the_graph() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("cycle", cache.clone());
    pipeline
        .add_stages([
            marker_stage(&cache, &log, "a", &[]),
            marker_stage(&cache, &log, "b", &["a"]),
            marker_stage(&cache, &log, "c", &["b"]),
        ])
        .unwrap();

    let before = (pipeline.stage_names(), pipeline.edges());
    let err = pipeline
        .add_stage(marker_stage(&cache, &log, "d", &["c", "d"]))
        .unwrap_err();

    assert!(matches!(err, PipelineError::DagVerification { .. }));
    assert_eq!((pipeline.stage_names(), pipeline.edges()), before);
    assert!(pipeline.stage("d").is_none());
    assert_groups(&pipeline, &[&["a"], &["b"], &["c"]]);
}

#[test]
fn test_add_stages_stops_at_first_error() {
    let cache = InMemoryCache::shared();
    let log = trace();
    let mut pipeline = Pipeline::new("batch", cache.clone());

    let err = pipeline
        .add_stages([
            marker_stage(&cache, &log, "a", &[]),
            marker_stage(&cache, &log, "a", &[]),
            marker_stage(&cache, &log, "b", &["a"]),
        ])
        .unwrap_err();

    assert!(matches!(err, PipelineError::DuplicateStage(name) if name == "a"));
    assert_eq!(pipeline.stage_names(), vec!["a"]);
}
