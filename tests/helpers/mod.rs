//! Test utility functions for dagpipe
#![allow(dead_code)]

use dagpipe::core::{FnOperator, NodeStage, Pipeline, Port, Stage, StageOutput};
use dagpipe::execution::PipelineEvent;
use dagpipe::persistence::{CacheValue, SharedCache};
use dagpipe::serialization::{JsonSerializer, Serializer};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Shared log of operator invocations, in call order
pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn traced(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().clone()
}

/// Serialize `value` into the cache under `key`
pub async fn put(cache: &SharedCache, key: &str, value: Value) {
    let blob = JsonSerializer.serialize(&value).unwrap();
    cache.write(key, CacheValue::Bytes(blob)).await.unwrap();
}

/// Read and deserialize `key`, if present
pub async fn get(cache: &SharedCache, key: &str) -> Option<Value> {
    let stored = cache.read(key).await.unwrap()?;
    Some(JsonSerializer.deserialize(&stored).unwrap())
}

/// Node stage that sums its integer inputs and records its name in `trace`
pub fn summing_stage(
    cache: &SharedCache,
    trace: &Trace,
    name: &str,
    after: &[&str],
    inputs: &[&str],
    outputs: &[&str],
) -> Arc<dyn Stage> {
    let log = trace.clone();
    let stage_name = name.to_string();
    let op = FnOperator::new("sum", move |values: Vec<Value>| {
        log.lock().unwrap().push(stage_name.clone());
        let total: i64 = values.iter().filter_map(Value::as_i64).sum();
        Ok(StageOutput::Single(json!(total)))
    });

    let mut builder = NodeStage::builder(name, op);
    for pred in after {
        builder = builder.after_name(*pred);
    }
    for input in inputs {
        builder = builder.input(Port::table(*input));
    }
    for output in outputs {
        builder = builder.output(Port::table(*output));
    }
    Arc::new(builder.build(cache.clone(), JsonSerializer::shared()))
}

/// Node stage with no ports that only records its name
pub fn marker_stage(cache: &SharedCache, trace: &Trace, name: &str, after: &[&str]) -> Arc<dyn Stage> {
    let log = trace.clone();
    let stage_name = name.to_string();
    let op = FnOperator::new("marker", move |_| {
        log.lock().unwrap().push(stage_name.clone());
        Ok(StageOutput::none())
    });

    let mut builder = NodeStage::builder(name, op);
    for pred in after {
        builder = builder.after_name(*pred);
    }
    Arc::new(builder.build(cache.clone(), JsonSerializer::shared()))
}

/// Node stage whose operator always fails with `message`
pub fn failing_stage(cache: &SharedCache, name: &str, after: &[&str], message: &'static str) -> Arc<dyn Stage> {
    let op = FnOperator::new("fail", move |_| anyhow::bail!(message));
    let mut builder = NodeStage::builder(name, op);
    for pred in after {
        builder = builder.after_name(*pred);
    }
    Arc::new(builder.build(cache.clone(), JsonSerializer::shared()))
}

/// Grouped order with each group sorted, for order-insensitive comparison
pub fn sorted_groups(pipeline: &Pipeline) -> Vec<Vec<String>> {
    pipeline
        .grouped_order()
        .map(|mut group| {
            group.sort();
            group
        })
        .collect()
}

/// Assert the grouped order, ignoring order within a group
pub fn assert_groups(pipeline: &Pipeline, expected: &[&[&str]]) {
    let expected: Vec<Vec<String>> = expected
        .iter()
        .map(|group| {
            let mut group: Vec<String> = group.iter().map(|s| s.to_string()).collect();
            group.sort();
            group
        })
        .collect();
    assert_eq!(sorted_groups(pipeline), expected);
}

/// Event sink for an engine
pub type Events = Arc<Mutex<Vec<PipelineEvent>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

/// Position of the first event matching `pred`
pub fn position(events: &Events, pred: impl Fn(&PipelineEvent) -> bool) -> Option<usize> {
    events.lock().unwrap().iter().position(pred)
}
