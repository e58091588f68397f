//! Pipeline domain model: the stage DAG

use crate::core::{RunSummary, Stage, StageRegistry};
use crate::error::{PipelineError, Result};
use crate::execution::{ExecutionEngine, ExecutionGroups, SchedulingStrategy};
use crate::persistence::{keys, SharedCache};
use crate::serialization::{JsonSerializer, PipelineSnapshot, SharedSerializer, SnapshotSerializer};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A DAG of stages sharing one cache
///
/// Nodes are stage names; edges point from a preceding stage to its
/// dependent. The graph is acyclic after every successful call and is left
/// untouched by a rejected one.
pub struct Pipeline {
    name: String,
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    stages: HashMap<String, Arc<dyn Stage>>,
    cache: SharedCache,
    serializer: SharedSerializer,
}

impl Pipeline {
    /// Create an empty pipeline backed by `cache`
    pub fn new(name: impl Into<String>, cache: SharedCache) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            stages: HashMap::new(),
            cache,
            serializer: JsonSerializer::shared(),
        }
    }

    /// Use `serializer` for bookkeeping records instead of JSON
    pub fn with_serializer(mut self, serializer: SharedSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn serializer(&self) -> &SharedSerializer {
        &self.serializer
    }

    /// Number of nodes, including predecessors not yet registered
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Register a stage and the edges from each of its preceding stages
    ///
    /// Predecessors that are not registered yet become placeholder nodes.
    /// Re-adding the same stage is a no-op; the cycle check runs before
    /// anything is committed.
    pub fn add_stage(&mut self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.name().to_string();
        if name.is_empty() {
            return Err(PipelineError::InvalidStageType(
                "stage name must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.stages.get(&name) {
            if !Arc::ptr_eq(existing, &stage) {
                return Err(PipelineError::DuplicateStage(name));
            }
        }

        self.verify_acyclic_with(&name, stage.preceding_stages())?;

        let node = self.ensure_node(&name);
        for preceding in stage.preceding_stages() {
            let from = self.ensure_node(preceding);
            self.graph.update_edge(from, node, ());
        }
        self.stages.insert(name.clone(), stage);

        debug!(stage = %name, pipeline = %self.name, "stage added");
        Ok(())
    }

    /// Register stages in order, stopping at the first failure
    pub fn add_stages<I>(&mut self, stages: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn Stage>>,
    {
        for stage in stages {
            self.add_stage(stage)?;
        }
        Ok(())
    }

    /// Adding edges `preceding -> name` closes a cycle exactly when `name`
    /// already reaches one of its new predecessors.
    fn verify_acyclic_with(&self, name: &str, preceding: &[String]) -> Result<()> {
        for pred in preceding {
            let closes_cycle = pred == name
                || match (self.index.get(name), self.index.get(pred)) {
                    (Some(&node), Some(&pred_node)) => {
                        has_path_connecting(&self.graph, node, pred_node, None)
                    }
                    _ => false,
                };

            if closes_cycle {
                return Err(PipelineError::DagVerification {
                    stage: name.to_string(),
                    preceding: pred.clone(),
                });
            }
        }
        Ok(())
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.index.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), node);
        node
    }

    /// Get a registered stage by name
    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.get(name)
    }

    /// All node names in insertion order
    pub fn stage_names(&self) -> Vec<String> {
        self.graph.node_weights().cloned().collect()
    }

    /// Direct predecessors of `name`
    pub fn predecessors(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Direct dependents of `name`
    pub fn successors(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        names.sort();
        names
    }

    /// Edges as `(preceding, dependent)` pairs
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect()
    }

    /// Grouped topological order of the DAG
    ///
    /// Computed lazily; each call starts a fresh computation.
    pub fn grouped_order(&self) -> ExecutionGroups<'_> {
        ExecutionGroups::new(&self.graph)
    }

    /// Fail if any node is only a placeholder for an unregistered predecessor
    pub fn verify_registered(&self) -> Result<()> {
        match self
            .graph
            .node_weights()
            .find(|name| !self.stages.contains_key(*name))
        {
            Some(missing) => Err(PipelineError::UnregisteredStage(missing.clone())),
            None => Ok(()),
        }
    }

    /// Look up a stage and execute it
    pub async fn run_stage(&self, name: &str) -> Result<()> {
        let stage = self.stage_handle(name)?;
        stage.execute().await?;
        Ok(())
    }

    pub(crate) fn stage_handle(&self, name: &str) -> Result<Arc<dyn Stage>> {
        self.stages
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnregisteredStage(name.to_string()))
    }

    /// Serializable picture of the DAG
    pub fn snapshot(&self) -> PipelineSnapshot {
        let stages = self
            .graph
            .node_weights()
            .filter_map(|name| self.stages.get(name))
            .map(|stage| stage.descriptor())
            .collect();

        PipelineSnapshot::new(self.name.clone(), self.stage_names(), self.edges(), stages)
    }

    /// Rebuild the pipeline persisted under the `pipeline` key of `cache`
    ///
    /// Each stage's operator is revived by kind through `registry`. The
    /// restored pipeline uses JSON; see [`Pipeline::restore_with`].
    pub async fn restore(cache: SharedCache, registry: &StageRegistry) -> Result<Self> {
        Self::restore_with(cache, JsonSerializer::shared(), registry).await
    }

    /// Like [`Pipeline::restore`], for a pipeline built `with_serializer`
    pub async fn restore_with(
        cache: SharedCache,
        serializer: SharedSerializer,
        registry: &StageRegistry,
    ) -> Result<Self> {
        let stored = cache
            .read(keys::PIPELINE)
            .await?
            .ok_or(PipelineError::MissingSnapshot)?;
        let snapshot = SnapshotSerializer.deserialize(&stored)?;

        let mut pipeline =
            Pipeline::new(snapshot.name.clone(), cache.clone()).with_serializer(serializer);
        for name in &snapshot.nodes {
            pipeline.ensure_node(name);
        }
        for descriptor in snapshot.stages {
            let stage = registry.revive(descriptor, cache.clone(), pipeline.serializer.clone())?;
            pipeline.add_stage(stage)?;
        }

        info!(
            "Restored pipeline {} with {} stages",
            pipeline.name,
            pipeline.stages.len()
        );
        Ok(pipeline)
    }

    /// Run the whole pipeline
    ///
    /// `workers` of `None` or `0` runs every group serially; otherwise each
    /// group fans out over a pool of that many workers.
    pub async fn start(&self, workers: Option<usize>) -> Result<RunSummary> {
        ExecutionEngine::new(SchedulingStrategy::from_workers(workers))
            .execute(self)
            .await
    }
}
