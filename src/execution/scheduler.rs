//! Execution scheduler - determines which stages run together

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// Strategy for executing the stages of one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Run the group's stages one at a time
    #[default]
    Sequential,

    /// Fan the group out over at most N concurrent workers
    WorkerPool(usize),
}

impl SchedulingStrategy {
    /// `None` and `Some(0)` both mean serial execution
    pub fn from_workers(workers: Option<usize>) -> Self {
        match workers {
            None | Some(0) => SchedulingStrategy::Sequential,
            Some(n) => SchedulingStrategy::WorkerPool(n),
        }
    }

    /// Number of stages that may run at once
    pub fn concurrency(&self) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::WorkerPool(n) => *n,
        }
    }
}

/// Grouped topological order over a stage graph
///
/// Yields one group at a time: first every node with no predecessors, then
/// every node whose predecessors all appeared in earlier groups, and so on.
/// Stages within a group are independent of each other.
pub struct ExecutionGroups<'a> {
    graph: &'a DiGraph<String, ()>,
    in_degree: HashMap<NodeIndex, usize>,
    ready: Vec<NodeIndex>,
}

impl<'a> ExecutionGroups<'a> {
    pub fn new(graph: &'a DiGraph<String, ()>) -> Self {
        let in_degree: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|n| (n, graph.edges_directed(n, Direction::Incoming).count()))
            .collect();

        let ready = graph
            .node_indices()
            .filter(|n| in_degree.get(n) == Some(&0))
            .collect();

        Self {
            graph,
            in_degree,
            ready,
        }
    }
}

impl Iterator for ExecutionGroups<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() {
            return None;
        }

        let current = std::mem::take(&mut self.ready);
        let mut next = Vec::new();

        for node in &current {
            for edge in self.graph.edges_directed(*node, Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = self.in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(target);
                    }
                }
            }
        }

        next.sort();
        self.ready = next;

        Some(current.into_iter().map(|n| self.graph[n].clone()).collect())
    }
}
