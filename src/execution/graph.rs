//! Step dependency graph
//!
//! Steps are declared with the ids they depend on. [`GraphBuilder::build`]
//! validates the declaration (unique ids, known dependencies, no cycles,
//! disjoint write-sets for steps that may run concurrently) and layers the
//! steps into stages: every step in a stage depends only on steps in earlier
//! stages.

use crate::core::{StateKey, Step};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Invalid graph declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("graph has no steps")]
    Empty,

    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("cycle detected in step graph: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("steps '{first}' and '{second}' may run concurrently but both write {key}")]
    WriteConflict {
        first: String,
        second: String,
        key: StateKey,
    },
}

struct GraphNode {
    step: Arc<dyn Step>,
    depends_on: Vec<String>,
}

/// Collects steps and their dependencies
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<GraphNode>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a step and the ids of the steps it depends on
    pub fn add_step<I, S>(mut self, step: Arc<dyn Step>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.push(GraphNode {
            step,
            depends_on: depends_on.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate the declaration and compute execution stages
    pub fn build(self) -> Result<PipelineGraph, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let id = node.step.id().to_string();
            if index.insert(id.clone(), i).is_some() {
                return Err(GraphError::DuplicateStep(id));
            }
        }

        let mut edges = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut deps = Vec::with_capacity(node.depends_on.len());
            for dep in &node.depends_on {
                let &dep_idx = index.get(dep).ok_or_else(|| GraphError::UnknownDependency {
                    step: node.step.id().to_string(),
                    dependency: dep.clone(),
                })?;
                deps.push(dep_idx);
            }
            edges.push(deps);
        }

        let order = topological_order(&self.nodes, &edges)?;
        let ancestors = ancestor_sets(&order, &edges);
        let stages = stage_layers(&order, &edges);

        let graph = PipelineGraph {
            nodes: self.nodes,
            index,
            ancestors,
            stages,
        };
        graph.check_write_sets()?;
        Ok(graph)
    }
}

/// Depth-first topological sort; fails with the offending path on a cycle
fn topological_order(nodes: &[GraphNode], edges: &[Vec<usize>]) -> Result<Vec<usize>, GraphError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: usize,
        nodes: &[GraphNode],
        edges: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), GraphError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = stack.iter().position(|&n| n == node).unwrap_or(0);
                let mut path: Vec<String> = stack[start..]
                    .iter()
                    .map(|&n| nodes[n].step.id().to_string())
                    .collect();
                path.push(nodes[node].step.id().to_string());
                return Err(GraphError::Cycle { path });
            }
            Mark::Unvisited => {}
        }

        marks[node] = Mark::InProgress;
        stack.push(node);
        for &dep in &edges[node] {
            visit(dep, nodes, edges, marks, stack, order)?;
        }
        stack.pop();
        marks[node] = Mark::Done;
        order.push(node);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(nodes.len());
    for node in 0..nodes.len() {
        visit(node, nodes, edges, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

/// Transitive dependencies of every node; `order` must be topological
fn ancestor_sets(order: &[usize], edges: &[Vec<usize>]) -> Vec<HashSet<usize>> {
    let mut ancestors = vec![HashSet::new(); edges.len()];
    for &node in order {
        let mut set = HashSet::new();
        for &dep in &edges[node] {
            set.insert(dep);
            set.extend(ancestors[dep].iter().copied());
        }
        ancestors[node] = set;
    }
    ancestors
}

/// Group nodes by longest dependency chain; declaration order within a stage
fn stage_layers(order: &[usize], edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut level = vec![0usize; edges.len()];
    for &node in order {
        level[node] = edges[node]
            .iter()
            .map(|&dep| level[dep] + 1)
            .max()
            .unwrap_or(0);
    }

    let depth = level.iter().copied().max().map_or(0, |max| max + 1);
    let mut stages = vec![Vec::new(); depth];
    for (node, &lvl) in level.iter().enumerate() {
        stages[lvl].push(node);
    }
    stages
}

/// A validated, acyclic step graph
pub struct PipelineGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    ancestors: Vec<HashSet<usize>>,
    stages: Vec<Vec<usize>>,
}

impl PipelineGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Step ids in declaration order
    pub fn step_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.step.id()).collect()
    }

    pub fn step(&self, id: &str) -> Option<&Arc<dyn Step>> {
        self.index.get(id).map(|&i| &self.nodes[i].step)
    }

    /// Direct dependencies of a step
    pub fn dependencies(&self, id: &str) -> Option<&[String]> {
        self.index.get(id).map(|&i| self.nodes[i].depends_on.as_slice())
    }

    /// Whether `step` depends on `dependency`, directly or transitively
    pub fn depends_on_transitively(&self, step: &str, dependency: &str) -> bool {
        match (self.index.get(step), self.index.get(dependency)) {
            (Some(&s), Some(&d)) => self.ancestors[s].contains(&d),
            _ => false,
        }
    }

    /// Step ids grouped into execution stages
    pub fn stages(&self) -> Vec<Vec<&str>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|&i| self.nodes[i].step.id()).collect())
            .collect()
    }

    pub(crate) fn stage_indices(&self) -> &[Vec<usize>] {
        &self.stages
    }

    pub(crate) fn step_at(&self, index: usize) -> &Arc<dyn Step> {
        &self.nodes[index].step
    }

    pub(crate) fn ancestors_of(&self, index: usize) -> &HashSet<usize> {
        &self.ancestors[index]
    }

    fn independent(&self, a: usize, b: usize) -> bool {
        a != b && !self.ancestors[a].contains(&b) && !self.ancestors[b].contains(&a)
    }

    fn check_write_sets(&self) -> Result<(), GraphError> {
        let writes: Vec<HashSet<StateKey>> = self
            .nodes
            .iter()
            .map(|n| n.step.writes().into_iter().collect())
            .collect();

        for a in 0..self.nodes.len() {
            for b in (a + 1)..self.nodes.len() {
                if !self.independent(a, b) {
                    continue;
                }
                let mut shared: Vec<&StateKey> = writes[a].intersection(&writes[b]).collect();
                shared.sort();
                if let Some(key) = shared.first() {
                    return Err(GraphError::WriteConflict {
                        first: self.nodes[a].step.id().to_string(),
                        second: self.nodes[b].step.id().to_string(),
                        key: (*key).clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
