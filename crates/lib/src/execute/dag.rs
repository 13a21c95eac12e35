//! Execution DAG for artifact instances.
//!
//! This module provides a directed acyclic graph over a resolved artifact list
//! and computes the parallel execution waves the orchestrator walks.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::artifact::{ArtifactInstance, InstanceKey};

use super::types::ExecuteError;

/// A DAG over artifact instances, addressed by their position in the list it
/// was built from.
pub struct ExecutionDag {
  /// The underlying graph. Edges point from a requirement to its dependent.
  graph: DiGraph<usize, ()>,

  nodes: Vec<NodeIndex>,

  /// Requirements of each instance, in declaration order.
  dependencies: Vec<Vec<usize>>,
}

impl ExecutionDag {
  /// Build an execution DAG from an artifact list.
  ///
  /// # Errors
  ///
  /// Returns `MissingRequirement` if an instance requires one that is not in
  /// the list, and `CycleDetected` if the requirements do not form a DAG.
  pub fn from_instances(instances: &[ArtifactInstance]) -> Result<Self, ExecuteError> {
    let mut graph = DiGraph::new();
    let positions: HashMap<InstanceKey, usize> = instances.iter().enumerate().map(|(i, inst)| (inst.key(), i)).collect();
    let nodes: Vec<NodeIndex> = (0..instances.len()).map(|i| graph.add_node(i)).collect();
    let mut dependencies = Vec::with_capacity(instances.len());

    for (i, instance) in instances.iter().enumerate() {
      let mut deps = Vec::with_capacity(instance.requires.len());
      for requirement in &instance.requires {
        let Some(&dep) = positions.get(requirement) else {
          return Err(ExecuteError::MissingRequirement {
            artifact: instance.key().to_string(),
            requirement: requirement.to_string(),
          });
        };
        graph.add_edge(nodes[dep], nodes[i], ());
        deps.push(dep);
      }
      dependencies.push(deps);
    }

    let dag = Self {
      graph,
      nodes,
      dependencies,
    };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), ExecuteError> {
    toposort(&self.graph, None).map_err(|_| ExecuteError::CycleDetected)?;
    Ok(())
  }

  /// Instances organized into parallel execution waves.
  ///
  /// Every instance's requirements are in earlier waves. Within a wave,
  /// instances keep their list order.
  pub fn waves(&self) -> Result<Vec<Vec<usize>>, ExecuteError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|&&idx| in_degree[&idx] == 0).copied().collect();

      if ready.is_empty() {
        return Err(ExecuteError::CycleDetected);
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      ready.sort();
      waves.push(ready.into_iter().map(|idx| self.graph[idx]).collect());
    }

    Ok(waves)
  }

  /// Direct requirements of an instance.
  pub fn dependencies(&self, instance: usize) -> &[usize] {
    self.dependencies.get(instance).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
