//! Artifact registry and dependency graph.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::descriptor::{self, DescriptorError, SEPARATOR};
use super::types::{Artifact, ArtifactInstance, InstanceKey};
use crate::arguments::Argument;
use crate::config::RunOptions;
use crate::options::{OptionError, OptionKey};
use crate::platform::Distribution;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("artifact '{0}' is already registered")]
  DuplicateArtifact(String),

  #[error("artifact '{artifact}' declares flag '{flag}' twice")]
  DuplicateFlag { artifact: String, flag: String },

  #[error("artifact '{artifact}': {source}")]
  InvalidOption {
    artifact: String,
    #[source]
    source: OptionError,
  },

  #[error("argument '{argument}' is declared twice with different resolvers")]
  ConflictingArgument { argument: String },

  #[error("artifact '{artifact}' requires unregistered artifact '{requirement}'")]
  UnknownRequirement { artifact: String, requirement: String },

  #[error("dependency cycle through artifact '{artifact}'")]
  Cycle { artifact: String },

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),
}

/// Registered artifacts, in registration order.
///
/// Registries are plain values: build one, hand it to the planner, drop it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  artifacts: Vec<Artifact>,
  index: HashMap<String, usize>,
  arguments: HashMap<String, Argument>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an artifact after checking its name, flags, option types and
  /// arguments. Requirements are checked later by [`Registry::validate`] so
  /// artifacts can be registered in any order.
  pub fn register(&mut self, artifact: Artifact) -> Result<(), RegistryError> {
    if self.index.contains_key(&artifact.name) {
      return Err(RegistryError::DuplicateArtifact(artifact.name));
    }

    let invalid = |source| RegistryError::InvalidOption {
      artifact: artifact.name.clone(),
      source,
    };
    artifact.options.validate().map_err(invalid)?;

    let mut seen = HashSet::new();
    for flag in &artifact.flags {
      if !seen.insert(flag.name.as_str()) {
        return Err(RegistryError::DuplicateFlag {
          artifact: artifact.name.clone(),
          flag: flag.name.clone(),
        });
      }
      flag.validate().map_err(invalid)?;
    }

    let mut pending: Vec<&Argument> = artifact.arguments.iter().collect();
    let mut declared = Vec::new();
    while let Some(argument) = pending.pop() {
      match self.arguments.get(&argument.name) {
        Some(existing) if !existing.same(argument) => {
          return Err(RegistryError::ConflictingArgument {
            argument: argument.name.clone(),
          });
        }
        Some(_) => {}
        None => declared.push(argument.clone()),
      }
      pending.extend(argument.all_requires());
    }
    for argument in declared {
      self.arguments.entry(argument.name.clone()).or_insert(argument);
    }

    debug!(artifact = %artifact.name, flags = artifact.flags.len(), "registered artifact");
    self.index.insert(artifact.name.clone(), self.artifacts.len());
    self.artifacts.push(artifact);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Artifact> {
    self.index.get(name).map(|&i| &self.artifacts[i])
  }

  pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
    self.artifacts.iter()
  }

  pub fn len(&self) -> usize {
    self.artifacts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.artifacts.is_empty()
  }

  /// Check that every requirement is registered and that requirements form a DAG.
  pub fn validate(&self) -> Result<(), RegistryError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: Vec<_> = self.artifacts.iter().map(|a| graph.add_node(a.name.as_str())).collect();

    for (i, artifact) in self.artifacts.iter().enumerate() {
      for requirement in &artifact.requires {
        let Some(&j) = self.index.get(requirement) else {
          return Err(RegistryError::UnknownRequirement {
            artifact: artifact.name.clone(),
            requirement: requirement.clone(),
          });
        };
        graph.add_edge(nodes[j], nodes[i], ());
      }
    }

    toposort(&graph, None).map_err(|cycle| RegistryError::Cycle {
      artifact: graph[cycle.node_id()].to_string(),
    })?;
    Ok(())
  }

  pub fn parse(&self, descriptor: &str) -> Result<Artifact, DescriptorError> {
    descriptor::parse(self, descriptor)
  }

  /// Resolve requested descriptors into the ordered list of instances to build.
  ///
  /// Requirements come before their dependents and every (artifact, options)
  /// pair appears once. Instances whose constraint rejects the run's targets
  /// are dropped, together with everything built from them.
  pub fn final_artifact_list<S: AsRef<str>>(
    &self,
    requested: &[S],
    run: &RunOptions,
  ) -> Result<Vec<ArtifactInstance>, RegistryError> {
    self.validate()?;

    let mut list = Vec::new();
    let mut positions = HashMap::new();
    for descriptor in requested {
      for artifact in self.instantiate(descriptor.as_ref(), &run.targets)? {
        self.visit(artifact, true, &mut list, &mut positions)?;
      }
    }

    let mut dropped: HashSet<InstanceKey> = HashSet::new();
    let mut kept = Vec::with_capacity(list.len());
    for instance in list {
      let key = instance.key();
      if let Some(failed) = instance.requires.iter().find(|r| dropped.contains(*r)) {
        warn!(artifact = %key, requirement = %failed, "dropping artifact: requirement was dropped");
        dropped.insert(key);
      } else if !instance.artifact.constraint.allows(instance.options(), &run.targets) {
        debug!(artifact = %key, constraint = %instance.artifact.constraint, "dropping artifact: constraint not met");
        dropped.insert(key);
      } else {
        kept.push(instance);
      }
    }

    // Requirements whose every dependent was dropped are not needed either.
    let mut needed: HashSet<InstanceKey> = HashSet::new();
    let mut pruned = Vec::with_capacity(kept.len());
    for instance in kept.into_iter().rev() {
      if instance.requested || needed.contains(&instance.key()) {
        needed.extend(instance.requires.iter().cloned());
        pruned.push(instance);
      }
    }
    pruned.reverse();
    let kept = pruned;

    info!(
      requested = requested.len(),
      instances = kept.len(),
      dropped = dropped.len(),
      "resolved artifact list"
    );
    Ok(kept)
  }

  /// Parse a descriptor and expand it across the run targets if it names no
  /// platform but its artifact offers platform flags.
  fn instantiate(&self, descriptor: &str, targets: &[Distribution]) -> Result<Vec<Artifact>, RegistryError> {
    let parsed = self.parse(descriptor)?;
    if parsed.options.distribution().is_some() || !parsed.offers_distribution() {
      return Ok(vec![parsed]);
    }

    targets
      .iter()
      .map(|target| {
        let token = target.to_string();
        if parsed.flag(&token).is_some() {
          // The target acts as a leading token, so explicit flags still win.
          Ok(self.parse(&format!("{}{}{}", token, SEPARATOR, descriptor))?)
        } else {
          let mut artifact = parsed.clone();
          artifact.options = std::mem::take(&mut artifact.options).with(OptionKey::Distribution, target.clone());
          Ok(artifact)
        }
      })
      .collect()
  }

  fn visit(
    &self,
    artifact: Artifact,
    requested: bool,
    list: &mut Vec<ArtifactInstance>,
    positions: &mut HashMap<InstanceKey, usize>,
  ) -> Result<InstanceKey, RegistryError> {
    let key = artifact.key();
    if let Some(&position) = positions.get(&key) {
      list[position].requested |= requested;
      return Ok(key);
    }

    let mut requires = Vec::with_capacity(artifact.requires.len());
    for name in &artifact.requires {
      let required = self.get(name).ok_or_else(|| RegistryError::UnknownRequirement {
        artifact: artifact.name.clone(),
        requirement: name.clone(),
      })?;
      let mut child = required.clone();
      child.options.merge(&artifact.options);
      requires.push(self.visit(child, false, list, positions)?);
    }

    positions.insert(key.clone(), list.len());
    list.push(ArtifactInstance {
      artifact,
      requested,
      requires,
    });
    Ok(key)
  }
}
