//! Implementation of the `relgraph plan` command.
//!
//! Resolves descriptors into the final artifact list and prints it in build
//! order without building anything.

use anyhow::{Context, Result};
use serde::Serialize;

use relgraph_lib::artifact::ArtifactInstance;
use relgraph_lib::catalog::standard_registry;
use relgraph_lib::config::RunOptions;
use relgraph_lib::options::Options;

use crate::output::{OutputFormat, print_json, print_warning, symbols};

#[derive(Serialize)]
struct PlannedArtifact<'a> {
  artifact: &'a str,
  options: &'a Options,
  requested: bool,
  requires: Vec<String>,
}

impl<'a> From<&'a ArtifactInstance> for PlannedArtifact<'a> {
  fn from(instance: &'a ArtifactInstance) -> Self {
    Self {
      artifact: instance.name(),
      options: instance.options(),
      requested: instance.requested,
      requires: instance.requires.iter().map(ToString::to_string).collect(),
    }
  }
}

pub fn cmd_plan(descriptors: &[String], run: &RunOptions, output: OutputFormat) -> Result<()> {
  let registry = standard_registry().context("Failed to load artifact catalog")?;
  let instances = registry
    .final_artifact_list(descriptors, run)
    .context("Failed to resolve artifacts")?;

  if output.is_json() {
    let planned: Vec<PlannedArtifact> = instances.iter().map(PlannedArtifact::from).collect();
    return print_json(&planned);
  }

  if instances.is_empty() {
    print_warning("No artifacts match the selected targets");
    return Ok(());
  }

  println!("Plan: {} artifact(s)", instances.len());
  for (i, instance) in instances.iter().enumerate() {
    let marker = if instance.requested { "*" } else { " " };
    println!("{:>3}. {} {}", i + 1, marker, instance.key());
    for requirement in &instance.requires {
      println!("       {} {}", symbols::ARROW, requirement);
    }
  }
  Ok(())
}
