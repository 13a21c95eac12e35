//! Implementation of the `relgraph artifacts` command.

use anyhow::{Context, Result};
use serde::Serialize;

use relgraph_lib::artifact::Artifact;
use relgraph_lib::catalog::standard_registry;
use relgraph_lib::output::OutputKind;

use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Serialize)]
struct ArtifactSummary<'a> {
  name: &'a str,
  kind: OutputKind,
  requires: &'a [String],
  constraint: String,
  flags: Vec<&'a str>,
}

impl<'a> From<&'a Artifact> for ArtifactSummary<'a> {
  fn from(artifact: &'a Artifact) -> Self {
    Self {
      name: &artifact.name,
      kind: artifact.kind,
      requires: &artifact.requires,
      constraint: artifact.constraint.to_string(),
      flags: artifact.flags.iter().map(|f| f.name.as_str()).collect(),
    }
  }
}

pub fn cmd_artifacts(output: OutputFormat) -> Result<()> {
  let registry = standard_registry().context("Failed to load artifact catalog")?;
  let summaries: Vec<ArtifactSummary> = registry.artifacts().map(ArtifactSummary::from).collect();

  if output.is_json() {
    return print_json(&summaries);
  }

  for (i, summary) in summaries.iter().enumerate() {
    if i > 0 {
      println!();
    }
    println!("{} ({})", summary.name, summary.kind);
    if !summary.requires.is_empty() {
      print_stat("requires", &summary.requires.join(", "));
    }
    print_stat("constraint", &summary.constraint);
    print_stat("flags", &summary.flags.join(" "));
  }
  Ok(())
}
