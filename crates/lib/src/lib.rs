//! relgraph-lib: the release artifact build graph.
//!
//! This crate turns textual artifact descriptors into built, published
//! release artifacts:
//! - `Registry`: declared artifacts, their flags, requirements and constraints
//! - `ArgumentResolver`: lazily resolved, memoized external inputs
//! - `Orchestrator`: builds a resolved artifact list once per canonical name
//! - `ArtifactStore`: the run's cache of built outputs
//! - `Publisher`: bounded-parallel export and upload of the results

pub mod arguments;
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod consts;
pub mod execute;
pub mod naming;
pub mod options;
pub mod output;
pub mod platform;
pub mod publish;
pub mod store;
pub mod util;
