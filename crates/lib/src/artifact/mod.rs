//! Artifacts and the artifact graph.
//!
//! An [`Artifact`] is a named output (a tarball, a package, a container image)
//! together with the flags that parametrize it and the handler that names and
//! builds it. Artifacts are declared in a [`Registry`]; descriptor strings pick
//! one and apply flags; the registry expands requested descriptors into an
//! ordered list of [`ArtifactInstance`]s for the build orchestrator.

pub mod descriptor;
pub mod registry;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use descriptor::DescriptorError;
pub use registry::{Registry, RegistryError};
pub use types::{
  Artifact, ArtifactContext, ArtifactHandler, ArtifactInstance, Constraint, InstanceKey, RequiredOutput,
};
