//! Descriptor strings.
//!
//! A descriptor such as `linux/amd64:enterprise:targz` selects one registered
//! artifact and a set of its flags. The artifact token may appear anywhere;
//! flags apply left to right, so later tokens win on conflicting options.

use thiserror::Error;
use tracing::debug;

use super::registry::Registry;
use super::types::Artifact;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
  #[error("descriptor '{descriptor}' contains an empty token")]
  EmptyToken { descriptor: String },

  #[error("descriptor '{descriptor}' does not name an artifact")]
  NoArtifact { descriptor: String },

  #[error("descriptor '{descriptor}' names more than one artifact: {}", artifacts.join(", "))]
  ArtifactCollision { descriptor: String, artifacts: Vec<String> },

  #[error("descriptor '{descriptor}': '{flag}' is not a flag of artifact '{artifact}'")]
  UnknownFlag {
    descriptor: String,
    artifact: String,
    flag: String,
  },
}

impl DescriptorError {
  pub fn descriptor(&self) -> &str {
    match self {
      Self::EmptyToken { descriptor }
      | Self::NoArtifact { descriptor }
      | Self::ArtifactCollision { descriptor, .. }
      | Self::UnknownFlag { descriptor, .. } => descriptor,
    }
  }
}

/// Parse `descriptor` against `registry`.
///
/// Returns a copy of the matched artifact with its flags applied; the
/// registered artifact is left untouched.
pub fn parse(registry: &Registry, descriptor: &str) -> Result<Artifact, DescriptorError> {
  let tokens: Vec<&str> = descriptor.split(SEPARATOR).collect();
  if tokens.iter().any(|t| t.is_empty()) {
    return Err(DescriptorError::EmptyToken {
      descriptor: descriptor.to_string(),
    });
  }

  let named: Vec<(usize, &Artifact)> = tokens
    .iter()
    .enumerate()
    .filter_map(|(i, token)| registry.get(token).map(|artifact| (i, artifact)))
    .collect();

  let (artifact_index, registered) = match named.as_slice() {
    [] => {
      return Err(DescriptorError::NoArtifact {
        descriptor: descriptor.to_string(),
      });
    }
    [single] => *single,
    many => {
      return Err(DescriptorError::ArtifactCollision {
        descriptor: descriptor.to_string(),
        artifacts: many.iter().map(|(_, a)| a.name.clone()).collect(),
      });
    }
  };

  let mut artifact = registered.clone();
  for (i, token) in tokens.iter().enumerate() {
    if i == artifact_index {
      continue;
    }
    let flag = registered.flag(token).ok_or_else(|| DescriptorError::UnknownFlag {
      descriptor: descriptor.to_string(),
      artifact: registered.name.clone(),
      flag: token.to_string(),
    })?;
    flag.apply(&mut artifact.options);
  }

  debug!(descriptor = %descriptor, artifact = %artifact.name, options = %artifact.options, "parsed descriptor");
  Ok(artifact)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::artifact::testing::{noop, registry_of};
  use crate::options::{OptionKey, distribution_flags, edition_flags};
  use crate::output::OutputKind;
  use crate::platform::Distribution;

  fn registry() -> Registry {
    let flags: Vec<_> = distribution_flags().into_iter().chain(edition_flags()).collect();
    registry_of(vec![
      noop("targz", OutputKind::File).flags(flags.clone()),
      noop("deb", OutputKind::File).flags(flags),
    ])
  }

  #[test]
  fn applies_flags_in_order_wherever_the_artifact_is() {
    let registry = registry();
    for descriptor in ["linux/amd64:enterprise:targz", "targz:linux/amd64:enterprise", "linux/amd64:targz:enterprise"] {
      let artifact = parse(&registry, descriptor).unwrap();
      assert_eq!(artifact.name, "targz");
      assert_eq!(artifact.options.distribution(), Some(&Distribution::new("linux", "amd64")));
      assert_eq!(artifact.options.string(OptionKey::ProductName), Some("grafana-enterprise"));
      assert_eq!(artifact.options.bool(OptionKey::Static), Some(true));
    }
  }

  #[test]
  fn later_flags_win() {
    let registry = registry();
    let artifact = parse(&registry, "targz:oss:enterprise:linux/amd64:linux/amd64/dynamic").unwrap();
    assert_eq!(artifact.options.string(OptionKey::Edition), Some("enterprise"));
    assert_eq!(artifact.options.bool(OptionKey::Static), Some(false));
  }

  #[test]
  fn rpi_suffix_comes_from_the_arm_v6_flag() {
    let registry = registry();
    let artifact = parse(&registry, "targz:linux/arm/v6").unwrap();
    assert_eq!(artifact.options.string(OptionKey::NameSuffix), Some("rpi"));
    assert_eq!(
      artifact.options.distribution(),
      Some(&Distribution::with_variant("linux", "arm", "v6"))
    );
  }

  #[test]
  fn registry_entry_is_not_mutated() {
    let registry = registry();
    parse(&registry, "targz:enterprise").unwrap();
    assert!(registry.get("targz").unwrap().options.is_empty());
  }

  #[test]
  fn two_artifacts_collide() {
    let err = parse(&registry(), "linux/amd64:targz:deb").unwrap_err();
    assert_eq!(
      err,
      DescriptorError::ArtifactCollision {
        descriptor: "linux/amd64:targz:deb".to_string(),
        artifacts: vec!["targz".to_string(), "deb".to_string()],
      }
    );
  }

  #[test]
  fn unknown_flag_is_named() {
    let err = parse(&registry(), "targz:bogus-flag").unwrap_err();
    assert!(matches!(err, DescriptorError::UnknownFlag { ref flag, .. } if flag == "bogus-flag"));
    assert_eq!(err.descriptor(), "targz:bogus-flag");
  }

  #[test]
  fn no_artifact_and_empty_tokens() {
    assert!(matches!(
      parse(&registry(), "linux/amd64:oss"),
      Err(DescriptorError::NoArtifact { .. })
    ));
    assert!(matches!(
      parse(&registry(), "targz::oss"),
      Err(DescriptorError::EmptyToken { .. })
    ));
    assert!(matches!(parse(&registry(), ""), Err(DescriptorError::EmptyToken { .. })));
  }
}
