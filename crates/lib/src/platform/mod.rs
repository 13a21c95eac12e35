//! Target platforms.
//!
//! A [`Distribution`] is the `os/arch[/variant]` triple an artifact is built
//! for, e.g. `linux/amd64` or `linux/arm/v7`.

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use os::Os;

/// Errors parsing a distribution string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
  #[error("invalid distribution '{0}': expected os/arch or os/arch/variant")]
  Malformed(String),
  #[error("invalid distribution '{0}': only arm variants take a 'v' prefix")]
  LetteredVariant(String),
}

/// A build target platform (e.g. "linux/arm/v7").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Distribution {
  pub os: String,
  pub arch: String,
  pub variant: Option<String>,
}

impl Distribution {
  /// Create a distribution without a variant
  pub fn new(os: &str, arch: &str) -> Self {
    Self {
      os: os.to_string(),
      arch: arch.to_string(),
      variant: None,
    }
  }

  /// Create a distribution with an architecture variant
  pub fn with_variant(os: &str, arch: &str, variant: &str) -> Self {
    Self {
      os: os.to_string(),
      arch: arch.to_string(),
      variant: Some(variant.to_string()),
    }
  }

  /// Detect the host distribution at runtime
  pub fn host() -> Self {
    Self::new(os::host_os(), arch::host_arch())
  }

  /// Returns the known operating system, if this is one constraints can name
  pub fn os_kind(&self) -> Option<Os> {
    Os::parse(&self.os)
  }

  /// Returns the architecture including its variant (e.g. "arm/v7")
  pub fn full_arch(&self) -> String {
    match &self.variant {
      Some(variant) => format!("{}/{}", self.arch, variant),
      None => self.arch.clone(),
    }
  }
}

impl fmt::Display for Distribution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.full_arch())
  }
}

impl FromStr for Distribution {
  type Err = DistributionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
      return Err(DistributionError::Malformed(s.to_string()));
    }
    match parts.as_slice() {
      [os, arch] => Ok(Self::new(os, arch)),
      [_, arch, variant] if !arch::has_lettered_variant(arch) && arch::variant_number(variant).is_some() => {
        Err(DistributionError::LetteredVariant(s.to_string()))
      }
      [os, arch, variant] => Ok(Self::with_variant(os, arch, variant)),
      _ => Err(DistributionError::Malformed(s.to_string())),
    }
  }
}

impl TryFrom<String> for Distribution {
  type Error = DistributionError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Distribution> for String {
  fn from(value: Distribution) -> Self {
    value.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_two_and_three_part_distributions() {
    let d: Distribution = "linux/amd64".parse().unwrap();
    assert_eq!(d, Distribution::new("linux", "amd64"));

    let d: Distribution = "linux/arm/v7".parse().unwrap();
    assert_eq!(d.variant.as_deref(), Some("v7"));
    assert_eq!(d.full_arch(), "arm/v7");
    assert_eq!(d.to_string(), "linux/arm/v7");
  }

  #[test]
  fn rejects_malformed_distributions() {
    assert!("linux".parse::<Distribution>().is_err());
    assert!("linux//v7".parse::<Distribution>().is_err());
    assert!("a/b/c/d".parse::<Distribution>().is_err());
  }

  #[test]
  fn only_arm_takes_lettered_variants() {
    let err = "linux/amd64/v3".parse::<Distribution>().unwrap_err();
    assert_eq!(err, DistributionError::LetteredVariant("linux/amd64/v3".to_string()));

    let d: Distribution = "linux/amd64/3".parse().unwrap();
    assert_eq!(d.variant.as_deref(), Some("3"));
    assert!("linux/amd64/dynamic".parse::<Distribution>().is_ok());
  }

  #[test]
  fn serializes_as_plain_string() {
    let d = Distribution::with_variant("linux", "arm", "v6");
    let json = serde_json::to_string(&d).unwrap();
    assert_eq!(json, "\"linux/arm/v6\"");
    let back: Distribution = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
  }

  #[test]
  fn os_kind_only_for_known_systems() {
    assert_eq!(Distribution::new("windows", "amd64").os_kind(), Some(Os::Windows));
    assert_eq!(Distribution::new("plan9", "arm").os_kind(), None);
  }
}
