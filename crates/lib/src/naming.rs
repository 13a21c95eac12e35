//! Canonical artifact filenames.
//!
//! Every built artifact is identified by a filename of the form
//!
//! ```text
//! <name>_<version>_<build id>_<os>_<arch>[-<variant>].<extension>
//! ```
//!
//! e.g. `grafana-enterprise_v10.2.0_4821_linux_arm-7.tar.gz`. The extension may
//! span several dots (`ubuntu.docker.tar.gz`). The name field may contain
//! hyphens and is never split.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::Distribution;
use crate::platform::arch::{has_lettered_variant, variant_number};

/// Number of `_`-separated fields in a canonical name (without extension).
const FIELD_COUNT: usize = 5;

/// Errors decoding a canonical filename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
  #[error("'{filename}' has {found} name fields, expected 5")]
  FieldCount { filename: String, found: usize },

  #[error("'{filename}' has an empty {field} field")]
  EmptyField { filename: String, field: &'static str },
}

/// The decoded identity of a canonical filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameOpts {
  pub name: String,
  pub version: String,
  pub build_id: String,
  pub distro: Distribution,
}

impl NameOpts {
  /// Encode these options with the given extension.
  pub fn encode(&self, extension: &str) -> String {
    encode_parts(
      &self.name,
      &self.version,
      &self.build_id,
      &self.distro.os,
      &self.distro.arch,
      self.distro.variant.as_deref(),
      extension,
    )
  }
}

/// Encode a canonical filename from its parts.
///
/// The variant is joined to the arch with `-` and loses its letter prefix
/// (`arm` + `v7` becomes `arm-7`).
pub fn encode_parts(
  name: &str,
  version: &str,
  build_id: &str,
  os: &str,
  arch: &str,
  variant: Option<&str>,
  extension: &str,
) -> String {
  let arch = match variant {
    Some(variant) if !variant.is_empty() => format!("{}-{}", arch, strip_variant_prefix(variant)),
    _ => arch.to_string(),
  };
  format!("{}_{}_{}_{}_{}.{}", name, version, build_id, os, arch, extension)
}

/// Decode a canonical filename (or a path ending in one).
pub fn decode(filename: &str) -> Result<NameOpts, NamingError> {
  let base = basename(filename);
  let stem = strip_extension(base);

  let fields: Vec<&str> = stem.split('_').collect();
  if fields.len() != FIELD_COUNT {
    return Err(NamingError::FieldCount {
      filename: base.to_string(),
      found: fields.len(),
    });
  }

  const FIELD_NAMES: [&str; FIELD_COUNT] = ["name", "version", "build id", "os", "arch"];
  for (value, field) in fields.iter().zip(FIELD_NAMES) {
    if value.is_empty() {
      return Err(NamingError::EmptyField {
        filename: base.to_string(),
        field,
      });
    }
  }

  let (arch, variant) = match fields[4].split_once('-') {
    Some((arch, variant)) if has_lettered_variant(arch) => (arch, Some(format!("v{}", variant))),
    Some((arch, variant)) => (arch, Some(variant.to_string())),
    None => (fields[4], None),
  };

  Ok(NameOpts {
    name: fields[0].to_string(),
    version: fields[1].to_string(),
    build_id: fields[2].to_string(),
    distro: Distribution {
      os: fields[3].to_string(),
      arch: arch.to_string(),
      variant,
    },
  })
}

/// Returns the (possibly multi-segment) extension of a canonical filename.
pub fn extension(filename: &str) -> Option<&str> {
  let base = basename(filename);
  let last_field = base.rfind('_').map(|i| i + 1).unwrap_or(0);
  base[last_field..]
    .find('.')
    .map(|dot| &base[last_field + dot + 1..])
    .filter(|ext| !ext.is_empty())
}

fn basename(filename: &str) -> &str {
  Path::new(filename)
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or(filename)
}

/// Drops everything from the first `.` inside the last `_` segment.
fn strip_extension(base: &str) -> &str {
  let last_field = base.rfind('_').map(|i| i + 1).unwrap_or(0);
  match base[last_field..].find('.') {
    Some(dot) => &base[..last_field + dot],
    None => base,
  }
}

/// `v7` -> `7`. Variants that are not a lettered number are kept as-is.
fn strip_variant_prefix(variant: &str) -> &str {
  variant_number(variant).unwrap_or(variant)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encodes_variant_without_letter_prefix() {
    let name = encode_parts(
      "grafana-enterprise-rpi",
      "v1.0.1-test",
      "333",
      "plan9",
      "arm",
      Some("7"),
      "tar.gz",
    );
    assert_eq!(name, "grafana-enterprise-rpi_v1.0.1-test_333_plan9_arm-7.tar.gz");

    let lettered = encode_parts("grafana", "v1", "1", "linux", "arm", Some("v7"), "deb");
    assert_eq!(lettered, "grafana_v1_1_linux_arm-7.deb");
  }

  #[test]
  fn decode_keeps_hyphenated_name_intact() {
    let opts = decode("grafana-enterprise-rpi_v1.0.1-test_333_plan9_arm-7.tar.gz").unwrap();
    assert_eq!(opts.name, "grafana-enterprise-rpi");
    assert_eq!(opts.version, "v1.0.1-test");
    assert_eq!(opts.build_id, "333");
    assert_eq!(opts.distro, Distribution::with_variant("plan9", "arm", "v7"));
  }

  #[test]
  fn decode_strips_multi_segment_extension() {
    let file = "grafana-enterprise_v1.0.1-test_333_plan9_arm-6.ubuntu.docker.tar.gz";
    let opts = decode(file).unwrap();
    assert_eq!(opts.name, "grafana-enterprise");
    assert_eq!(opts.version, "v1.0.1-test");
    assert_eq!(opts.build_id, "333");
    assert_eq!(opts.distro.os, "plan9");
    assert_eq!(opts.distro.full_arch(), "arm/v6");
    assert_eq!(extension(file), Some("ubuntu.docker.tar.gz"));
  }

  #[test]
  fn decode_uses_basename_of_paths() {
    let opts = decode("/tmp/dist/grafana_v10.0.0_99_linux_amd64.deb").unwrap();
    assert_eq!(opts.distro, Distribution::new("linux", "amd64"));
  }

  #[test]
  fn numbered_variants_on_other_arches_keep_no_prefix() {
    let opts = decode("grafana_v1_1_linux_amd64-2.tar.gz").unwrap();
    assert_eq!(opts.distro.arch, "amd64");
    assert_eq!(opts.distro.variant.as_deref(), Some("2"));
  }

  #[test]
  fn parsed_distributions_round_trip() {
    for target in ["linux/arm/v6", "linux/arm/v7", "linux/amd64/3", "linux/arm64"] {
      let opts = NameOpts {
        name: "grafana".to_string(),
        version: "v10.2.0".to_string(),
        build_id: "4821".to_string(),
        distro: target.parse().unwrap(),
      };
      assert_eq!(decode(&opts.encode("tar.gz")).unwrap(), opts, "{}", target);
    }
    assert!("linux/amd64/v3".parse::<Distribution>().is_err());
  }

  #[test]
  fn round_trip_preserves_fields() {
    let cases = [
      Distribution::new("linux", "amd64"),
      Distribution::with_variant("linux", "arm", "v6"),
      Distribution::with_variant("plan9", "amd64", "3"),
      Distribution::with_variant("linux", "arm64", "8"),
      Distribution::new("windows", "arm64"),
    ];
    for distro in cases {
      let opts = NameOpts {
        name: "grafana-enterprise-boring".to_string(),
        version: "v11.0.0-pre".to_string(),
        build_id: "1234".to_string(),
        distro,
      };
      for ext in ["tar.gz", "deb", "ubuntu.docker.tar.gz"] {
        assert_eq!(decode(&opts.encode(ext)).unwrap(), opts);
      }
    }
  }

  #[test]
  fn wrong_field_count_is_an_error() {
    let err = decode("grafana_v1_linux_amd64.tar.gz").unwrap_err();
    assert!(matches!(err, NamingError::FieldCount { found: 4, .. }));

    let err = decode("grafana_v1_1_linux_amd64_extra.tar.gz").unwrap_err();
    assert!(matches!(err, NamingError::FieldCount { found: 6, .. }));
  }

  #[test]
  fn empty_field_is_an_error() {
    let err = decode("grafana__1_linux_amd64.tar.gz").unwrap_err();
    assert_eq!(
      err,
      NamingError::EmptyField {
        filename: "grafana__1_linux_amd64.tar.gz".to_string(),
        field: "version",
      }
    );
  }
}
