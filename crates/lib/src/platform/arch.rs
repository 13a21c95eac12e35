/// Returns the distribution identifier of the host CPU architecture.
///
/// Rust target names are mapped onto the names used in distribution strings
/// (`x86_64` -> `amd64`, `aarch64` -> `arm64`, `x86` -> `386`).
pub fn host_arch() -> &'static str {
  match std::env::consts::ARCH {
    "x86_64" => "amd64",
    "aarch64" => "arm64",
    "x86" => "386",
    "powerpc64" => "ppc64le",
    other => other,
  }
}

/// Returns true if `arch` takes a lettered variant (`arm/v7`).
///
/// Only 32-bit arm spells its variants with a `v` prefix; numbered variants on
/// other architectures (`amd64/2`) carry no prefix.
pub fn has_lettered_variant(arch: &str) -> bool {
  arch == "arm"
}

/// Returns the number of a lettered variant (`v7` -> `7`).
pub fn variant_number(variant: &str) -> Option<&str> {
  variant
    .strip_prefix('v')
    .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn host_arch_is_never_a_rust_target_name() {
    let arch = host_arch();
    assert_ne!(arch, "x86_64");
    assert_ne!(arch, "aarch64");
  }

  #[test]
  fn only_arm_has_lettered_variants() {
    assert!(has_lettered_variant("arm"));
    assert!(!has_lettered_variant("arm64"));
    assert!(!has_lettered_variant("amd64"));
  }

  #[test]
  fn variant_numbers() {
    assert_eq!(variant_number("v7"), Some("7"));
    assert_eq!(variant_number("7"), None);
    assert_eq!(variant_number("v"), None);
    assert_eq!(variant_number("dynamic"), None);
  }
}
