//! Flag tokens and the standard flag vocabulary.

use serde::Serialize;

use super::types::{OptionError, OptionKey, OptionValue, Options};
use crate::platform::Distribution;

/// A named descriptor component that assigns a set of options.
///
/// In the descriptor `linux/amd64:enterprise:targz`, both `linux/amd64` and
/// `enterprise` are flag tokens of the `targz` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagToken {
  pub name: String,
  pub options: Options,
}

impl FlagToken {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      options: Options::new(),
    }
  }

  pub fn with(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
    self.options = self.options.with(key, value);
    self
  }

  /// Merge this token's options into `options`; the token wins on collisions.
  pub fn apply(&self, options: &mut Options) {
    options.merge(&self.options);
  }

  pub fn validate(&self) -> Result<(), OptionError> {
    self.options.validate()
  }

  /// Returns true if this token selects a platform.
  pub fn sets_distribution(&self) -> bool {
    self.options.contains(OptionKey::Distribution)
  }
}

/// Product editions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edition {
  Oss,
  Enterprise,
  Pro,
  Boring,
}

impl Edition {
  pub const ALL: [Edition; 4] = [Edition::Oss, Edition::Enterprise, Edition::Pro, Edition::Boring];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Oss => "oss",
      Self::Enterprise => "enterprise",
      Self::Pro => "pro",
      Self::Boring => "boring",
    }
  }

  pub fn product_name(&self) -> &'static str {
    match self {
      Self::Oss => "grafana",
      Self::Enterprise => "grafana-enterprise",
      Self::Pro => "grafana-pro",
      Self::Boring => "grafana-enterprise-boring",
    }
  }

  /// Whether the enterprise source tree is overlaid on the build.
  pub fn enterprise(&self) -> bool {
    !matches!(self, Self::Oss)
  }

  pub fn build_tags(&self) -> &'static [&'static str] {
    match self {
      Self::Oss => &["oss"],
      Self::Enterprise | Self::Boring => &["enterprise"],
      Self::Pro => &["enterprise", "pro"],
    }
  }

  pub fn experiments(&self) -> &'static [&'static str] {
    match self {
      Self::Boring => &["boringcrypto"],
      _ => &[],
    }
  }

  pub fn flag(&self) -> FlagToken {
    FlagToken::new(self.as_str())
      .with(OptionKey::Edition, self.as_str())
      .with(OptionKey::ProductName, self.product_name())
      .with(OptionKey::Enterprise, self.enterprise())
      .with(OptionKey::BuildTags, OptionValue::list(self.build_tags().iter().copied()))
      .with(OptionKey::Experiments, OptionValue::list(self.experiments().iter().copied()))
  }
}

/// (token, statically linked, package name suffix)
const DISTRIBUTIONS: &[(&str, bool, Option<&str>)] = &[
  ("linux/amd64", true, None),
  ("linux/amd64/dynamic", false, None),
  ("linux/arm64", true, None),
  ("linux/arm64/dynamic", false, None),
  ("linux/arm/v6", true, Some("rpi")),
  ("linux/arm/v7", true, None),
  ("linux/386", true, None),
  ("linux/s390x", true, None),
  ("linux/riscv64", true, None),
  ("darwin/amd64", true, None),
  ("darwin/arm64", true, None),
  ("windows/amd64", true, None),
  ("windows/arm64", true, None),
];

/// Distribution flags. The `/dynamic` tokens select the same platform as
/// their static counterpart with dynamic linking.
pub fn distribution_flags() -> Vec<FlagToken> {
  DISTRIBUTIONS
    .iter()
    .map(|(token, linked_static, suffix)| {
      let platform = token.strip_suffix("/dynamic").unwrap_or(token);
      let mut flag = FlagToken::new(token).with(OptionKey::Static, *linked_static);
      if let Ok(distro) = platform.parse::<Distribution>() {
        flag = flag.with(OptionKey::Distribution, distro);
      }
      if let Some(suffix) = suffix {
        flag = flag.with(OptionKey::NameSuffix, *suffix);
      }
      flag
    })
    .collect()
}

pub fn edition_flags() -> Vec<FlagToken> {
  Edition::ALL.iter().map(Edition::flag).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn later_tokens_win_on_collision() {
    let flags = distribution_flags();
    let static_amd64 = flags.iter().find(|f| f.name == "linux/amd64").unwrap();
    let dynamic_amd64 = flags.iter().find(|f| f.name == "linux/amd64/dynamic").unwrap();

    let mut options = Options::new();
    static_amd64.apply(&mut options);
    dynamic_amd64.apply(&mut options);
    assert_eq!(options.bool(OptionKey::Static), Some(false));

    dynamic_amd64.apply(&mut options);
    static_amd64.apply(&mut options);
    assert_eq!(options.bool(OptionKey::Static), Some(true));
  }

  #[test]
  fn arm_v6_carries_rpi_suffix() {
    let flags = distribution_flags();
    let armv6 = flags.iter().find(|f| f.name == "linux/arm/v6").unwrap();
    assert_eq!(armv6.options.string(OptionKey::NameSuffix), Some("rpi"));
    assert_eq!(
      armv6.options.distribution(),
      Some(&Distribution::with_variant("linux", "arm", "v6"))
    );
  }

  #[test]
  fn every_standard_flag_validates() {
    for flag in distribution_flags().iter().chain(edition_flags().iter()) {
      assert!(flag.validate().is_ok(), "{} should validate", flag.name);
    }
    assert!(distribution_flags().iter().all(FlagToken::sets_distribution));
  }

  #[test]
  fn edition_flags_set_product_and_tags() {
    let pro = Edition::Pro.flag();
    assert_eq!(pro.options.string(OptionKey::ProductName), Some("grafana-pro"));
    assert_eq!(pro.options.bool(OptionKey::Enterprise), Some(true));
    assert_eq!(pro.options.list(OptionKey::BuildTags), ["enterprise", "pro"]);

    let boring = Edition::Boring.flag();
    assert_eq!(boring.options.list(OptionKey::Experiments), ["boringcrypto"]);

    let oss = Edition::Oss.flag();
    assert_eq!(oss.options.bool(OptionKey::Enterprise), Some(false));
    assert!(oss.options.list(OptionKey::Experiments).is_empty());
  }
}
