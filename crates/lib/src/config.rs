//! Per-run options supplied by the configuration layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::consts::ENV_PREFIX;
use crate::platform::Distribution;

/// Raw variable names the standard arguments read.
pub mod vars {
  pub const SOURCE_DIR: &str = "source_dir";
  pub const ENTERPRISE_DIR: &str = "enterprise_dir";
  pub const VERSION: &str = "version";
  pub const BUILD_ID: &str = "build_id";

  pub const ALL: [&str; 4] = [SOURCE_DIR, ENTERPRISE_DIR, VERSION, BUILD_ID];
}

/// Options for one run: which platforms to target and the raw string
/// variables arguments resolve from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOptions {
  /// Platforms descriptors without a distribution flag are expanded across.
  pub targets: Vec<Distribution>,
  /// Raw configuration values (source directory, version overrides, ...).
  pub vars: BTreeMap<String, String>,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      targets: vec![Distribution::host()],
      vars: BTreeMap::new(),
    }
  }
}

impl RunOptions {
  pub fn with_targets(mut self, targets: Vec<Distribution>) -> Self {
    self.targets = targets;
    self
  }

  pub fn with_var(mut self, key: &str, value: &str) -> Self {
    self.vars.insert(key.to_string(), value.to_string());
    self
  }

  pub fn var(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  /// Fill unset variables from `RELGRAPH_<NAME>` environment variables.
  ///
  /// Values already present (e.g. from command-line flags) win.
  pub fn with_env_defaults(mut self) -> Self {
    for key in vars::ALL {
      let env_key = format!("{}{}", ENV_PREFIX, key.to_uppercase());
      if let Ok(value) = std::env::var(&env_key) {
        self.vars.entry(key.to_string()).or_insert(value);
      }
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn default_targets_host() {
    let options = RunOptions::default();
    assert_eq!(options.targets, vec![Distribution::host()]);
    assert!(options.vars.is_empty());
  }

  #[test]
  #[serial]
  fn env_defaults_fill_only_unset_vars() {
    temp_env::with_vars(
      [
        ("RELGRAPH_VERSION", Some("v9.9.9")),
        ("RELGRAPH_BUILD_ID", Some("from-env")),
        ("RELGRAPH_SOURCE_DIR", None::<&str>),
      ],
      || {
        let options = RunOptions::default()
          .with_var(vars::BUILD_ID, "from-flag")
          .with_env_defaults();

        assert_eq!(options.var(vars::VERSION), Some("v9.9.9"));
        assert_eq!(options.var(vars::BUILD_ID), Some("from-flag"));
        assert_eq!(options.var(vars::SOURCE_DIR), None);
      },
    );
  }
}
