use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating systems that artifact constraints can name.
///
/// Distributions themselves carry the os as a free-form string so that
/// uncommon targets (e.g. `plan9`) still encode and decode; this enum only
/// covers the systems packaging rules care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
  Linux,
  Darwin,
  Windows,
}

impl Os {
  /// Parse a distribution os identifier (`linux`, `darwin`, `windows`)
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "linux" => Some(Self::Linux),
      "darwin" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the distribution identifier of the host operating system.
///
/// Rust's `macos` is reported as `darwin` to match distribution strings.
pub fn host_os() -> &'static str {
  match std::env::consts::OS {
    "macos" => "darwin",
    other => other,
  }
}
