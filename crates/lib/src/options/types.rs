use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::platform::Distribution;

/// The closed set of options an artifact can be parametrized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionKey {
  /// Target platform.
  Distribution,
  /// Static (true) or dynamic (false) linking.
  Static,
  /// Extra suffix appended to package names for some platforms (e.g. "rpi").
  NameSuffix,
  /// Product name used as the first canonical name field.
  ProductName,
  /// Edition identifier (oss, enterprise, pro, boring).
  Edition,
  /// Whether the enterprise source tree is overlaid on the build.
  Enterprise,
  /// Compiler build tags.
  BuildTags,
  /// Compiler experiments (e.g. boringcrypto).
  Experiments,
}

impl OptionKey {
  /// The value type every assignment to this key must have.
  pub fn value_type(&self) -> ValueType {
    match self {
      Self::Distribution => ValueType::Distribution,
      Self::Static | Self::Enterprise => ValueType::Bool,
      Self::NameSuffix | Self::ProductName | Self::Edition => ValueType::String,
      Self::BuildTags | Self::Experiments => ValueType::List,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Distribution => "distribution",
      Self::Static => "static",
      Self::NameSuffix => "name-suffix",
      Self::ProductName => "product-name",
      Self::Edition => "edition",
      Self::Enterprise => "enterprise",
      Self::BuildTags => "build-tags",
      Self::Experiments => "experiments",
    }
  }
}

impl fmt::Display for OptionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Runtime type of an [`OptionValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
  String,
  Bool,
  Int64,
  List,
  Distribution,
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::String => "string",
      Self::Bool => "bool",
      Self::Int64 => "int64",
      Self::List => "list",
      Self::Distribution => "distribution",
    };
    write!(f, "{}", s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
  String(String),
  Bool(bool),
  Int64(i64),
  List(Vec<String>),
  Distribution(Distribution),
}

impl OptionValue {
  pub fn value_type(&self) -> ValueType {
    match self {
      Self::String(_) => ValueType::String,
      Self::Bool(_) => ValueType::Bool,
      Self::Int64(_) => ValueType::Int64,
      Self::List(_) => ValueType::List,
      Self::Distribution(_) => ValueType::Distribution,
    }
  }

  /// Convenience constructor for list values.
  pub fn list<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::List(items.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for OptionValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::String(s) => write!(f, "{}", s),
      Self::Bool(b) => write!(f, "{}", b),
      Self::Int64(n) => write!(f, "{}", n),
      Self::List(items) => write!(f, "[{}]", items.join(",")),
      Self::Distribution(d) => write!(f, "{}", d),
    }
  }
}

impl From<&str> for OptionValue {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<bool> for OptionValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<i64> for OptionValue {
  fn from(value: i64) -> Self {
    Self::Int64(value)
  }
}

impl From<Distribution> for OptionValue {
  fn from(value: Distribution) -> Self {
    Self::Distribution(value)
  }
}

/// Errors assigning option values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
  #[error("option '{key}' expects a {expected} value, got {found}")]
  TypeMismatch {
    key: OptionKey,
    expected: ValueType,
    found: ValueType,
  },
}

/// An ordered option map.
///
/// Ordering makes equality and hashing independent of insertion order, so two
/// artifacts parametrized the same way compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Options(BTreeMap<OptionKey, OptionValue>);

impl Options {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert. The assignment is checked later by [`Options::validate`].
  pub fn with(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
    self.0.insert(key, value.into());
    self
  }

  /// Checked insert.
  pub fn set(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Result<(), OptionError> {
    let value = value.into();
    check(key, &value)?;
    self.0.insert(key, value);
    Ok(())
  }

  /// Verify every assigned value has its key's type.
  pub fn validate(&self) -> Result<(), OptionError> {
    self.0.iter().try_for_each(|(key, value)| check(*key, value))
  }

  /// Overlay `other` on top of these options; `other` wins on collisions.
  pub fn merge(&mut self, other: &Options) {
    for (key, value) in &other.0 {
      self.0.insert(*key, value.clone());
    }
  }

  pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
    self.0.get(&key)
  }

  pub fn contains(&self, key: OptionKey) -> bool {
    self.0.contains_key(&key)
  }

  pub fn string(&self, key: OptionKey) -> Option<&str> {
    match self.0.get(&key) {
      Some(OptionValue::String(s)) => Some(s),
      _ => None,
    }
  }

  pub fn bool(&self, key: OptionKey) -> Option<bool> {
    match self.0.get(&key) {
      Some(OptionValue::Bool(b)) => Some(*b),
      _ => None,
    }
  }

  pub fn list(&self, key: OptionKey) -> &[String] {
    match self.0.get(&key) {
      Some(OptionValue::List(items)) => items,
      _ => &[],
    }
  }

  pub fn distribution(&self) -> Option<&Distribution> {
    match self.0.get(&OptionKey::Distribution) {
      Some(OptionValue::Distribution(d)) => Some(d),
      _ => None,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &OptionValue)> {
    self.0.iter()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for Options {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (key, value) in &self.0 {
      if !first {
        write!(f, " ")?;
      }
      first = false;
      write!(f, "{}={}", key, value)?;
    }
    Ok(())
  }
}

fn check(key: OptionKey, value: &OptionValue) -> Result<(), OptionError> {
  let expected = key.value_type();
  let found = value.value_type();
  if expected == found {
    Ok(())
  } else {
    Err(OptionError::TypeMismatch { key, expected, found })
  }
}
