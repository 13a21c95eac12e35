//! Option vocabulary.
//!
//! Artifacts are parametrized by a typed option map ([`Options`]). Descriptor
//! strings select [`FlagToken`]s, each of which assigns a group of options:
//! distribution tokens pick the platform and link mode, edition tokens pick the
//! product name, enterprise overlay, build tags and compiler experiments.

mod flags;
mod types;

pub use flags::{Edition, FlagToken, distribution_flags, edition_flags};
pub use types::{OptionError, OptionKey, OptionValue, Options, ValueType};
