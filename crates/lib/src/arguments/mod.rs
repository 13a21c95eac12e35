//! Lazily resolved build inputs.
//!
//! An [`Argument`] is a named value (a source directory, a version string, a
//! build id) whose resolver may depend on other arguments. Resolution goes
//! through an [`ArgumentResolver`], which memoizes each argument by name for
//! the lifetime of a run.

mod resolver;
mod types;

pub use resolver::{ArgumentResolver, ResolveCtx};
pub use types::{Argument, ArgumentError, ArgumentKind, ArgumentValue, ResolverFn};
