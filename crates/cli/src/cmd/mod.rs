mod artifacts;
mod build;
mod decode;
mod plan;

pub use artifacts::cmd_artifacts;
pub use build::{BuildOptions, cmd_build};
pub use decode::cmd_decode;
pub use plan::cmd_plan;
