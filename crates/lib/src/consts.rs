pub const APP_NAME: &str = "relgraph";

/// Prefix of environment variables read by the configuration layer.
pub const ENV_PREFIX: &str = "RELGRAPH_";

/// Overrides the default build work directory.
pub const WORK_DIR_ENV: &str = "RELGRAPH_WORK_DIR";

/// Suffix of checksum sidecar files written next to published files.
pub const CHECKSUM_SUFFIX: &str = "sha256";
