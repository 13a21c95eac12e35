//! Exec step implementation.
//!
//! Runs one process of a build plan inside the plan's work directory.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::execute::plan::Exec;
use crate::execute::types::ExecuteError;

/// Run an [`Exec`] step.
///
/// The process inherits the caller's environment, plus:
/// - `out` set to the work directory
/// - TMPDIR/TMP/TEMP pointing at `<work_dir>/tmp`
/// - SOURCE_DATE_EPOCH pinned so archive timestamps are reproducible
/// - the step's own variables, which win over all of the above
///
/// Returns the trimmed stdout on success.
pub async fn execute_cmd(exec: &Exec, work_dir: &Path) -> Result<String, ExecuteError> {
  let cmd = exec.command_line();
  info!(cmd = %cmd, "executing command");

  let tmp_dir = work_dir.join("tmp");
  tokio::fs::create_dir_all(&tmp_dir).await?;

  let working_dir = match &exec.cwd {
    Some(cwd) => work_dir.join(cwd),
    None => work_dir.to_path_buf(),
  };

  let mut command = Command::new(&exec.program);
  command
    .args(&exec.args)
    .current_dir(&working_dir)
    .env("out", work_dir)
    .env("TMPDIR", &tmp_dir)
    .env("TMP", &tmp_dir)
    .env("TEMP", &tmp_dir)
    // 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch)
    .env("SOURCE_DATE_EPOCH", "315532800")
    .envs(&exec.env)
    .kill_on_drop(true);

  debug!(program = %exec.program, working_dir = ?working_dir, "spawning process");

  let output = command.output().await?;

  let stderr = String::from_utf8_lossy(&output.stderr);
  if !stderr.is_empty() {
    debug!(stderr = %stderr, "command stderr");
  }

  if !output.status.success() {
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    return Err(ExecuteError::CmdFailed {
      cmd,
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}
