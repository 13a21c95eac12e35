//! Test utilities for relgraph-lib.
//!
//! Cross-platform process invocations for tests that run build plans.

use crate::execute::Exec;

/// Run a script through the platform shell.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> Exec {
  Exec::new("/bin/sh").args(["-c", script])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> Exec {
  Exec::new("cmd.exe").args(["/C", script])
}

/// Print an environment variable.
#[cfg(unix)]
pub fn echo_env(var: &str) -> Exec {
  shell_cmd(&format!("echo \"${}\"", var))
}

#[cfg(windows)]
pub fn echo_env(var: &str) -> Exec {
  shell_cmd(&format!("echo %{}%", var))
}

/// Write `contents` to `path` (relative to the working directory).
#[cfg(unix)]
pub fn write_file(path: &str, contents: &str) -> Exec {
  shell_cmd(&format!("printf '%s' '{}' > '{}'", contents, path))
}

#[cfg(windows)]
pub fn write_file(path: &str, contents: &str) -> Exec {
  Exec::new("powershell.exe").args([
    "-NoProfile".to_string(),
    "-Command".to_string(),
    format!("Set-Content -NoNewline -Path '{}' -Value '{}'", path, contents),
  ])
}

/// Exit with a non-zero status.
pub fn fail(code: i32) -> Exec {
  shell_cmd(&format!("exit {}", code))
}
