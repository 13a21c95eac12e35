mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relgraph_lib::config::RunOptions;
use relgraph_lib::platform::Distribution;

use cmd::{BuildOptions, cmd_artifacts, cmd_build, cmd_decode, cmd_plan};
use output::OutputFormat;

/// relgraph - build and publish release artifacts from descriptors
#[derive(Parser)]
#[command(name = "relgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

/// Options shared by every command that resolves descriptors.
#[derive(Args, Debug)]
struct RunArgs {
  /// Target platform for descriptors that name none (repeatable, default: host)
  #[arg(short, long = "target", value_name = "OS/ARCH[/VARIANT]")]
  targets: Vec<Distribution>,

  /// Raw configuration value, e.g. version=v10.2.0 (repeatable)
  #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
  vars: Vec<(String, String)>,
}

impl RunArgs {
  /// Command-line values win over `RELGRAPH_*` environment variables.
  fn run_options(&self) -> RunOptions {
    let mut options = RunOptions::default();
    if !self.targets.is_empty() {
      options = options.with_targets(self.targets.clone());
    }
    for (key, value) in &self.vars {
      options = options.with_var(key, value);
    }
    options.with_env_defaults()
  }
}

fn parse_var(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Build the given artifacts and optionally publish them
  Build {
    /// Artifact descriptors, e.g. linux/amd64:enterprise:targz
    #[arg(required = true)]
    descriptors: Vec<String>,

    #[command(flatten)]
    run: RunArgs,

    /// Maximum number of concurrent builds and uploads (default: CPU count)
    #[arg(short = 'j', long)]
    parallelism: Option<usize>,

    /// Directory build plans run in (default: $RELGRAPH_WORK_DIR or a temp dir)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Publish requested artifacts to this path or URI (file://, http://, https://)
    #[arg(short, long)]
    destination: Option<String>,

    /// Stop scheduling builds after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Cancel remaining builds after this long (e.g. "30m", "2h")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Print the ordered list of artifacts a build would produce
  Plan {
    /// Artifact descriptors
    #[arg(required = true)]
    descriptors: Vec<String>,

    #[command(flatten)]
    run: RunArgs,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List the registered artifacts and their flags
  Artifacts {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Decode canonical artifact filenames
  Decode {
    /// Filenames or paths to decode
    #[arg(required = true)]
    filenames: Vec<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      descriptors,
      run,
      parallelism,
      work_dir,
      destination,
      fail_fast,
      timeout,
      output,
    } => cmd_build(
      &descriptors,
      run.run_options(),
      BuildOptions {
        parallelism,
        work_dir,
        destination,
        fail_fast,
        timeout,
      },
      output,
    ),
    Commands::Plan {
      descriptors,
      run,
      output,
    } => cmd_plan(&descriptors, &run.run_options(), output),
    Commands::Artifacts { output } => cmd_artifacts(output),
    Commands::Decode { filenames, output } => cmd_decode(&filenames, output),
  }
}
