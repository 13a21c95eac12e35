//! The standard artifact catalog.
//!
//! [`standard_registry`] registers the product's artifacts:
//!
//! | artifact | output | requires | constraint |
//! |---|---|---|---|
//! | `backend` | directory | | |
//! | `frontend` | directory | | |
//! | `targz` | file | backend, frontend | |
//! | `deb`, `rpm` | file | targz | linux-only |
//! | `docker`, `docker-ubuntu` | file | targz | linux-only |
//! | `windows-installer` | file | targz | windows-only |

pub mod arguments;
pub mod artifacts;

use crate::artifact::{Artifact, Constraint, Registry, RegistryError};
use crate::options::{Edition, FlagToken, OptionKey, Options, distribution_flags, edition_flags};
use crate::output::OutputKind;
use crate::platform::Os;

pub use arguments::StandardArguments;
use artifacts::{Backend, Docker, Frontend, Package, PackageFormat, Tarball, WindowsInstaller};

fn platform_flags() -> Vec<FlagToken> {
  distribution_flags().into_iter().chain(edition_flags()).collect()
}

/// Every artifact defaults to the open source edition.
fn defaults() -> Options {
  let mut options = Options::new();
  Edition::Oss.flag().apply(&mut options);
  options
}

/// Build the standard registry.
pub fn standard_registry() -> Result<Registry, RegistryError> {
  let args = StandardArguments::new();
  let naming = args.naming();
  let with_source = || {
    let mut arguments = naming.clone();
    arguments.push(args.source_dir.clone());
    arguments
  };

  let mut registry = Registry::new();

  let mut backend_args = with_source();
  backend_args.push(args.enterprise_dir.clone());
  registry.register(
    Artifact::new("backend", OutputKind::Directory, Backend { args: args.clone() })
      .arguments(backend_args)
      .flags(platform_flags())
      .options(defaults()),
  )?;

  registry.register(
    Artifact::new("frontend", OutputKind::Directory, Frontend { args: args.clone() })
      .arguments(with_source())
      .flags(edition_flags())
      .options(defaults()),
  )?;

  registry.register(
    Artifact::new("targz", OutputKind::File, Tarball { args: args.clone() })
      .requires(&["backend", "frontend"])
      .arguments(naming.clone())
      .flags(platform_flags())
      .options(defaults()),
  )?;

  for (name, format) in [("deb", PackageFormat::Deb), ("rpm", PackageFormat::Rpm)] {
    registry.register(
      Artifact::new(
        name,
        OutputKind::File,
        Package {
          args: args.clone(),
          format,
        },
      )
      .requires(&["targz"])
      .arguments(naming.clone())
      .flags(platform_flags())
      .options(defaults())
      .constraint(Constraint::Os(Os::Linux)),
    )?;
  }

  for (name, ubuntu) in [("docker", false), ("docker-ubuntu", true)] {
    registry.register(
      Artifact::new(
        name,
        OutputKind::File,
        Docker {
          args: args.clone(),
          ubuntu,
        },
      )
      .requires(&["targz"])
      .arguments(with_source())
      .flags(platform_flags())
      .options(defaults())
      .constraint(Constraint::Os(Os::Linux)),
    )?;
  }

  registry.register(
    Artifact::new("windows-installer", OutputKind::File, WindowsInstaller { args: args.clone() })
      .requires(&["targz"])
      .arguments(with_source())
      .flags(platform_flags())
      .options(defaults().with(OptionKey::Static, true))
      .constraint(Constraint::Os(Os::Windows)),
  )?;

  registry.validate()?;
  Ok(registry)
}
