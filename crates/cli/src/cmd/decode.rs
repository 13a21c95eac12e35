//! Implementation of the `relgraph decode` command.

use anyhow::{Result, bail};
use serde::Serialize;

use relgraph_lib::naming::{NameOpts, decode, extension};

use crate::output::{OutputFormat, print_error, print_json, print_stat};

#[derive(Serialize)]
struct Decoded<'a> {
  filename: &'a str,
  #[serde(flatten)]
  name: NameOpts,
  extension: Option<&'a str>,
}

pub fn cmd_decode(filenames: &[String], output: OutputFormat) -> Result<()> {
  let mut decoded = Vec::new();
  let mut invalid = 0;
  for filename in filenames {
    match decode(filename) {
      Ok(name) => decoded.push(Decoded {
        filename,
        name,
        extension: extension(filename),
      }),
      Err(e) => {
        print_error(&e.to_string());
        invalid += 1;
      }
    }
  }

  if output.is_json() {
    print_json(&decoded)?;
  } else {
    for entry in &decoded {
      println!("{}", entry.filename);
      print_stat("name", &entry.name.name);
      print_stat("version", &entry.name.version);
      print_stat("build id", &entry.name.build_id);
      print_stat("distribution", &entry.name.distro.to_string());
      print_stat("extension", entry.extension.unwrap_or("-"));
    }
  }

  if invalid > 0 {
    bail!("{} filename(s) could not be decoded", invalid);
  }
  Ok(())
}
