// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: rule-set file path
fn ruleset_arg() -> Arg {
    Arg::new("ruleset")
        .short('r')
        .long("ruleset")
        .value_name("PATH")
        .help("Rule-set file governing the conversion")
}

fn build_cli() -> Command {
    Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Digitised-document metadata model and METS/RDF converter")
        .subcommand_required(true)
        .subcommand(
            Command::new("convert")
                .about("Convert a directory tree of RDF metadata files to METS format")
                .arg(
                    Arg::new("base_path")
                        .short('b')
                        .long("base-path")
                        .value_name("DIR")
                        .help("Base directory walked recursively for meta.xml files"),
                )
                .arg(ruleset_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Run the content validator on a single RDF metadata file")
                .arg(Arg::new("file").required(true).help("Metadata file to validate"))
                .arg(ruleset_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Print the structure outline of a metadata file")
                .arg(Arg::new("file").required(true).help("Metadata file to read"))
                .arg(ruleset_arg())
                .arg(
                    Arg::new("mets")
                        .long("mets")
                        .action(clap::ArgAction::SetTrue)
                        .help("Read the file as METS instead of RDF"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("folio.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }
}
