// src/main.rs
//! Folio - CLI Entry Point

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use folio::{
    ContentValidator, ConversionDriver, ConversionOptions, FileFormat, MetsFormat, RdfFormat,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default directory walked for metadata files
const DEFAULT_BASE_PATH: &str = "./metadata";
/// Default rule-set file
const DEFAULT_RULESET_PATH: &str = "./ruleset.toml";

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Digitised-document metadata model and METS/RDF converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a directory tree of RDF metadata files to METS format
    Convert {
        /// Base directory walked recursively for meta.xml files;
        /// prompted for when not given
        #[arg(short, long)]
        base_path: Option<PathBuf>,

        /// Rule-set file governing the conversion; prompted for when not
        /// given
        #[arg(short, long)]
        ruleset: Option<PathBuf>,
    },

    /// Run the content validator on a single RDF metadata file
    Check {
        /// Metadata file to validate
        file: PathBuf,

        /// Rule-set file
        #[arg(short, long, default_value = DEFAULT_RULESET_PATH)]
        ruleset: PathBuf,
    },

    /// Print the structure outline of a metadata file
    Show {
        /// Metadata file to read
        file: PathBuf,

        /// Rule-set file
        #[arg(short, long, default_value = DEFAULT_RULESET_PATH)]
        ruleset: PathBuf,

        /// Read the file as METS instead of RDF
        #[arg(long)]
        mets: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { base_path, ruleset } => cmd_convert(base_path, ruleset),
        Commands::Check { file, ruleset } => cmd_check(&file, &ruleset),
        Commands::Show { file, ruleset, mets } => cmd_show(&file, &ruleset, mets),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "folio", &mut io::stdout());
            Ok(())
        }
    }
}

fn cmd_convert(base_path: Option<PathBuf>, ruleset_path: Option<PathBuf>) -> Result<()> {
    let options = ConversionOptions {
        base_path: match base_path {
            Some(path) => path,
            None => prompt_path(
                "Base path for the metadata (blank uses the default): ",
                DEFAULT_BASE_PATH,
            )?,
        },
        ruleset_path: match ruleset_path {
            Some(path) => path,
            None => prompt_path(
                "Path to the rule set (blank uses the default): ",
                DEFAULT_RULESET_PATH,
            )?,
        },
    };

    let driver = ConversionDriver::from_options(&options)
        .with_context(|| format!("loading rule set '{}'", options.ruleset_path.display()))?;
    let summary = driver.run(&options.base_path);

    println!(
        "{} files processed: {} committed, {} rolled back",
        summary.files_seen, summary.committed, summary.rolled_back
    );
    // Per-file failures are logged, not fatal.
    Ok(())
}

fn cmd_check(file: &Path, ruleset_path: &Path) -> Result<()> {
    let ruleset = folio::load_ruleset(ruleset_path)
        .with_context(|| format!("loading rule set '{}'", ruleset_path.display()))?;
    let ruleset = Arc::new(ruleset);

    let mut format = RdfFormat::new(Arc::clone(&ruleset));
    format
        .read(file)
        .with_context(|| format!("reading '{}'", file.display()))?;
    let document = format
        .document()
        .context("no document after reading the file")?;

    let report =
        ContentValidator::new(&ruleset).validate(document, &file.display().to_string());
    if report.is_clean() {
        println!("{}: valid", file.display());
    } else {
        for entry in &report.structs_without_pages {
            println!("structure without pages: {}", entry);
        }
        for entry in &report.pages_without_structs {
            println!("page without structure: {}", entry);
        }
        for entry in &report.mandatory_violations {
            println!("mandatory field: {}", entry);
        }
        if report.missing_logical_root {
            println!("no logical structure present");
        }
        anyhow::bail!("{}: validation failed", file.display());
    }
    Ok(())
}

fn cmd_show(file: &Path, ruleset_path: &Path, mets: bool) -> Result<()> {
    let ruleset = folio::load_ruleset(ruleset_path)
        .with_context(|| format!("loading rule set '{}'", ruleset_path.display()))?;
    let ruleset = Arc::new(ruleset);

    let document = if mets {
        let mut format = MetsFormat::new(ruleset);
        format
            .read(file)
            .with_context(|| format!("reading '{}'", file.display()))?;
        format.take_document()
    } else {
        let mut format = RdfFormat::new(ruleset);
        format
            .read(file)
            .with_context(|| format!("reading '{}'", file.display()))?;
        format.take_document()
    };

    let document = document.context("no document after reading the file")?;
    print!("{}", document.outline());
    Ok(())
}

/// Reads one line from stdin, falling back to a default on blank input
fn prompt_path(message: &str, default: &str) -> Result<PathBuf> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(PathBuf::from(default))
    } else {
        Ok(PathBuf::from(trimmed))
    }
}
