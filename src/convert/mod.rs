// src/convert/mod.rs

//! RDF-to-METS conversion driver
//!
//! Walks a directory tree for metadata files named `meta.xml`, and for each
//! one: backs it up, loads it through the RDF adapter, sorts both sides,
//! validates, rewrites it in METS format, reloads the written file, emits
//! the round-tripped RDF artifacts, and certifies the conversion with the
//! token comparator against the backup.
//!
//! Every stage failure cancels the file (the backup stays in place) and the
//! walk continues with the next file. Outcomes are logged to four channels:
//! `commit` (successful certifications), `rollback` (per-file
//! cancellations), `save` (file-system side effects) and `adapter`
//! (format-level errors). Each line is prefixed with the absolute path of
//! the file concerned.

use crate::format::{FileFormat, MetsFormat, RdfFormat};
use crate::ruleset::RuleSet;
use crate::validate::{compare_files, validate_equals, ContentValidator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// File name the driver looks for in the directory walk
pub const METADATA_FILE_NAME: &str = "meta.xml";

/// Options for one conversion session
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Directory walked recursively for metadata files
    pub base_path: PathBuf,
    /// Rule set governing both adapters
    pub ruleset_path: PathBuf,
}

/// Outcome of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    /// Written and certified by the token comparator
    Committed,
    /// Cancelled at some stage; the backup holds the original
    RolledBack,
}

/// Counters for one conversion session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSummary {
    pub files_seen: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

/// The per-directory conversion pipeline
pub struct ConversionDriver {
    ruleset: Arc<RuleSet>,
}

impl ConversionDriver {
    pub fn new(ruleset: Arc<RuleSet>) -> Self {
        Self { ruleset }
    }

    /// Loads the rule set named by the options and builds a driver for them
    pub fn from_options(
        options: &ConversionOptions,
    ) -> std::result::Result<Self, crate::ruleset::RuleSetError> {
        let ruleset = crate::ruleset::load_ruleset(&options.ruleset_path)?;
        tracing::info!(
            "loaded rule set '{}'",
            options.ruleset_path.display()
        );
        Ok(Self::new(Arc::new(ruleset)))
    }

    /// Walks `base_path` and converts every metadata file found.
    /// Per-file failures are logged and skipped; the session always runs to
    /// the end of the walk.
    pub fn run(&self, base_path: &Path) -> SessionSummary {
        info!(
            "conversion session started on sub directories of {}",
            base_path.display()
        );

        let mut summary = SessionSummary::default();
        for entry in WalkDir::new(base_path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if entry.file_type().is_file() && entry.file_name() == METADATA_FILE_NAME {
                summary.files_seen += 1;
                match self.process_file(entry.path()) {
                    FileOutcome::Committed => summary.committed += 1,
                    FileOutcome::RolledBack => summary.rolled_back += 1,
                }
            }
        }

        info!(
            "conversion session terminated normally: {} files, {} committed, {} rolled back",
            summary.files_seen, summary.committed, summary.rolled_back
        );
        summary
    }

    /// Runs the full pipeline for one metadata file
    pub fn process_file(&self, file: &Path) -> FileOutcome {
        let file_path_str = file.display();

        // Stage 1: backup. Failure cancels the file before anything is read.
        let backup = match self.backup(file) {
            Ok(path) => path,
            Err(e) => {
                info!("error creating backup for '{}': {}", file_path_str, e);
                info!(target: "rollback", "{} - backup and processing cancelled", file_path_str);
                return FileOutcome::RolledBack;
            }
        };
        let backup_path_str = backup.display();

        // Stage 2: load the RDF input.
        let mut rdf_input = RdfFormat::new(Arc::clone(&self.ruleset));
        match rdf_input.read(file) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                debug!("read error for file '{}'", file_path_str);
                info!(target: "rollback", "{} - RDF couldn't be read - processing cancelled", backup_path_str);
                return FileOutcome::RolledBack;
            }
        }

        // Stage 3: construct the METS side over a deep copy and sort both
        // sides, so the equality relation is order-stable.
        let Some(rdf_document) = rdf_input.document_mut() else {
            info!(target: "rollback", "{} - RDF couldn't be read - processing cancelled", backup_path_str);
            return FileOutcome::RolledBack;
        };
        let mets_document = match rdf_document.deep_copy() {
            Ok(copy) => copy,
            Err(e) => {
                error!("copy failed for '{}': {}", file_path_str, e);
                info!(target: "rollback", "{} - document copy failed - processing cancelled", backup_path_str);
                return FileOutcome::RolledBack;
            }
        };
        let mut mets_output = MetsFormat::new(Arc::clone(&self.ruleset));
        mets_output.set_document(mets_document);

        rdf_document.sort_metadata_recursively(&self.ruleset);
        if let Some(doc) = mets_output.document_mut() {
            doc.sort_metadata_recursively(&self.ruleset);
        }

        // Stage 4: content validation; reported, never aborting.
        if let Some(doc) = mets_output.document() {
            let report = ContentValidator::new(&self.ruleset)
                .validate(doc, &backup.display().to_string());
            if report.is_clean() {
                debug!("content validation clean for '{}'", file_path_str);
            }
        }

        // Stage 5: the two sides must still be equal.
        let equal = match (rdf_input.document(), mets_output.document()) {
            (Some(a), Some(b)) => validate_equals(a, b),
            _ => false,
        };
        if !equal {
            info!(
                "file '{}' is not equal to the original document, will not be written",
                file_path_str
            );
            info!(target: "rollback", "{} - mets document is different - processing cancelled", backup_path_str);
            return FileOutcome::RolledBack;
        }
        debug!("file '{}' digital document is equal", file_path_str);

        // Stage 6: overwrite the input in METS format.
        match mets_output.write(file) {
            Ok(true) => {
                info!(target: "save", "{} was written in mets format", file_path_str);
            }
            Ok(false) | Err(_) => {
                error!("file '{}' couldn't be written in mets format", file_path_str);
                info!(target: "rollback", "{} - mets couldn't be saved - processing cancelled", backup_path_str);
                info!(target: "adapter", "{} - mets couldn't be saved - processing cancelled", backup_path_str);
                return FileOutcome::RolledBack;
            }
        }

        // Stage 7: reload the written file and emit both RDF artifacts.
        let mut conversion_failure = false;

        let mut mets_reload = MetsFormat::new(Arc::clone(&self.ruleset));
        if let Err(e) = mets_reload.read(file) {
            info!(
                "file '{}' could not be reloaded with the used rule set: {}",
                file_path_str, e
            );
            info!(target: "rollback", "{} - verify failed - mets was saved but couldn't get reloaded", backup_path_str);
            info!(target: "adapter", "{} - verify failed - mets was saved but couldn't get reloaded", backup_path_str);
            return FileOutcome::RolledBack;
        }

        let mut rdf_compare = RdfFormat::new(Arc::clone(&self.ruleset));
        if let Some(reloaded) = mets_reload.take_document() {
            rdf_compare.set_document(reloaded);
        }
        if let Some(doc) = rdf_compare.document_mut() {
            doc.sort_metadata_recursively(&self.ruleset);
        }
        if let Some(doc) = rdf_input.document_mut() {
            doc.sort_metadata_recursively(&self.ruleset);
        }

        match (rdf_input.document(), rdf_compare.document()) {
            (Some(a), Some(b)) if validate_equals(a, b) => {
                info!(
                    "file '{}' was successfully verified by the equality validator after reload",
                    file_path_str
                );
                info!(target: "commit", "{} was successfully written and verified by the equality validator in mets format", file_path_str);
            }
            _ => {
                info!(
                    "file '{}': reloaded mets document is not equal to the originally loaded document",
                    file_path_str
                );
                info!(target: "rollback", "{} - reloaded mets document is not equal to the originally loaded document", file_path_str);
            }
        }

        let from_mets = replace_suffix(file, ".xml", ".fromMets.rdf.xml");
        let orig = replace_suffix(file, ".xml", ".orig.rdf.xml");

        for (format, artifact) in [
            (&rdf_compare, &from_mets),
            (&rdf_input, &orig),
        ] {
            match format.write(artifact) {
                Ok(_) => {
                    info!(target: "save", "{} was written", artifact.display());
                }
                Err(e) => {
                    error!("couldn't write '{}': {}", artifact.display(), e);
                    info!(target: "rollback", "{} - round-trip artifact couldn't be saved", backup_path_str);
                    return FileOutcome::RolledBack;
                }
            }
        }

        // Stage 8: token-level certification of the backup against the
        // reconverted RDF file.
        match compare_files(&backup, &from_mets) {
            Ok(result) if result.matches => {
                info!(
                    "file '{}' was successfully verified by the token validator |###| {}",
                    file_path_str, result.message
                );
                info!(target: "commit", "{} was successfully written and verified by the token validator in mets format |###| {}", file_path_str, result.message);
            }
            Ok(result) => {
                conversion_failure = true;
                info!(
                    "file '{}': '{}' is not token-equivalent to '{}': {}",
                    file_path_str,
                    from_mets.display(),
                    backup_path_str,
                    result.message
                );
                info!(target: "rollback", "{} - '{}' is not token-equivalent to the backup: {}", file_path_str, from_mets.display(), result.message);
            }
            Err(e) => {
                conversion_failure = true;
                error!("token comparison failed for '{}': {}", file_path_str, e);
                info!(target: "rollback", "{} - token comparison failed: {}", file_path_str, e);
            }
        }

        if conversion_failure {
            info!(target: "rollback", "{} - conversion couldn't satisfy validators", file_path_str);
            info!(target: "commit", "{} - conversion couldn't satisfy validators", file_path_str);
            return FileOutcome::RolledBack;
        }

        FileOutcome::Committed
    }

    /// Copies `file` to the first unused backup name: `meta.bak`, then
    /// `meta(1).bak`, `meta(2).bak`, ...
    fn backup(&self, file: &Path) -> std::io::Result<PathBuf> {
        let parent = file.parent().unwrap_or_else(|| Path::new("."));
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "meta".to_string());

        let mut candidate = parent.join(format!("{}.bak", stem));
        let mut counter = 0;
        while candidate.exists() {
            counter += 1;
            candidate = parent.join(format!("{}({}).bak", stem, counter));
        }

        std::fs::copy(file, &candidate)?;
        debug!(
            "backup of file '{}' written to '{}'",
            file.display(),
            candidate.display()
        );
        info!(target: "save", "{} was copied to {}", file.display(), candidate.display());
        Ok(candidate)
    }
}

/// Replaces a file-name suffix, appending when the suffix is absent
fn replace_suffix(file: &Path, suffix: &str, replacement: &str) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_name = match name.strip_suffix(suffix) {
        Some(stem) => format!("{}{}", stem, replacement),
        None => format!("{}{}", name, replacement),
    };
    file.with_file_name(new_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_suffix() {
        assert_eq!(
            replace_suffix(Path::new("/tmp/meta.xml"), ".xml", ".fromMets.rdf.xml"),
            PathBuf::from("/tmp/meta.fromMets.rdf.xml")
        );
        assert_eq!(
            replace_suffix(Path::new("/tmp/meta"), ".xml", ".orig.rdf.xml"),
            PathBuf::from("/tmp/meta.orig.rdf.xml")
        );
    }

    #[test]
    fn test_backup_naming_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("meta.xml");
        std::fs::write(&file, "<RDF:RDF/>").unwrap();

        let ruleset = Arc::new(RuleSet::new());
        let driver = ConversionDriver::new(ruleset);

        let first = driver.backup(&file).unwrap();
        assert_eq!(first, dir.path().join("meta.bak"));
        let second = driver.backup(&file).unwrap();
        assert_eq!(second, dir.path().join("meta(1).bak"));
        let third = driver.backup(&file).unwrap();
        assert_eq!(third, dir.path().join("meta(2).bak"));
    }

    #[test]
    fn test_unreadable_file_is_rolled_back_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("meta.xml");
        std::fs::write(&file, "this is not xml <").unwrap();

        let driver = ConversionDriver::new(Arc::new(RuleSet::new()));
        let outcome = driver.process_file(&file);

        assert_eq!(outcome, FileOutcome::RolledBack);
        assert!(dir.path().join("meta.bak").exists());
        // The original file is untouched.
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "this is not xml <"
        );
    }

    #[test]
    fn test_run_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("record1");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("meta.xml"), "not xml").unwrap();
        std::fs::write(sub.join("other.xml"), "ignored").unwrap();

        let driver = ConversionDriver::new(Arc::new(RuleSet::new()));
        let summary = driver.run(dir.path());

        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.rolled_back, 1);
        assert_eq!(summary.committed, 0);
    }
}
