// src/format/archive.rs

//! Serialized-archive adapter
//!
//! Stores a whole document as one serialized snapshot, the same encoding
//! the in-memory deep copy uses. Archives embed their type objects; on
//! loading, every struct and metadata type is refreshed from the current
//! rule set so that stale archives pick up renamed labels or cardinalities,
//! and a missing file set is rebuilt from the physical page metadata.
//!
//! The administrative-metadata section is not part of the snapshot; callers
//! holding one re-attach it after loading.

use super::{write_error, FileFormat};
use crate::error::{FormatError, FormatResult};
use crate::model::Document;
use crate::ruleset::RuleSet;
use std::path::Path;
use std::sync::Arc;

/// Adapter for serialized document snapshots
pub struct ArchiveFormat {
    ruleset: Arc<RuleSet>,
    document: Option<Document>,
}

impl ArchiveFormat {
    pub fn new(ruleset: Arc<RuleSet>) -> Self {
        Self {
            ruleset,
            document: None,
        }
    }
}

impl FileFormat for ArchiveFormat {
    fn read(&mut self, path: &Path) -> FormatResult<bool> {
        if !path.exists() {
            return Err(FormatError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut document: Document =
            serde_json::from_str(&content).map_err(|e| FormatError::Read {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        tracing::debug!(target: "adapter", "updating archived document from the rule set");
        document.refresh_types(&self.ruleset)?;
        if document.file_set().is_none() {
            document.add_all_content_files();
        }

        self.document = Some(document);
        Ok(true)
    }

    fn write(&self, path: &Path) -> FormatResult<bool> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| write_error(path, "no document attached"))?;
        let content = serde_json::to_string_pretty(document).map_err(|e| FormatError::Write {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        tracing::debug!(target: "adapter", "wrote archive '{}'", path.display());
        Ok(true)
    }

    fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    fn set_document(&mut self, document: Document) {
        self.document = Some(document);
    }

    fn take_document(&mut self) -> Option<Document> {
        self.document.take()
    }
}
