// src/error.rs

//! Crate-wide error types
//!
//! Model-level errors are tagged per failure kind so callers can react to a
//! rejected mutation without string matching. Adapter I/O failures carry the
//! path concerned.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the document model and its rule-set checks
#[derive(Debug, Error)]
pub enum ModelError {
    /// Structural insertion rejected: the child's type is not listed for the parent
    #[error("struct type '{child_type}' is not allowed as a child of '{parent_type}'")]
    TypeNotAllowedAsChild {
        child_type: String,
        parent_type: String,
    },

    /// Node construction rejected for the requested parent context
    #[error("struct type '{child_type}' is not allowed for this parent")]
    TypeNotAllowedForParent { child_type: String },

    /// Metadata insertion rejected by schema listing or cardinality
    #[error("metadata of type '{md_type}' not allowed for struct '{struct_type}'")]
    MetadataTypeNotAllowed {
        md_type: String,
        struct_type: String,
    },

    /// Operation on a node whose struct type is unset
    #[error("struct node has no type")]
    NoType,

    /// Person entry without a metadata type added or removed
    #[error("incomplete person: no metadata type set")]
    IncompletePerson,

    /// `remove_content_file` called for a file this node never referenced
    #[error("content file '{location}' is not linked to struct '{struct_type}'")]
    ContentFileNotLinked {
        location: String,
        struct_type: String,
    },

    /// Rule-set inconsistency discovered during traversal
    #[error("rule set violation: {0}")]
    Preferences(String),

    /// Stale or foreign node handle passed to a document operation
    #[error("unknown node handle {0}")]
    UnknownNode(usize),

    /// The serialization buffer behind a deep copy failed
    #[error("deep copy failed: {0}")]
    Copy(String),
}

/// Errors surfaced by file-format adapters
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read '{path}': {detail}")]
    Read { path: PathBuf, detail: String },

    #[error("failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Result alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Result alias for adapter operations
pub type FormatResult<T> = std::result::Result<T, FormatError>;
