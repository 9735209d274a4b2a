// src/lib.rs

//! Folio
//!
//! A model for digitised documents and a converter for their on-disk
//! metadata. A document is represented as two trees - the logical structure
//! (volumes, chapters, articles) and the physical structure (pages) -
//! governed by an externally loaded rule set that constrains types,
//! containment and metadata cardinality.
//!
//! # Architecture
//!
//! - Rule-set-first: every mutation of the model is checked against the
//!   loaded schema at insertion time
//! - Arena-backed trees: nodes address each other by handle, so the
//!   cross-tree reference graph (which may contain cycles) stays safe to
//!   traverse, copy and compare
//! - Format adapters: METS-flavoured and RDF-flavoured XML serializations
//!   behind one read/write capability
//! - Certified conversion: the driver converts directory trees of RDF
//!   metadata to METS with backup, reload and token-level round-trip
//!   verification per file

pub mod convert;
mod error;
pub mod format;
pub mod model;
pub mod ruleset;
pub mod validate;

pub use convert::{ConversionDriver, ConversionOptions, FileOutcome, SessionSummary};
pub use error::{FormatError, FormatResult, ModelError, Result};
pub use format::{ArchiveFormat, FileFormat, MetsFormat, RdfFormat};
pub use model::{
    AmdSec, ContentFile, ContentFileArea, ContentFileRef, Document, FileId, FileSet,
    MetadataEntry, MetadataGroup, NodeId, PersonEntry, Qualifier, Reference, StructNode, TechMd,
    ValueEntry, VirtualFileGroup, LOGICAL_PHYSICAL,
};
pub use ruleset::{load_ruleset, Cardinality, MetadataType, RuleSet, StructType};
pub use validate::{compare_files, validate_equals, ContentReport, ContentValidator};
