// src/model/mod.rs

//! The document object model
//!
//! A digitised work is represented as two trees of [`StructNode`]s - the
//! logical structure (volumes, chapters, articles) and the physical
//! structure (the bound unit and its pages) - owned by one [`Document`]
//! together with the set of referenced content files and an optional
//! administrative-metadata section. Non-hierarchical [`Reference`] edges
//! connect the two trees, most commonly from logical units to pages.
//!
//! All mutation goes through rule-checked operations; the governing
//! [`RuleSet`](crate::ruleset::RuleSet) decides which children, metadata and
//! cardinalities are admissible on each node.

mod amd;
mod document;
mod files;
mod metadata;
mod node;
mod reference;

pub use amd::{AmdSec, TechMd};
pub use document::Document;
pub use files::{ContentFile, ContentFileArea, ContentFileRef, FileId, FileSet, VirtualFileGroup};
pub use metadata::{
    Authority, MetadataCore, MetadataEntry, MetadataGroup, PersonEntry, Qualifier, ValueEntry,
};
pub use node::{
    NodeId, StructNode, LABEL_ATTRIBUTE_TYPE, MPTR_ELEMENT_TYPE, ORDERLABEL_ATTRIBUTE_TYPE,
};
pub use reference::{Reference, LOGICAL_PHYSICAL};
