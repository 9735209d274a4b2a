// src/model/reference.rs

//! Non-hierarchical links between struct nodes
//!
//! A [`Reference`] is a directed, typed edge between two nodes, commonly from
//! a logical structure to a physical page (type `"logical_physical"`). Each
//! edge is stored twice, once in the source's outgoing list and once in the
//! target's incoming list; the paired insertion and removal is done by the
//! document (see `Document::add_reference`), never by mutating one side
//! alone.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// The conventional type for links from logical structures to pages
pub const LOGICAL_PHYSICAL: &str = "logical_physical";

/// A directed, typed edge between two struct nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: String,
    pub source: NodeId,
    pub target: NodeId,
}

impl Reference {
    pub fn new(kind: &str, source: NodeId, target: NodeId) -> Self {
        Self {
            kind: kind.to_string(),
            source,
            target,
        }
    }
}
