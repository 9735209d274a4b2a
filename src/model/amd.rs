// src/model/amd.rs

//! Administrative-metadata section
//!
//! An [`AmdSec`] bundles technical-metadata records ([`TechMd`]); each record
//! is an opaque XML fragment identified by id. The section is attached to
//! the document and may be referenced by individual struct nodes. It is
//! carried by reference through copies: the deep-copy buffer excludes it and
//! it is re-attached afterwards.

use serde::{Deserialize, Serialize};

/// One technical-metadata record: an id plus a raw XML fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechMd {
    pub id: String,
    /// The fragment as written by the producing adapter, stored verbatim
    pub fragment: String,
}

impl TechMd {
    pub fn new(id: &str, fragment: &str) -> Self {
        Self {
            id: id.to_string(),
            fragment: fragment.to_string(),
        }
    }
}

/// The administrative-metadata section of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmdSec {
    pub id: Option<String>,
    tech_mds: Vec<TechMd>,
}

impl AmdSec {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            tech_mds: Vec::new(),
        }
    }

    pub fn add_tech_md(&mut self, tech_md: TechMd) {
        self.tech_mds.push(tech_md);
    }

    pub fn tech_mds(&self) -> &[TechMd] {
        &self.tech_mds
    }

    /// Record with the given id, if present
    pub fn tech_md(&self, id: &str) -> Option<&TechMd> {
        self.tech_mds.iter().find(|md| md.id.trim() == id.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.tech_mds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tech_md_lookup() {
        let mut amd = AmdSec::new(Some("AMD_0001".to_string()));
        amd.add_tech_md(TechMd::new("TMD_0001", "<premis/>"));
        amd.add_tech_md(TechMd::new("TMD_0002", "<mix/>"));

        assert_eq!(amd.tech_md("TMD_0002").unwrap().fragment, "<mix/>");
        assert_eq!(amd.tech_md(" TMD_0001 ").unwrap().fragment, "<premis/>");
        assert!(amd.tech_md("TMD_0009").is_none());
    }
}
