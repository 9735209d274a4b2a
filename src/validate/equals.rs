// src/validate/equals.rs

//! Structural-equality validator
//!
//! Certifies that two documents are structurally equal: both logical roots
//! compare equal under the model's deep-equality relation, and both physical
//! roots do. Null pairings are decided without recursing.

use crate::model::Document;

/// Whether both tree pairs of the two documents are structurally equal
pub fn validate(left: &Document, right: &Document) -> bool {
    // Fast paths on the root pairings before any recursion.
    for (a, b) in [
        (left.physical_root(), right.physical_root()),
        (left.logical_root(), right.logical_root()),
    ] {
        match (a, b) {
            (None, None) => {}
            (Some(_), Some(_)) => {}
            _ => {
                tracing::debug!("root pairing differs: one document lacks a tree");
                return false;
            }
        }
    }

    left.deep_equals(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::{RuleSet, StructType};

    fn make_doc(with_logical: bool) -> Document {
        let mut rs = RuleSet::new();
        let mono = rs.add_struct_type(StructType::new("Monograph"));
        let mut doc = Document::new();
        if with_logical {
            let root = doc.create_struct_node(mono);
            doc.set_logical_root(root);
        }
        doc
    }

    #[test]
    fn test_empty_documents_are_equal() {
        assert!(validate(&Document::new(), &Document::new()));
    }

    #[test]
    fn test_missing_tree_on_one_side() {
        let a = make_doc(true);
        let b = make_doc(false);
        assert!(!validate(&a, &b));
        assert!(!validate(&b, &a));
    }

    #[test]
    fn test_equal_documents() {
        let a = make_doc(true);
        let b = make_doc(true);
        assert!(validate(&a, &b));
    }
}
