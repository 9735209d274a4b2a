// src/validate/content.rs

//! Content validator
//!
//! Checks one document against the rule set: every logical structure that is
//! not an anchor must point at pages, every page must be pointed at from the
//! logical tree, and the declared metadata cardinalities must be satisfied.
//! Violations are collected and logged; they never abort processing.

use crate::model::{Document, NodeId};
use crate::ruleset::{Cardinality, RuleSet};
use serde::Serialize;

/// Collected violations of one validation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentReport {
    /// Logical structures without outgoing page references
    pub structs_without_pages: Vec<String>,
    /// Pages without incoming references, as "physical (logical)" page labels
    pub pages_without_structs: Vec<String>,
    /// Mandatory-metadata violations
    pub mandatory_violations: Vec<String>,
    /// The logical tree was missing entirely
    pub missing_logical_root: bool,
}

impl ContentReport {
    pub fn is_clean(&self) -> bool {
        !self.missing_logical_root
            && self.structs_without_pages.is_empty()
            && self.pages_without_structs.is_empty()
            && self.mandatory_violations.is_empty()
    }
}

/// Validates one document against a rule set
pub struct ContentValidator<'a> {
    ruleset: &'a RuleSet,
}

impl<'a> ContentValidator<'a> {
    pub fn new(ruleset: &'a RuleSet) -> Self {
        Self { ruleset }
    }

    /// Runs all checks; `id` prefixes every log line
    pub fn validate(&self, document: &Document, id: &str) -> ContentReport {
        let mut report = ContentReport::default();

        let Some(logical_root) = document.logical_root() else {
            tracing::info!("[{}] validation failed, no logical structure present", id);
            report.missing_logical_root = true;
            return report;
        };

        self.check_structs_without_pages(document, logical_root, &mut report);
        self.check_pages_without_structs(document, &mut report);
        self.check_mandatory_values(document, logical_root, &mut report);

        for entry in &report.structs_without_pages {
            tracing::info!("[{}] structure without pages: {}", id, entry);
        }
        for entry in &report.pages_without_structs {
            tracing::info!("[{}] page without structure: {}", id, entry);
        }
        for entry in &report.mandatory_violations {
            tracing::info!("[{}] mandatory field: {}", id, entry);
        }

        report
    }

    /// Logical descendants need outgoing references unless they are anchors
    fn check_structs_without_pages(
        &self,
        document: &Document,
        node: NodeId,
        report: &mut ContentReport,
    ) {
        let n = document.node(node);
        if n.refs_to().is_empty() && n.anchor_class().is_none() {
            report.structs_without_pages.push(n.type_name().to_string());
        }
        for &child in n.children() {
            self.check_structs_without_pages(document, child, report);
        }
    }

    /// Every page must be referenced from the logical tree
    fn check_pages_without_structs(&self, document: &Document, report: &mut ContentReport) {
        let Some(physical_root) = document.physical_root() else {
            return;
        };
        for &page in document.node(physical_root).children() {
            let n = document.node(page);
            if !n.refs_from().is_empty() {
                continue;
            }
            let mut physical = String::new();
            let mut logical = String::new();
            for md in n.metadata() {
                if md.type_name() == "physPageNumber" {
                    physical = md.value().unwrap_or("").to_string();
                }
                if md.type_name() == "logicalPageNumber" {
                    logical = format!(" ({})", md.value().unwrap_or(""));
                }
            }
            report.pages_without_structs.push(format!("{}{}", physical, logical));
        }
    }

    /// Cardinality of every declared metadata type in the logical subtree
    fn check_mandatory_values(
        &self,
        document: &Document,
        node: NodeId,
        report: &mut ContentReport,
    ) {
        let n = document.node(node);
        if let Some(struct_type) = n.struct_type() {
            // Use the rule set's declaration for the type, when known there.
            let declared = self
                .ruleset
                .struct_type(&struct_type.name)
                .unwrap_or_else(|| struct_type.clone());

            for decl in &declared.metadata {
                let type_name = &decl.md_type.name;
                let count = n.count_md_of_type(type_name);

                match decl.cardinality {
                    Cardinality::ExactlyOne => {
                        if count == 1 {
                            let empty = n
                                .metadata_by_type(type_name)
                                .first()
                                .map(|md| md.value().unwrap_or("").is_empty())
                                .unwrap_or(false);
                            if empty {
                                report.mandatory_violations.push(format!(
                                    "{} in {} is empty",
                                    type_name, declared.name
                                ));
                            }
                        } else {
                            report.mandatory_violations.push(format!(
                                "{} in {} must exist 1 time but exists {} times",
                                type_name, declared.name, count
                            ));
                        }
                    }
                    Cardinality::ZeroOrOne => {
                        if count > 1 {
                            report.mandatory_violations.push(format!(
                                "{} in {} must not exist more than 1 time but exists {} times",
                                type_name, declared.name, count
                            ));
                        }
                    }
                    Cardinality::OneOrMore => {
                        if count == 0 {
                            report.mandatory_violations.push(format!(
                                "{} in {} must exist at least 1 time but is missing",
                                type_name, declared.name
                            ));
                        } else if count > 1 {
                            report.mandatory_violations.push(format!(
                                "{} in {} must not exist more than 1 time but exists {} times",
                                type_name, declared.name, count
                            ));
                        }
                    }
                    Cardinality::ZeroOrMore => {}
                }
            }
        }

        for &child in n.children() {
            self.check_mandatory_values(document, child, report);
        }
    }
}
