// src/ruleset/loader.rs

//! Rule-set file parsing
//!
//! Rule sets are TOML files declaring metadata types, group types and struct
//! types. Declarations are resolved into shared [`RuleSet`] entries; struct
//! types referencing undeclared metadata or group types are rejected.
//!
//! # Example ruleset.toml
//!
//! ```toml
//! [[metadata_type]]
//! name = "TitleDocMain"
//! labels = { en = "Main title", de = "Haupttitel" }
//!
//! [[metadata_type]]
//! name = "Author"
//! is_person = true
//!
//! [[struct_type]]
//! name = "Monograph"
//! allowed_children = ["Chapter"]
//!
//! [[struct_type.metadata]]
//! type = "TitleDocMain"
//! num = "1m"
//! default_display = true
//!
//! [[struct_type.metadata]]
//! type = "Author"
//! num = "*"
//! ```

use super::{
    Cardinality, GroupDecl, MetadataDecl, MetadataGroupType, MetadataType, RuleSet, StructType,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading a rule-set file
#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("failed to read rule-set file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse rule-set file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid cardinality '{num}' for '{type_name}' on struct '{struct_name}'")]
    InvalidCardinality {
        num: String,
        type_name: String,
        struct_name: String,
    },

    #[error("'{declaring}' references undeclared {kind} type '{type_name}'")]
    UnknownType {
        declaring: String,
        kind: &'static str,
        type_name: String,
    },

    #[error("duplicate {1} type name '{0}'")]
    DuplicateName(String, &'static str),
}

#[derive(Debug, Deserialize)]
struct RawRuleSet {
    #[serde(default, rename = "metadata_type")]
    metadata_types: Vec<RawMetadataType>,
    #[serde(default, rename = "group_type")]
    group_types: Vec<RawGroupType>,
    #[serde(default, rename = "struct_type")]
    struct_types: Vec<RawStructType>,
}

#[derive(Debug, Deserialize)]
struct RawMetadataType {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    is_person: bool,
    #[serde(default)]
    is_identifier: bool,
}

#[derive(Debug, Deserialize)]
struct RawGroupType {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawStructType {
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    anchor_class: Option<String>,
    #[serde(default)]
    allowed_children: Vec<String>,
    #[serde(default)]
    metadata: Vec<RawDecl>,
    #[serde(default)]
    groups: Vec<RawDecl>,
}

#[derive(Debug, Deserialize)]
struct RawDecl {
    #[serde(rename = "type")]
    type_name: String,
    num: String,
    #[serde(default)]
    default_display: bool,
}

/// Loads and resolves a rule set from a TOML file
pub fn load_ruleset(path: &Path) -> std::result::Result<RuleSet, RuleSetError> {
    let content = std::fs::read_to_string(path)?;
    parse_ruleset(&content)
}

/// Parses a rule set from TOML text
pub fn parse_ruleset(content: &str) -> std::result::Result<RuleSet, RuleSetError> {
    let raw: RawRuleSet = toml::from_str(content)?;
    let mut ruleset = RuleSet::new();

    for md in raw.metadata_types {
        if ruleset.metadata_type(&md.name).is_some() {
            return Err(RuleSetError::DuplicateName(md.name, "metadata"));
        }
        ruleset.add_metadata_type(MetadataType {
            name: md.name,
            labels: md.labels,
            is_person: md.is_person,
            is_identifier: md.is_identifier,
        });
    }

    for group in raw.group_types {
        if ruleset.group_type(&group.name).is_some() {
            return Err(RuleSetError::DuplicateName(group.name, "group"));
        }
        for member in &group.members {
            if ruleset.metadata_type(member).is_none() {
                return Err(RuleSetError::UnknownType {
                    declaring: group.name.clone(),
                    kind: "metadata",
                    type_name: member.clone(),
                });
            }
        }
        ruleset.add_group_type(MetadataGroupType {
            name: group.name,
            labels: group.labels,
            members: group.members,
        });
    }

    for st in raw.struct_types {
        if ruleset.struct_type(&st.name).is_some() {
            return Err(RuleSetError::DuplicateName(st.name, "struct"));
        }

        let mut resolved = StructType::new(&st.name);
        resolved.labels = st.labels;
        resolved.anchor_class = st.anchor_class;
        resolved.allowed_children = st.allowed_children;

        for decl in st.metadata {
            let md_type = ruleset.metadata_type(&decl.type_name).ok_or_else(|| {
                RuleSetError::UnknownType {
                    declaring: st.name.clone(),
                    kind: "metadata",
                    type_name: decl.type_name.clone(),
                }
            })?;
            let cardinality = parse_cardinality(&decl.num, &decl.type_name, &st.name)?;
            resolved.metadata.push(MetadataDecl {
                md_type,
                cardinality,
                default_display: decl.default_display,
            });
        }

        for decl in st.groups {
            let group_type = ruleset.group_type(&decl.type_name).ok_or_else(|| {
                RuleSetError::UnknownType {
                    declaring: st.name.clone(),
                    kind: "group",
                    type_name: decl.type_name.clone(),
                }
            })?;
            let cardinality = parse_cardinality(&decl.num, &decl.type_name, &st.name)?;
            resolved.groups.push(GroupDecl {
                group_type,
                cardinality,
                default_display: decl.default_display,
            });
        }

        ruleset.add_struct_type(resolved);
    }

    Ok(ruleset)
}

fn parse_cardinality(
    num: &str,
    type_name: &str,
    struct_name: &str,
) -> std::result::Result<Cardinality, RuleSetError> {
    num.parse().map_err(|_| RuleSetError::InvalidCardinality {
        num: num.to_string(),
        type_name: type_name.to_string(),
        struct_name: struct_name.to_string(),
    })
}

/// Resolves shared metadata types for the members of a group type
pub fn group_member_types(
    ruleset: &RuleSet,
    group: &MetadataGroupType,
) -> Vec<Arc<MetadataType>> {
    group
        .members
        .iter()
        .filter_map(|name| ruleset.metadata_type(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[metadata_type]]
name = "TitleDocMain"

[[metadata_type]]
name = "Author"
is_person = true

[[struct_type]]
name = "Monograph"
allowed_children = ["Chapter"]

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1m"
default_display = true

[[struct_type.metadata]]
type = "Author"
num = "*"

[[struct_type]]
name = "Chapter"
"#;

    #[test]
    fn test_parse_minimal_ruleset() {
        let rs = parse_ruleset(MINIMAL).unwrap();
        let mono = rs.struct_type("Monograph").unwrap();
        assert!(mono.allows_child("Chapter"));
        assert_eq!(
            mono.metadata_cardinality("TitleDocMain"),
            Some(Cardinality::ExactlyOne)
        );
        assert!(rs.metadata_type("Author").unwrap().is_person);
        assert!(rs.struct_type("Chapter").is_some());
    }

    #[test]
    fn test_unknown_metadata_type_rejected() {
        let bad = r#"
[[struct_type]]
name = "Monograph"

[[struct_type.metadata]]
type = "NotDeclared"
num = "1o"
"#;
        match parse_ruleset(bad) {
            Err(RuleSetError::UnknownType { type_name, .. }) => {
                assert_eq!(type_name, "NotDeclared")
            }
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_cardinality_rejected() {
        let bad = r#"
[[metadata_type]]
name = "TitleDocMain"

[[struct_type]]
name = "Monograph"

[[struct_type.metadata]]
type = "TitleDocMain"
num = "2x"
"#;
        assert!(matches!(
            parse_ruleset(bad),
            Err(RuleSetError::InvalidCardinality { .. })
        ));
    }

    #[test]
    fn test_anchor_class_parsed() {
        let src = r#"
[[struct_type]]
name = "Journal"
anchor_class = "J"
allowed_children = ["Volume"]

[[struct_type]]
name = "Volume"
"#;
        let rs = parse_ruleset(src).unwrap();
        assert_eq!(
            rs.struct_type("Journal").unwrap().anchor_class.as_deref(),
            Some("J")
        );
        assert!(rs.struct_type("Volume").unwrap().anchor_class.is_none());
    }
}
