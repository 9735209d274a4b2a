// src/ruleset/mod.rs

//! Rule set - the typed schema governing document structures
//!
//! A rule set declares which structural types exist, which children and
//! metadata each of them may carry and with what cardinality, which types
//! act as anchors, and how types are labelled per language. It is read-only
//! after loading; the document model consults it on every mutation.

pub mod loader;

pub use loader::{load_ruleset, RuleSetError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Metadata type names beginning with this prefix are internal: they are
/// never user-visible and carry unlimited cardinality on any struct type.
pub const HIDDEN_METADATA_PREFIX: &str = "_";

/// How many entries of one metadata type a struct type admits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// `"1o"` - zero or one
    ZeroOrOne,
    /// `"1m"` - exactly one
    ExactlyOne,
    /// `"*"` - zero or more
    ZeroOrMore,
    /// `"+"` - one or more
    OneOrMore,
}

impl Cardinality {
    /// Whether one more entry may be inserted when `present` already exist
    pub fn allows_another(&self, present: usize) -> bool {
        match self {
            Self::ZeroOrMore | Self::OneOrMore => true,
            Self::ZeroOrOne | Self::ExactlyOne => present < 1,
        }
    }

    /// Whether at least one entry of the type must exist
    pub fn requires_one(&self) -> bool {
        matches!(self, Self::ExactlyOne | Self::OneOrMore)
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1o" => Ok(Self::ZeroOrOne),
            "1m" => Ok(Self::ExactlyOne),
            "*" => Ok(Self::ZeroOrMore),
            "+" => Ok(Self::OneOrMore),
            _ => Err(format!("unknown cardinality token: {}", s)),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroOrOne => write!(f, "1o"),
            Self::ExactlyOne => write!(f, "1m"),
            Self::ZeroOrMore => write!(f, "*"),
            Self::OneOrMore => write!(f, "+"),
        }
    }
}

/// A metadata type declared in the rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataType {
    pub name: String,
    /// Localised display labels, keyed by language code
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Entries of this type are persons rather than plain values
    #[serde(default)]
    pub is_person: bool,
    /// Entries of this type identify the document or a structure
    #[serde(default)]
    pub is_identifier: bool,
}

impl MetadataType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            is_person: false,
            is_identifier: false,
        }
    }

    /// Whether this is an internal type (name begins with `_`)
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with(HIDDEN_METADATA_PREFIX)
    }

    /// Label for the given language, falling back to the type name
    pub fn label(&self, language: &str) -> &str {
        self.labels.get(language).map(String::as_str).unwrap_or(&self.name)
    }
}

/// A metadata group type: a named bundle of member metadata types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataGroupType {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Names of the metadata types this group may bundle
    #[serde(default)]
    pub members: Vec<String>,
}

impl MetadataGroupType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            members: Vec::new(),
        }
    }
}

/// One metadata type admitted on a struct type, with its cardinality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDecl {
    pub md_type: Arc<MetadataType>,
    pub cardinality: Cardinality,
    /// Shown in editing masks by default
    #[serde(default)]
    pub default_display: bool,
}

/// One group type admitted on a struct type, with its cardinality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDecl {
    pub group_type: Arc<MetadataGroupType>,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub default_display: bool,
}

/// A structural type: name, anchor class, allowed children and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Nodes of this type live in a separate serialization unit of this class
    #[serde(default)]
    pub anchor_class: Option<String>,
    /// Struct type names allowed as direct children, in declaration order
    #[serde(default)]
    pub allowed_children: Vec<String>,
    /// Admitted metadata types, in declaration order (this order drives sorting)
    #[serde(default)]
    pub metadata: Vec<MetadataDecl>,
    /// Admitted group types, in declaration order
    #[serde(default)]
    pub groups: Vec<GroupDecl>,
}

impl StructType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            anchor_class: None,
            allowed_children: Vec::new(),
            metadata: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Whether `child_type` may be attached as a direct child
    pub fn allows_child(&self, child_type: &str) -> bool {
        self.allowed_children.iter().any(|name| name == child_type)
    }

    /// Declaration for a metadata type name, if admitted here
    pub fn metadata_decl(&self, md_type: &str) -> Option<&MetadataDecl> {
        self.metadata.iter().find(|decl| decl.md_type.name == md_type)
    }

    /// Canonical shared copy of an admitted metadata type
    pub fn canonical_metadata_type(&self, md_type: &str) -> Option<Arc<MetadataType>> {
        self.metadata_decl(md_type).map(|decl| Arc::clone(&decl.md_type))
    }

    /// Cardinality for an admitted metadata type name
    pub fn metadata_cardinality(&self, md_type: &str) -> Option<Cardinality> {
        self.metadata_decl(md_type).map(|decl| decl.cardinality)
    }

    /// Declaration for a group type name, if admitted here
    pub fn group_decl(&self, group_type: &str) -> Option<&GroupDecl> {
        self.groups.iter().find(|decl| decl.group_type.name == group_type)
    }

    /// Admitted metadata types flagged for default display, in declaration order
    pub fn default_display_metadata_types(&self) -> Vec<Arc<MetadataType>> {
        self.metadata
            .iter()
            .filter(|decl| decl.default_display)
            .map(|decl| Arc::clone(&decl.md_type))
            .collect()
    }

    /// Admitted group types flagged for default display, in declaration order
    pub fn default_display_group_types(&self) -> Vec<Arc<MetadataGroupType>> {
        self.groups
            .iter()
            .filter(|decl| decl.default_display)
            .map(|decl| Arc::clone(&decl.group_type))
            .collect()
    }

    /// Label for the given language, falling back to the type name
    pub fn label(&self, language: &str) -> &str {
        self.labels.get(language).map(String::as_str).unwrap_or(&self.name)
    }
}

/// The loaded schema: lookup tables for struct, metadata and group types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    struct_types: HashMap<String, Arc<StructType>>,
    metadata_types: HashMap<String, Arc<MetadataType>>,
    group_types: HashMap<String, Arc<MetadataGroupType>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a struct type; the name is the key and must stay stable.
    pub fn add_struct_type(&mut self, struct_type: StructType) -> Arc<StructType> {
        let shared = Arc::new(struct_type);
        self.struct_types.insert(shared.name.clone(), Arc::clone(&shared));
        shared
    }

    pub fn add_metadata_type(&mut self, md_type: MetadataType) -> Arc<MetadataType> {
        let shared = Arc::new(md_type);
        self.metadata_types.insert(shared.name.clone(), Arc::clone(&shared));
        shared
    }

    pub fn add_group_type(&mut self, group_type: MetadataGroupType) -> Arc<MetadataGroupType> {
        let shared = Arc::new(group_type);
        self.group_types.insert(shared.name.clone(), Arc::clone(&shared));
        shared
    }

    pub fn struct_type(&self, name: &str) -> Option<Arc<StructType>> {
        self.struct_types.get(name).map(Arc::clone)
    }

    pub fn metadata_type(&self, name: &str) -> Option<Arc<MetadataType>> {
        self.metadata_types.get(name).map(Arc::clone)
    }

    pub fn group_type(&self, name: &str) -> Option<Arc<MetadataGroupType>> {
        self.group_types.get(name).map(Arc::clone)
    }

    /// All struct type names (unordered)
    pub fn struct_type_names(&self) -> impl Iterator<Item = &str> {
        self.struct_types.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_struct_type() -> StructType {
        let mut st = StructType::new("Monograph");
        st.allowed_children.push("Chapter".to_string());
        st.metadata.push(MetadataDecl {
            md_type: Arc::new(MetadataType::new("TitleDocMain")),
            cardinality: Cardinality::ExactlyOne,
            default_display: true,
        });
        st.metadata.push(MetadataDecl {
            md_type: Arc::new(MetadataType {
                name: "Author".to_string(),
                labels: HashMap::new(),
                is_person: true,
                is_identifier: false,
            }),
            cardinality: Cardinality::ZeroOrMore,
            default_display: false,
        });
        st
    }

    #[test]
    fn test_cardinality_tokens_round_trip() {
        for token in ["1o", "1m", "*", "+"] {
            let card: Cardinality = token.parse().unwrap();
            assert_eq!(card.to_string(), token);
        }
        assert!("2x".parse::<Cardinality>().is_err());
    }

    #[test]
    fn test_cardinality_bounds() {
        assert!(Cardinality::ExactlyOne.allows_another(0));
        assert!(!Cardinality::ExactlyOne.allows_another(1));
        assert!(!Cardinality::ZeroOrOne.allows_another(1));
        assert!(Cardinality::OneOrMore.allows_another(7));
        assert!(Cardinality::OneOrMore.requires_one());
        assert!(!Cardinality::ZeroOrOne.requires_one());
    }

    #[test]
    fn test_struct_type_queries() {
        let st = make_struct_type();
        assert!(st.allows_child("Chapter"));
        assert!(!st.allows_child("Page"));
        assert_eq!(
            st.metadata_cardinality("TitleDocMain"),
            Some(Cardinality::ExactlyOne)
        );
        assert!(st.metadata_cardinality("Publisher").is_none());
        assert_eq!(st.default_display_metadata_types().len(), 1);
    }

    #[test]
    fn test_canonical_type_is_shared() {
        let st = make_struct_type();
        let a = st.canonical_metadata_type("TitleDocMain").unwrap();
        let b = st.canonical_metadata_type("TitleDocMain").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_hidden_prefix() {
        assert!(MetadataType::new("_internal").is_hidden());
        assert!(!MetadataType::new("TitleDocMain").is_hidden());
    }

    #[test]
    fn test_ruleset_lookup() {
        let mut rs = RuleSet::new();
        rs.add_struct_type(make_struct_type());
        assert!(rs.struct_type("Monograph").is_some());
        assert!(rs.struct_type("Journal").is_none());
    }
}
