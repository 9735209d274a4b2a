// src/model/metadata.rs

//! Typed value carriers attached to struct nodes
//!
//! A value entry is a `(type, value)` pair, optionally augmented with a
//! qualifier pair and an authority triple. A person entry carries the same
//! core plus name and affiliation fields. Both share [`MetadataCore`];
//! [`MetadataEntry`] is the tag used wherever either kind is accepted,
//! e.g. inside groups.

use crate::ruleset::MetadataType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A qualifier attached to a value, e.g. a sorting form or script variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualifier {
    pub value: String,
    /// What kind of qualifier this is
    pub kind: String,
}

/// An authority-file record: id, resolver URI and the value within the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub id: String,
    pub uri: String,
    pub value: String,
}

/// Fields shared by value and person entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCore {
    /// Bound to the canonical copy owned by the node's struct type on insertion
    pub md_type: Arc<MetadataType>,
    pub value: Option<String>,
    pub qualifier: Option<Qualifier>,
    pub authority: Option<Authority>,
}

impl MetadataCore {
    pub fn new(md_type: Arc<MetadataType>) -> Self {
        Self {
            md_type,
            value: None,
            qualifier: None,
            authority: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.md_type.name
    }
}

/// A plain metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub core: MetadataCore,
}

impl ValueEntry {
    pub fn new(md_type: Arc<MetadataType>) -> Self {
        Self {
            core: MetadataCore::new(md_type),
        }
    }

    pub fn with_value(md_type: Arc<MetadataType>, value: &str) -> Self {
        let mut entry = Self::new(md_type);
        entry.core.value = Some(value.to_string());
        entry
    }

    pub fn type_name(&self) -> &str {
        self.core.type_name()
    }

    pub fn value(&self) -> Option<&str> {
        self.core.value.as_deref()
    }

    pub fn set_value(&mut self, value: &str) {
        self.core.value = Some(value.to_string());
    }

    pub fn set_qualifier(&mut self, value: &str, kind: &str) {
        self.core.qualifier = Some(Qualifier {
            value: value.to_string(),
            kind: kind.to_string(),
        });
    }

    pub fn set_authority(&mut self, id: &str, uri: &str, value: &str) {
        self.core.authority = Some(Authority {
            id: id.to_string(),
            uri: uri.to_string(),
            value: value.to_string(),
        });
    }
}

/// A person entry: metadata core plus naming and affiliation fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub core: MetadataCore,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub affiliation: Option<String>,
    pub institution: Option<String>,
    /// Defaults to the metadata type name
    pub role: Option<String>,
    pub person_type: Option<String>,
    pub corporation: bool,
}

impl PersonEntry {
    pub fn new(md_type: Arc<MetadataType>) -> Self {
        let role = Some(md_type.name.clone());
        Self {
            core: MetadataCore::new(md_type),
            first_name: None,
            last_name: None,
            display_name: None,
            affiliation: None,
            institution: None,
            role,
            person_type: None,
            corporation: false,
        }
    }

    pub fn with_name(md_type: Arc<MetadataType>, last_name: &str, first_name: &str) -> Self {
        let mut person = Self::new(md_type);
        person.last_name = Some(last_name.to_string());
        person.first_name = Some(first_name.to_string());
        person
    }

    pub fn type_name(&self) -> &str {
        self.core.type_name()
    }

    /// Display name, assembled from last and first name when unset
    pub fn display_name_or_assembled(&self) -> Option<String> {
        if let Some(display) = &self.display_name {
            return Some(display.clone());
        }
        match (&self.last_name, &self.first_name) {
            (Some(last), Some(first)) => Some(format!("{}, {}", last, first)),
            (Some(last), None) => Some(last.clone()),
            (None, Some(first)) => Some(first.clone()),
            (None, None) => None,
        }
    }

    /// Whether the entry carries no identifying information at all
    pub fn is_blank(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.institution.is_none()
    }
}

impl std::fmt::Display for ValueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{}: \"{}\"", self.type_name(), value),
            None => write!(f, "{}: -", self.type_name()),
        }
    }
}

impl std::fmt::Display for PersonEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.display_name_or_assembled() {
            Some(name) => write!(f, "{}: {}", self.type_name(), name),
            None => write!(f, "{}: -", self.type_name()),
        }
    }
}

/// Either kind of entry, where both are accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataEntry {
    Value(ValueEntry),
    Person(PersonEntry),
}

impl MetadataEntry {
    pub fn core(&self) -> &MetadataCore {
        match self {
            Self::Value(v) => &v.core,
            Self::Person(p) => &p.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut MetadataCore {
        match self {
            Self::Value(v) => &mut v.core,
            Self::Person(p) => &mut p.core,
        }
    }

    pub fn type_name(&self) -> &str {
        self.core().type_name()
    }

    pub fn is_person(&self) -> bool {
        matches!(self, Self::Person(_))
    }
}

/// A labelled bundle of value and person entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataGroup {
    pub group_type: Arc<crate::ruleset::MetadataGroupType>,
    pub entries: Vec<MetadataEntry>,
}

impl MetadataGroup {
    pub fn new(group_type: Arc<crate::ruleset::MetadataGroupType>) -> Self {
        Self {
            group_type,
            entries: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.group_type.name
    }

    pub fn add_entry(&mut self, entry: MetadataEntry) {
        self.entries.push(entry);
    }

    /// The plain value entries of the bundle, in order
    pub fn value_entries(&self) -> impl Iterator<Item = &ValueEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            MetadataEntry::Value(value) => Some(value),
            MetadataEntry::Person(_) => None,
        })
    }

    /// The person entries of the bundle, in order
    pub fn person_entries(&self) -> impl Iterator<Item = &PersonEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            MetadataEntry::Person(person) => Some(person),
            MetadataEntry::Value(_) => None,
        })
    }

    /// Whether every value entry in the group is without a value
    pub fn is_empty(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.core().value.is_none())
    }
}
