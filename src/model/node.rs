// src/model/node.rs

//! One node of the logical or physical structure tree
//!
//! A [`StructNode`] carries its struct type, ordered metadata, person and
//! group lists, content-file references and both reference lists. Nodes live
//! in the arena of their [`Document`](super::document::Document) and address
//! each other through [`NodeId`] handles; everything that needs to touch more
//! than one node (children, references, content files) is a document
//! operation. The operations here mutate only this node's own lists, checked
//! against the rule set.
//!
//! Insertion of metadata, persons and groups enforces the cardinality
//! declared on the node's struct type at insertion time. Internal types
//! (leading `_`) bypass the schema listing and are unbounded. Removal never
//! enforces minima; `can_metadata_be_removed` and friends report whether a
//! removal would violate one.

use crate::error::{ModelError, Result};
use crate::ruleset::{MetadataType, RuleSet, StructType, HIDDEN_METADATA_PREFIX};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::files::ContentFileRef;
use super::metadata::{MetadataGroup, PersonEntry, ValueEntry};
use super::reference::Reference;

/// Metadata type whose entries are pointers into another serialization unit
pub const MPTR_ELEMENT_TYPE: &str = "MetsPointerURL";
/// Metadata type written as the label attribute of a structure entry
pub const LABEL_ATTRIBUTE_TYPE: &str = "TitleDocMain";
/// Metadata type written as the order-label attribute of a structure entry
pub const ORDERLABEL_ATTRIBUTE_TYPE: &str = "TitleDocMainShort";

/// Metadata types copied onto foreign stubs by the truncating copy
pub(crate) const FOREIGN_STUB_METADATA_TYPES: [&str; 3] = [
    MPTR_ELEMENT_TYPE,
    LABEL_ATTRIBUTE_TYPE,
    ORDERLABEL_ATTRIBUTE_TYPE,
];

/// Handle of a struct node within its document's arena
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One structural unit of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructNode {
    pub(crate) id: NodeId,
    pub(crate) struct_type: Option<Arc<StructType>>,
    pub(crate) identifier: Option<String>,
    pub(crate) reference_to_anchor: Option<String>,
    pub(crate) logical: bool,
    pub(crate) physical: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) metadata: Vec<ValueEntry>,
    pub(crate) persons: Vec<PersonEntry>,
    pub(crate) groups: Vec<MetadataGroup>,
    pub(crate) content_refs: Vec<ContentFileRef>,
    pub(crate) refs_to: Vec<Reference>,
    pub(crate) refs_from: Vec<Reference>,
    /// Id of the administrative-metadata section this node points at, if any
    pub(crate) amd_ref: Option<String>,
    /// Ids of technical-metadata records this node points at
    pub(crate) tech_md_refs: Vec<String>,
}

impl StructNode {
    pub(crate) fn new(id: NodeId, struct_type: Option<Arc<StructType>>) -> Self {
        Self {
            id,
            struct_type,
            identifier: None,
            reference_to_anchor: None,
            logical: false,
            physical: false,
            parent: None,
            children: Vec::new(),
            metadata: Vec::new(),
            persons: Vec::new(),
            groups: Vec::new(),
            content_refs: Vec::new(),
            refs_to: Vec::new(),
            refs_from: Vec::new(),
            amd_ref: None,
            tech_md_refs: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn struct_type(&self) -> Option<&Arc<StructType>> {
        self.struct_type.as_ref()
    }

    pub fn set_type(&mut self, struct_type: Arc<StructType>) {
        self.struct_type = Some(struct_type);
    }

    /// Name of this node's struct type, or `""` if the type is unset
    pub fn type_name(&self) -> &str {
        self.struct_type
            .as_ref()
            .map(|t| t.name.as_str())
            .unwrap_or("")
    }

    /// Anchor class of this node's struct type
    pub fn anchor_class(&self) -> Option<&str> {
        self.struct_type.as_ref()?.anchor_class.as_deref()
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Sets the local identifier. No uniqueness check is performed.
    pub fn set_identifier(&mut self, identifier: &str) {
        self.identifier = Some(identifier.to_string());
    }

    pub fn reference_to_anchor(&self) -> Option<&str> {
        self.reference_to_anchor.as_deref()
    }

    pub fn set_reference_to_anchor(&mut self, reference: &str) {
        self.reference_to_anchor = Some(reference.to_string());
    }

    pub fn is_logical(&self) -> bool {
        self.logical
    }

    pub fn is_physical(&self) -> bool {
        self.physical
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn metadata(&self) -> &[ValueEntry] {
        &self.metadata
    }

    pub fn persons(&self) -> &[PersonEntry] {
        &self.persons
    }

    pub fn groups(&self) -> &[MetadataGroup] {
        &self.groups
    }

    pub fn content_refs(&self) -> &[ContentFileRef] {
        &self.content_refs
    }

    /// Outgoing references (this node is the source)
    pub fn refs_to(&self) -> &[Reference] {
        &self.refs_to
    }

    /// Incoming references (this node is the target)
    pub fn refs_from(&self) -> &[Reference] {
        &self.refs_from
    }

    /// Outgoing references of the given type
    pub fn refs_to_of_type(&self, kind: &str) -> Vec<&Reference> {
        self.refs_to.iter().filter(|r| r.kind == kind).collect()
    }

    /// Incoming references of the given type
    pub fn refs_from_of_type(&self, kind: &str) -> Vec<&Reference> {
        self.refs_from.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn amd_ref(&self) -> Option<&str> {
        self.amd_ref.as_deref()
    }

    pub fn set_amd_ref(&mut self, id: &str) {
        self.amd_ref = Some(id.to_string());
    }

    pub fn tech_md_refs(&self) -> &[String] {
        &self.tech_md_refs
    }

    pub fn add_tech_md_ref(&mut self, id: &str) {
        self.tech_md_refs.push(id.to_string());
    }

    fn require_type(&self) -> Result<&Arc<StructType>> {
        self.struct_type.as_ref().ok_or(ModelError::NoType)
    }

    /// Number of metadata and person entries of the given type
    pub fn count_md_of_type(&self, type_name: &str) -> usize {
        let values = self
            .metadata
            .iter()
            .filter(|md| md.type_name() == type_name)
            .count();
        let persons = self
            .persons
            .iter()
            .filter(|p| p.type_name() == type_name)
            .count();
        values + persons
    }

    /// All value entries of the given type
    pub fn metadata_by_type(&self, type_name: &str) -> Vec<&ValueEntry> {
        self.metadata
            .iter()
            .filter(|md| md.type_name() == type_name)
            .collect()
    }

    /// All person entries of the given type
    pub fn persons_by_type(&self, type_name: &str) -> Vec<&PersonEntry> {
        self.persons
            .iter()
            .filter(|p| p.type_name() == type_name)
            .collect()
    }

    /// All groups of the given group type
    pub fn groups_by_type(&self, type_name: &str) -> Vec<&MetadataGroup> {
        self.groups
            .iter()
            .filter(|g| g.type_name() == type_name)
            .collect()
    }

    /// All value entries whose type is flagged as an identifier
    pub fn identifier_metadata(&self) -> Vec<&ValueEntry> {
        self.metadata
            .iter()
            .filter(|md| md.core.md_type.is_identifier)
            .collect()
    }

    /// All value entries whose type is not internal
    pub fn visible_metadata(&self) -> Vec<&ValueEntry> {
        self.metadata
            .iter()
            .filter(|md| !md.core.md_type.is_hidden())
            .collect()
    }

    /// Whether this node carries at least one entry of the given type
    pub fn has_metadata(&self, type_name: &str) -> bool {
        self.count_md_of_type(type_name) > 0
    }

    /// Declared metadata types for which another entry may still be added
    pub fn addable_metadata_types(&self) -> Vec<Arc<MetadataType>> {
        let Some(struct_type) = self.struct_type.as_ref() else {
            return Vec::new();
        };
        struct_type
            .metadata
            .iter()
            .filter(|decl| {
                decl.cardinality
                    .allows_another(self.count_md_of_type(&decl.md_type.name))
            })
            .map(|decl| Arc::clone(&decl.md_type))
            .collect()
    }

    /// All metadata types declared on this node's struct type
    pub fn possible_metadata_types(&self) -> Vec<Arc<MetadataType>> {
        self.struct_type
            .as_ref()
            .map(|st| st.metadata.iter().map(|d| Arc::clone(&d.md_type)).collect())
            .unwrap_or_default()
    }

    /// Default-display metadata types without an instance on this node yet
    pub fn display_metadata_types(&self) -> Vec<Arc<MetadataType>> {
        let Some(struct_type) = self.struct_type.as_ref() else {
            return Vec::new();
        };
        struct_type
            .metadata
            .iter()
            .filter(|decl| decl.default_display && !self.has_metadata(&decl.md_type.name))
            .map(|decl| Arc::clone(&decl.md_type))
            .collect()
    }

    /// Declared group types for which another group may still be added
    pub fn addable_metadata_group_types(&self) -> Vec<Arc<crate::ruleset::MetadataGroupType>> {
        let Some(struct_type) = self.struct_type.as_ref() else {
            return Vec::new();
        };
        struct_type
            .groups
            .iter()
            .filter(|decl| {
                decl.cardinality
                    .allows_another(self.groups_by_type(&decl.group_type.name).len())
            })
            .map(|decl| Arc::clone(&decl.group_type))
            .collect()
    }

    /// Prepares this node for an editing mask: every default-display type
    /// missing an instance gets a blank entry (a person entry for person
    /// types), then everything is returned in declaration order, with the
    /// persons first when `persons_top` is set.
    pub fn prepare_metadata_form(
        &mut self,
        ruleset: &RuleSet,
        persons_top: bool,
    ) -> Result<Vec<super::metadata::MetadataEntry>> {
        use super::metadata::MetadataEntry;

        for md_type in self.display_metadata_types() {
            if md_type.is_person {
                self.add_person(PersonEntry::new(md_type))?;
            } else {
                self.add_metadata(ValueEntry::new(md_type))?;
            }
        }
        self.sort_metadata(ruleset);

        let mut form = Vec::with_capacity(self.metadata.len() + self.persons.len());
        if persons_top {
            form.extend(self.persons.iter().cloned().map(MetadataEntry::Person));
            form.extend(self.metadata.iter().cloned().map(MetadataEntry::Value));
        } else {
            form.extend(self.metadata.iter().cloned().map(MetadataEntry::Value));
            form.extend(self.persons.iter().cloned().map(MetadataEntry::Person));
        }
        Ok(form)
    }

    /// Checks schema listing and cardinality for one more entry of `type_name`,
    /// returning the canonical type to rebind to. Internal types pass with
    /// their own type object.
    fn admit_entry(&self, entry_type: &Arc<MetadataType>) -> Result<Arc<MetadataType>> {
        let struct_type = self.require_type()?;
        let type_name = entry_type.name.as_str();

        if type_name.starts_with(HIDDEN_METADATA_PREFIX) {
            return Ok(Arc::clone(entry_type));
        }

        let decl = struct_type.metadata_decl(type_name).ok_or_else(|| {
            ModelError::MetadataTypeNotAllowed {
                md_type: type_name.to_string(),
                struct_type: struct_type.name.clone(),
            }
        })?;

        if !decl.cardinality.allows_another(self.count_md_of_type(type_name)) {
            tracing::debug!("not allowed to add metadata '{}'", type_name);
            return Err(ModelError::MetadataTypeNotAllowed {
                md_type: type_name.to_string(),
                struct_type: struct_type.name.clone(),
            });
        }

        Ok(Arc::clone(&decl.md_type))
    }

    /// Adds a metadata value to this node.
    ///
    /// The entry's type is replaced by the canonical copy owned by this
    /// node's struct type; its name is identical afterwards.
    pub fn add_metadata(&mut self, mut entry: ValueEntry) -> Result<()> {
        let canonical = self.admit_entry(&entry.core.md_type)?;
        entry.core.md_type = canonical;
        self.metadata.push(entry);
        Ok(())
    }

    /// Convenience: adds a metadata value by declared field name
    pub fn add_metadata_value(&mut self, type_name: &str, value: &str) -> Result<()> {
        let struct_type = self.require_type()?;
        let md_type = struct_type.canonical_metadata_type(type_name).ok_or_else(|| {
            ModelError::MetadataTypeNotAllowed {
                md_type: type_name.to_string(),
                struct_type: struct_type.name.clone(),
            }
        })?;
        self.add_metadata(ValueEntry::with_value(md_type, value))
    }

    /// Removes the first entry equal to `entry`. Minima are not enforced.
    pub fn remove_metadata(&mut self, entry: &ValueEntry) -> bool {
        if let Some(pos) = self.metadata.iter().position(|md| md == entry) {
            self.metadata.remove(pos);
            return true;
        }
        false
    }

    /// Replaces a metadata value by another of the same type, in place.
    ///
    /// Returns false when the type names differ or `old` is not present.
    pub fn change_metadata(&mut self, old: &ValueEntry, mut new: ValueEntry) -> bool {
        if old.type_name() != new.type_name() {
            return false;
        }
        let Some(pos) = self.metadata.iter().position(|md| md == old) else {
            return false;
        };
        if let Ok(canonical) = self.admit_existing_type(&new.core.md_type) {
            new.core.md_type = canonical;
        }
        self.metadata[pos] = new;
        true
    }

    /// Canonical copy lookup without the cardinality check (used on exchange)
    fn admit_existing_type(&self, entry_type: &Arc<MetadataType>) -> Result<Arc<MetadataType>> {
        let struct_type = self.require_type()?;
        if entry_type.name.starts_with(HIDDEN_METADATA_PREFIX) {
            return Ok(Arc::clone(entry_type));
        }
        struct_type
            .canonical_metadata_type(&entry_type.name)
            .ok_or_else(|| ModelError::MetadataTypeNotAllowed {
                md_type: entry_type.name.clone(),
                struct_type: struct_type.name.clone(),
            })
    }

    /// Whether removing one entry of the type would keep the declared minimum
    pub fn can_metadata_be_removed(&self, type_name: &str) -> Result<bool> {
        let struct_type = self.require_type()?;
        let present = self.count_md_of_type(type_name);
        if let Some(cardinality) = struct_type.metadata_cardinality(type_name) {
            if present == 1 && cardinality.requires_one() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Adds a person entry, with the same checks and rebinding as metadata
    pub fn add_person(&mut self, mut person: PersonEntry) -> Result<()> {
        let canonical = self.admit_entry(&person.core.md_type)?;
        person.core.md_type = canonical;
        self.persons.push(person);
        Ok(())
    }

    /// Removes the first person equal to `person`. Minima are not enforced.
    pub fn remove_person(&mut self, person: &PersonEntry) -> bool {
        if let Some(pos) = self.persons.iter().position(|p| p == person) {
            self.persons.remove(pos);
            return true;
        }
        false
    }

    /// Adds a metadata group, checked against the group declarations
    pub fn add_metadata_group(&mut self, group: MetadataGroup) -> Result<()> {
        let struct_type = self.require_type()?;
        let type_name = group.type_name();

        if !type_name.starts_with(HIDDEN_METADATA_PREFIX) {
            let decl = struct_type.group_decl(type_name).ok_or_else(|| {
                ModelError::MetadataTypeNotAllowed {
                    md_type: type_name.to_string(),
                    struct_type: struct_type.name.clone(),
                }
            })?;
            let present = self.groups_by_type(type_name).len();
            if !decl.cardinality.allows_another(present) {
                return Err(ModelError::MetadataTypeNotAllowed {
                    md_type: type_name.to_string(),
                    struct_type: struct_type.name.clone(),
                });
            }
        }

        self.groups.push(group);
        Ok(())
    }

    /// Removes the first group equal to `group`. Minima are not enforced.
    pub fn remove_metadata_group(&mut self, group: &MetadataGroup) -> bool {
        if let Some(pos) = self.groups.iter().position(|g| g == group) {
            self.groups.remove(pos);
            return true;
        }
        false
    }

    /// Whether removing one group of the type would keep the declared minimum
    pub fn can_metadata_group_be_removed(&self, type_name: &str) -> Result<bool> {
        let struct_type = self.require_type()?;
        let present = self.groups_by_type(type_name).len();
        if let Some(decl) = struct_type.group_decl(type_name) {
            if present == 1 && decl.cardinality.requires_one() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drops blank persons, valueless metadata and groups of only blank values
    pub fn delete_unused_entries(&mut self) {
        self.persons.retain(|p| !p.is_blank());
        self.metadata.retain(|md| md.core.value.is_some());
        self.groups.retain(|g| !g.is_empty());
    }

    /// Reorders metadata and persons to match the declaration order on this
    /// node's struct type in the rule set; entries whose type is not declared
    /// there keep their relative order at the end.
    pub fn sort_metadata(&mut self, ruleset: &RuleSet) {
        let Some(own_type) = self.struct_type.as_ref() else {
            return;
        };
        // The rule set's copy of the type drives the order.
        let Some(declared) = ruleset.struct_type(&own_type.name) else {
            return;
        };

        let mut new_metadata = Vec::with_capacity(self.metadata.len());
        let mut new_persons = Vec::with_capacity(self.persons.len());
        let mut old_metadata: Vec<Option<ValueEntry>> =
            self.metadata.drain(..).map(Some).collect();
        let mut old_persons: Vec<Option<PersonEntry>> =
            self.persons.drain(..).map(Some).collect();

        for decl in &declared.metadata {
            for slot in old_persons.iter_mut() {
                if slot
                    .as_ref()
                    .map_or(false, |p| p.type_name() == decl.md_type.name)
                {
                    if let Some(person) = slot.take() {
                        new_persons.push(person);
                    }
                }
            }
            for slot in old_metadata.iter_mut() {
                if slot
                    .as_ref()
                    .map_or(false, |md| md.type_name() == decl.md_type.name)
                {
                    if let Some(entry) = slot.take() {
                        new_metadata.push(entry);
                    }
                }
            }
        }

        new_persons.extend(old_persons.into_iter().flatten());
        new_metadata.extend(old_metadata.into_iter().flatten());

        self.metadata = new_metadata;
        self.persons = new_persons;
    }

    /// Reorders metadata and persons by type name, lexicographically (stable)
    pub fn sort_metadata_lexical(&mut self) {
        self.metadata
            .sort_by(|a, b| a.type_name().cmp(b.type_name()));
        self.persons.sort_by(|a, b| a.type_name().cmp(b.type_name()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::metadata::PersonEntry;
    use crate::ruleset::{Cardinality, MetadataDecl};

    fn make_ruleset() -> RuleSet {
        let mut rs = RuleSet::new();
        let title = rs.add_metadata_type(MetadataType::new("TitleDocMain"));
        let note = rs.add_metadata_type(MetadataType::new("Note"));
        let author = rs.add_metadata_type(MetadataType {
            name: "Author".to_string(),
            labels: Default::default(),
            is_person: true,
            is_identifier: false,
        });

        let mut mono = StructType::new("Monograph");
        mono.allowed_children.push("Chapter".to_string());
        mono.metadata.push(MetadataDecl {
            md_type: title,
            cardinality: Cardinality::ExactlyOne,
            default_display: true,
        });
        mono.metadata.push(MetadataDecl {
            md_type: author,
            cardinality: Cardinality::ZeroOrMore,
            default_display: false,
        });
        mono.metadata.push(MetadataDecl {
            md_type: note,
            cardinality: Cardinality::ZeroOrMore,
            default_display: false,
        });
        rs.add_struct_type(mono);
        rs
    }

    fn make_node(rs: &RuleSet) -> StructNode {
        StructNode::new(NodeId(0), rs.struct_type("Monograph"))
    }

    #[test]
    fn test_add_metadata_rebinds_to_canonical_type() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);

        // A fresh, structurally equal type object; not the canonical one.
        let foreign = Arc::new(MetadataType::new("TitleDocMain"));
        node.add_metadata(ValueEntry::with_value(Arc::clone(&foreign), "Hello"))
            .unwrap();

        let canonical = node
            .struct_type()
            .unwrap()
            .canonical_metadata_type("TitleDocMain")
            .unwrap();
        let bound = &node.metadata()[0].core.md_type;
        assert!(Arc::ptr_eq(bound, &canonical));
        assert!(!Arc::ptr_eq(bound, &foreign));
        assert_eq!(bound.name, "TitleDocMain");
    }

    #[test]
    fn test_cardinality_rejection_keeps_list_unchanged() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        let title = rs.metadata_type("TitleDocMain").unwrap();

        node.add_metadata(ValueEntry::with_value(Arc::clone(&title), "A"))
            .unwrap();
        let err = node
            .add_metadata(ValueEntry::with_value(title, "B"))
            .unwrap_err();

        assert!(matches!(err, ModelError::MetadataTypeNotAllowed { .. }));
        assert_eq!(node.count_md_of_type("TitleDocMain"), 1);
        assert_eq!(node.metadata()[0].value(), Some("A"));
    }

    #[test]
    fn test_undeclared_type_rejected_but_hidden_allowed() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);

        let publisher = Arc::new(MetadataType::new("Publisher"));
        assert!(matches!(
            node.add_metadata(ValueEntry::new(publisher)),
            Err(ModelError::MetadataTypeNotAllowed { .. })
        ));

        let internal = Arc::new(MetadataType::new("_digitalOrigin"));
        for _ in 0..3 {
            node.add_metadata(ValueEntry::with_value(Arc::clone(&internal), "x"))
                .unwrap();
        }
        assert_eq!(node.count_md_of_type("_digitalOrigin"), 3);
    }

    #[test]
    fn test_no_type_error() {
        let mut node = StructNode::new(NodeId(0), None);
        let err = node
            .add_metadata(ValueEntry::new(Arc::new(MetadataType::new("TitleDocMain"))))
            .unwrap_err();
        assert!(matches!(err, ModelError::NoType));
    }

    #[test]
    fn test_person_counts_against_shared_cardinality() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        let author = rs.metadata_type("Author").unwrap();

        node.add_person(PersonEntry::with_name(Arc::clone(&author), "Doe", "John"))
            .unwrap();
        node.add_person(PersonEntry::with_name(author, "Roe", "Jane"))
            .unwrap();
        assert_eq!(node.count_md_of_type("Author"), 2);
    }

    #[test]
    fn test_change_metadata_preserves_position() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("TitleDocMain", "Old").unwrap();
        node.add_metadata_value("Note", "n1").unwrap();

        let old = node.metadata()[0].clone();
        let new = ValueEntry::with_value(rs.metadata_type("TitleDocMain").unwrap(), "New");
        assert!(node.change_metadata(&old, new));

        assert_eq!(node.metadata()[0].value(), Some("New"));
        assert_eq!(node.metadata()[1].value(), Some("n1"));

        // Different type names must be refused.
        let old = node.metadata()[0].clone();
        let other = ValueEntry::with_value(rs.metadata_type("Note").unwrap(), "x");
        assert!(!node.change_metadata(&old, other));
    }

    #[test]
    fn test_removal_does_not_enforce_minimum_but_query_reports_it() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("TitleDocMain", "Hello").unwrap();

        assert_eq!(node.can_metadata_be_removed("TitleDocMain").unwrap(), false);

        let entry = node.metadata()[0].clone();
        assert!(node.remove_metadata(&entry));
        assert_eq!(node.count_md_of_type("TitleDocMain"), 0);
    }

    #[test]
    fn test_sort_metadata_follows_declaration_order() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("Note", "n1").unwrap();
        node.add_metadata_value("Note", "n2").unwrap();
        node.add_metadata_value("TitleDocMain", "T").unwrap();
        node.add_metadata(ValueEntry::with_value(
            Arc::new(MetadataType::new("_internal")),
            "i",
        ))
        .unwrap();

        node.sort_metadata(&rs);

        let order: Vec<&str> = node.metadata().iter().map(|m| m.type_name()).collect();
        // Declared order first (TitleDocMain before Note), leftovers last.
        assert_eq!(order, vec!["TitleDocMain", "Note", "Note", "_internal"]);
        // Within one type the original order is kept.
        assert_eq!(node.metadata()[1].value(), Some("n1"));
        assert_eq!(node.metadata()[2].value(), Some("n2"));
    }

    #[test]
    fn test_sort_metadata_is_idempotent() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("Note", "n").unwrap();
        node.add_metadata_value("TitleDocMain", "T").unwrap();

        node.sort_metadata(&rs);
        let once: Vec<ValueEntry> = node.metadata().to_vec();
        node.sort_metadata(&rs);
        assert_eq!(node.metadata(), once.as_slice());
    }

    #[test]
    fn test_sort_metadata_lexical() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("TitleDocMain", "T").unwrap();
        node.add_metadata_value("Note", "n").unwrap();

        node.sort_metadata_lexical();
        let order: Vec<&str> = node.metadata().iter().map(|m| m.type_name()).collect();
        assert_eq!(order, vec!["Note", "TitleDocMain"]);
    }

    #[test]
    fn test_display_metadata_types_shrink_as_entries_arrive() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);

        let missing = node.display_metadata_types();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "TitleDocMain");

        node.add_metadata_value("TitleDocMain", "T").unwrap();
        assert!(node.display_metadata_types().is_empty());
    }

    #[test]
    fn test_prepare_metadata_form_adds_blank_defaults() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("Note", "n").unwrap();
        node.add_person(PersonEntry::with_name(
            rs.metadata_type("Author").unwrap(),
            "Doe",
            "John",
        ))
        .unwrap();

        let form = node.prepare_metadata_form(&rs, true).unwrap();

        // The missing mandatory title arrived as a blank entry.
        assert_eq!(node.count_md_of_type("TitleDocMain"), 1);
        assert!(node.metadata_by_type("TitleDocMain")[0].value().is_none());

        // Persons lead the form; values follow in declaration order.
        assert!(form[0].is_person());
        let names: Vec<&str> = form.iter().map(|entry| entry.type_name()).collect();
        assert_eq!(names, vec!["Author", "TitleDocMain", "Note"]);
    }

    #[test]
    fn test_delete_unused_entries() {
        let rs = make_ruleset();
        let mut node = make_node(&rs);
        node.add_metadata_value("TitleDocMain", "T").unwrap();
        node.add_metadata(ValueEntry::new(rs.metadata_type("Note").unwrap()))
            .unwrap();
        node.add_person(PersonEntry::new(rs.metadata_type("Author").unwrap()))
            .unwrap();

        node.delete_unused_entries();
        assert_eq!(node.metadata().len(), 1);
        assert!(node.persons().is_empty());
    }
}
