// src/format/mod.rs

//! File-format adapters
//!
//! A [`FileFormat`] turns a file on disk into a [`Document`] and back.
//! Three concrete adapters exist: the METS-flavoured format written by
//! current tooling ([`mets::MetsFormat`]), the older RDF-flavoured format
//! ([`rdf::RdfFormat`]), and the serialized snapshot format
//! ([`archive::ArchiveFormat`]). All serialize the complete model, so a
//! document written and re-read through an adapter compares equal to the
//! original under the equality validator.
//!
//! The metadata payload of a structure entry (values, persons, groups) is
//! encoded identically in both formats; only the envelopes differ. The
//! shared element encoding lives here.

pub mod archive;
pub mod mets;
pub mod rdf;

pub use archive::ArchiveFormat;
pub use mets::MetsFormat;
pub use rdf::RdfFormat;

use crate::error::{FormatError, FormatResult, ModelError};
use crate::model::{
    ContentFileArea, Document, MetadataEntry, MetadataGroup, PersonEntry, StructNode, ValueEntry,
};
use crate::ruleset::{MetadataType, RuleSet, HIDDEN_METADATA_PREFIX};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use std::sync::Arc;

/// Read/write contract between the core and a serialization format
pub trait FileFormat {
    /// Parses `path` and replaces the internal document with the result.
    /// Returns `Ok(true)` on success.
    fn read(&mut self, path: &Path) -> FormatResult<bool>;

    /// Serializes the current document to `path`. Returns `Ok(true)` on
    /// success; fails when no document is attached.
    fn write(&self, path: &Path) -> FormatResult<bool>;

    /// In-place update of a previously written file; optional, defaults to
    /// "not supported"
    fn update(&mut self, _path: &Path) -> FormatResult<bool> {
        Ok(false)
    }

    fn document(&self) -> Option<&Document>;

    fn document_mut(&mut self) -> Option<&mut Document>;

    fn set_document(&mut self, document: Document);

    /// Detaches and returns the internal document
    fn take_document(&mut self) -> Option<Document>;
}

// Shared element and attribute names for the metadata payload encoding.
pub(crate) const EL_METADATA: &str = "metadata";
pub(crate) const EL_PERSON: &str = "person";
pub(crate) const EL_GROUP: &str = "group";

/// Resolves a metadata type name against the rule set. Internal types get a
/// fresh type object; unknown public types are a rule-set violation.
pub(crate) fn resolve_metadata_type(
    ruleset: &RuleSet,
    name: &str,
) -> FormatResult<Arc<MetadataType>> {
    if let Some(md_type) = ruleset.metadata_type(name) {
        return Ok(md_type);
    }
    if name.starts_with(HIDDEN_METADATA_PREFIX) {
        return Ok(Arc::new(MetadataType::new(name)));
    }
    Err(FormatError::Model(ModelError::Preferences(format!(
        "metadata type '{}' is not declared in the rule set",
        name
    ))))
}

/// Writes the metadata payload of a node: values, persons, groups, in order
pub(crate) fn write_entries(writer: &mut Writer<Vec<u8>>, node: &StructNode) -> FormatResult<()> {
    for entry in node.metadata() {
        writer.write_event(Event::Empty(value_entry_element(entry)))?;
    }
    for person in node.persons() {
        writer.write_event(Event::Empty(person_element(person)))?;
    }
    for group in node.groups() {
        write_group(writer, group)?;
    }
    Ok(())
}

pub(crate) fn write_group(writer: &mut Writer<Vec<u8>>, group: &MetadataGroup) -> FormatResult<()> {
    let mut start = BytesStart::new(EL_GROUP);
    start.push_attribute(("type", group.type_name()));
    writer.write_event(Event::Start(start))?;
    for entry in &group.entries {
        match entry {
            MetadataEntry::Value(value) => {
                writer.write_event(Event::Empty(value_entry_element(value)))?;
            }
            MetadataEntry::Person(person) => {
                writer.write_event(Event::Empty(person_element(person)))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(EL_GROUP)))?;
    Ok(())
}

fn value_entry_element(entry: &ValueEntry) -> BytesStart<'static> {
    let mut elem = BytesStart::new(EL_METADATA);
    elem.push_attribute(("type", entry.type_name()));
    if let Some(value) = entry.value() {
        elem.push_attribute(("value", value));
    }
    if let Some(qualifier) = &entry.core.qualifier {
        elem.push_attribute(("qualifier", qualifier.value.as_str()));
        elem.push_attribute(("qualifierType", qualifier.kind.as_str()));
    }
    if let Some(authority) = &entry.core.authority {
        elem.push_attribute(("authority", authority.id.as_str()));
        elem.push_attribute(("authorityURI", authority.uri.as_str()));
        elem.push_attribute(("authorityValue", authority.value.as_str()));
    }
    elem
}

fn person_element(person: &PersonEntry) -> BytesStart<'static> {
    let mut elem = BytesStart::new(EL_PERSON);
    elem.push_attribute(("type", person.type_name()));
    if let Some(value) = &person.core.value {
        elem.push_attribute(("value", value.as_str()));
    }
    if let Some(first) = &person.first_name {
        elem.push_attribute(("firstName", first.as_str()));
    }
    if let Some(last) = &person.last_name {
        elem.push_attribute(("lastName", last.as_str()));
    }
    if let Some(display) = &person.display_name {
        elem.push_attribute(("displayName", display.as_str()));
    }
    if let Some(affiliation) = &person.affiliation {
        elem.push_attribute(("affiliation", affiliation.as_str()));
    }
    if let Some(institution) = &person.institution {
        elem.push_attribute(("institution", institution.as_str()));
    }
    if let Some(role) = &person.role {
        elem.push_attribute(("role", role.as_str()));
    }
    if let Some(person_type) = &person.person_type {
        elem.push_attribute(("personType", person_type.as_str()));
    }
    if person.corporation {
        elem.push_attribute(("corporation", "true"));
    }
    if let Some(authority) = &person.core.authority {
        elem.push_attribute(("authority", authority.id.as_str()));
        elem.push_attribute(("authorityURI", authority.uri.as_str()));
        elem.push_attribute(("authorityValue", authority.value.as_str()));
    }
    elem
}

/// Optional attribute lookup with adapter error context
pub(crate) fn attr_opt(
    element: &BytesStart<'_>,
    name: &str,
    path: &Path,
) -> FormatResult<Option<String>> {
    match element.try_get_attribute(name) {
        Ok(Some(attribute)) => {
            let value = attribute
                .unescape_value()
                .map_err(|e| read_error(path, &e.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(read_error(path, &e.to_string())),
    }
}

/// Required attribute lookup with adapter error context
pub(crate) fn attr_req(
    element: &BytesStart<'_>,
    name: &str,
    path: &Path,
) -> FormatResult<String> {
    attr_opt(element, name, path)?.ok_or_else(|| {
        read_error(
            path,
            &format!(
                "missing attribute '{}' on element '{}'",
                name,
                String::from_utf8_lossy(element.name().as_ref())
            ),
        )
    })
}

pub(crate) fn read_error(path: &Path, detail: &str) -> FormatError {
    FormatError::Read {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

pub(crate) fn write_error(path: &Path, detail: &str) -> FormatError {
    FormatError::Write {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Parses a `metadata` element into a value entry
pub(crate) fn parse_value_entry(
    ruleset: &RuleSet,
    element: &BytesStart<'_>,
    path: &Path,
) -> FormatResult<ValueEntry> {
    let type_name = attr_req(element, "type", path)?;
    let md_type = resolve_metadata_type(ruleset, &type_name)?;
    let mut entry = ValueEntry::new(md_type);
    entry.core.value = attr_opt(element, "value", path)?;
    if let (Some(value), Some(kind)) = (
        attr_opt(element, "qualifier", path)?,
        attr_opt(element, "qualifierType", path)?,
    ) {
        entry.set_qualifier(&value, &kind);
    }
    if let (Some(id), Some(uri), Some(value)) = (
        attr_opt(element, "authority", path)?,
        attr_opt(element, "authorityURI", path)?,
        attr_opt(element, "authorityValue", path)?,
    ) {
        entry.set_authority(&id, &uri, &value);
    }
    Ok(entry)
}

/// Parses a `person` element into a person entry.
///
/// A person element without a type attribute is an incomplete person and
/// rejected.
pub(crate) fn parse_person_entry(
    ruleset: &RuleSet,
    element: &BytesStart<'_>,
    path: &Path,
) -> FormatResult<PersonEntry> {
    let Some(type_name) = attr_opt(element, "type", path)? else {
        return Err(FormatError::Model(ModelError::IncompletePerson));
    };
    let md_type = resolve_metadata_type(ruleset, &type_name)?;
    let mut person = PersonEntry::new(md_type);
    person.core.value = attr_opt(element, "value", path)?;
    person.first_name = attr_opt(element, "firstName", path)?;
    person.last_name = attr_opt(element, "lastName", path)?;
    person.display_name = attr_opt(element, "displayName", path)?;
    person.affiliation = attr_opt(element, "affiliation", path)?;
    person.institution = attr_opt(element, "institution", path)?;
    if let Some(role) = attr_opt(element, "role", path)? {
        person.role = Some(role);
    }
    person.person_type = attr_opt(element, "personType", path)?;
    person.corporation = attr_opt(element, "corporation", path)?.as_deref() == Some("true");
    if let (Some(id), Some(uri), Some(value)) = (
        attr_opt(element, "authority", path)?,
        attr_opt(element, "authorityURI", path)?,
        attr_opt(element, "authorityValue", path)?,
    ) {
        person.core.authority = Some(crate::model::Authority { id, uri, value });
    }
    Ok(person)
}

/// Parses a `group` element, consuming events up to its end tag
pub(crate) fn parse_group(
    reader: &mut Reader<&[u8]>,
    ruleset: &RuleSet,
    start: &BytesStart<'_>,
    path: &Path,
) -> FormatResult<MetadataGroup> {
    let type_name = attr_req(start, "type", path)?;
    let group_type = match ruleset.group_type(&type_name) {
        Some(t) => t,
        None if type_name.starts_with(HIDDEN_METADATA_PREFIX) => {
            Arc::new(crate::ruleset::MetadataGroupType::new(&type_name))
        }
        None => {
            return Err(FormatError::Model(ModelError::Preferences(format!(
                "metadata group type '{}' is not declared in the rule set",
                type_name
            ))))
        }
    };

    let mut group = MetadataGroup::new(group_type);
    loop {
        match reader
            .read_event()
            .map_err(|e| read_error(path, &e.to_string()))?
        {
            Event::Empty(e) | Event::Start(e) => match e.name().as_ref() {
                name if name == EL_METADATA.as_bytes() => {
                    group.add_entry(MetadataEntry::Value(parse_value_entry(ruleset, &e, path)?));
                }
                name if name == EL_PERSON.as_bytes() => {
                    group.add_entry(MetadataEntry::Person(parse_person_entry(ruleset, &e, path)?));
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == EL_GROUP.as_bytes() => break,
            Event::Eof => return Err(read_error(path, "unexpected end of file inside group")),
            _ => {}
        }
    }
    Ok(group)
}

/// Writes an optional content-file area as attributes
pub(crate) fn push_area_attributes(element: &mut BytesStart<'_>, area: &ContentFileArea) {
    element.push_attribute(("areaKind", area.kind.as_str()));
    if let Some(begin) = &area.begin {
        element.push_attribute(("areaBegin", begin.as_str()));
    }
    if let Some(end) = &area.end {
        element.push_attribute(("areaEnd", end.as_str()));
    }
}

/// Reads an optional content-file area from attributes
pub(crate) fn parse_area(
    element: &BytesStart<'_>,
    path: &Path,
) -> FormatResult<Option<ContentFileArea>> {
    let Some(kind) = attr_opt(element, "areaKind", path)? else {
        return Ok(None);
    };
    Ok(Some(ContentFileArea {
        kind,
        begin: attr_opt(element, "areaBegin", path)?,
        end: attr_opt(element, "areaEnd", path)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    fn make_ruleset() -> RuleSet {
        let mut rs = RuleSet::new();
        rs.add_metadata_type(MetadataType::new("TitleDocMain"));
        rs.add_metadata_type(MetadataType {
            name: "Author".to_string(),
            labels: Default::default(),
            is_person: true,
            is_identifier: false,
        });
        rs
    }

    #[test]
    fn test_resolve_metadata_type() {
        let rs = make_ruleset();
        assert!(resolve_metadata_type(&rs, "TitleDocMain").is_ok());
        assert!(resolve_metadata_type(&rs, "_hidden").is_ok());
        assert!(matches!(
            resolve_metadata_type(&rs, "Unknown"),
            Err(FormatError::Model(ModelError::Preferences(_)))
        ));
    }

    #[test]
    fn test_value_entry_round_trip_through_attributes() {
        let rs = make_ruleset();
        let mut entry = ValueEntry::with_value(rs.metadata_type("TitleDocMain").unwrap(), "Hello");
        entry.set_qualifier("hello", "sorting");
        entry.set_authority("gnd", "http://d-nb.info/gnd/", "4099365-9");

        let elem = value_entry_element(&entry);
        let parsed = parse_value_entry(&rs, &elem, Path::new("test.xml")).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_person_round_trip_through_attributes() {
        let rs = make_ruleset();
        let mut person =
            PersonEntry::with_name(rs.metadata_type("Author").unwrap(), "Doe", "John");
        person.institution = Some("Library".to_string());
        person.corporation = true;

        let elem = person_element(&person);
        let parsed = parse_person_entry(&rs, &elem, Path::new("test.xml")).unwrap();
        assert_eq!(parsed, person);
    }

    #[test]
    fn test_person_without_type_is_incomplete() {
        let rs = make_ruleset();
        let elem = BytesStart::new(EL_PERSON);
        assert!(matches!(
            parse_person_entry(&rs, &elem, Path::new("test.xml")),
            Err(FormatError::Model(ModelError::IncompletePerson))
        ));
    }

    #[test]
    fn test_write_entries_produces_expected_elements() {
        let rs = make_ruleset();
        let mut node = StructNode::new(NodeId(0), None);
        // Bypass schema checks: fill the lists directly through a typed node.
        node.set_type(Arc::new({
            let mut st = crate::ruleset::StructType::new("Monograph");
            st.metadata.push(crate::ruleset::MetadataDecl {
                md_type: rs.metadata_type("TitleDocMain").unwrap(),
                cardinality: crate::ruleset::Cardinality::ExactlyOne,
                default_display: false,
            });
            st
        }));
        node.add_metadata_value("TitleDocMain", "Hello").unwrap();

        let mut writer = Writer::new(Vec::new());
        write_entries(&mut writer, &node).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.contains(r#"<metadata type="TitleDocMain" value="Hello"/>"#));
    }
}
