// src/format/mets.rs

//! METS-flavoured XML adapter
//!
//! Serializes a document as a METS envelope: descriptive-metadata sections
//! (`dmdSec`) referenced from structure divs, an administrative section
//! (`amdSec`) carrying the opaque technical-metadata fragments, a file
//! section, one `structMap` per tree and a `structLink` section for the
//! cross-tree references. Structure ids (`LOG_nnnn`, `PHYS_nnnn`) are
//! assigned at write time in preorder; everything the writer emits comes
//! from ordered model state, so equal documents produce identical files.

use super::{
    attr_opt, attr_req, parse_area, parse_group, parse_person_entry, parse_value_entry,
    push_area_attributes, read_error, write_entries, write_error, FileFormat, EL_GROUP,
    EL_METADATA, EL_PERSON,
};
use crate::error::{FormatError, FormatResult};
use crate::model::{
    AmdSec, ContentFile, Document, MetadataGroup, NodeId, PersonEntry, TechMd, ValueEntry,
};
use crate::ruleset::RuleSet;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Adapter for the METS-flavoured metadata format
pub struct MetsFormat {
    ruleset: Arc<RuleSet>,
    document: Option<Document>,
}

impl MetsFormat {
    pub fn new(ruleset: Arc<RuleSet>) -> Self {
        Self {
            ruleset,
            document: None,
        }
    }

    /// Writes the serialization unit of one anchor class: the logical
    /// skeleton truncated below the class, with pointer elements where the
    /// pointer policy requires them. Pages, files and links stay in the
    /// main file.
    pub fn write_anchor_file(&self, path: &Path, anchor_class: &str) -> FormatResult<bool> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| write_error(path, "no document attached"))?;
        let Some(root) = document.logical_root() else {
            return Err(write_error(path, "no logical structure to anchor"));
        };

        let mut scratch = document.clone();
        let truncated = scratch.copy_truncated(root, anchor_class);
        scratch.clear_physical_root();
        scratch.set_logical_root(truncated);
        scratch.set_file_set(crate::model::FileSet::new());

        let xml = render_mets(&scratch, path, Some(anchor_class))?;
        std::fs::write(path, xml)?;
        tracing::debug!(
            target: "adapter",
            "wrote anchor file '{}' for class '{}'",
            path.display(),
            anchor_class
        );
        Ok(true)
    }
}

impl FileFormat for MetsFormat {
    fn read(&mut self, path: &Path) -> FormatResult<bool> {
        if !path.exists() {
            return Err(FormatError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let document = parse_mets(&content, &self.ruleset, path)?;
        self.document = Some(document);
        tracing::debug!(target: "adapter", "read METS file '{}'", path.display());
        Ok(true)
    }

    fn write(&self, path: &Path) -> FormatResult<bool> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| write_error(path, "no document attached"))?;
        let xml = render_mets(document, path, None)?;
        std::fs::write(path, xml)?;
        tracing::debug!(target: "adapter", "wrote METS file '{}'", path.display());
        Ok(true)
    }

    fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    fn set_document(&mut self, document: Document) {
        self.document = Some(document);
    }

    fn take_document(&mut self) -> Option<Document> {
        self.document.take()
    }
}

//
// Writing
//

/// Preorder div ids for both trees: `LOG_nnnn` and `PHYS_nnnn`
fn assign_div_ids(document: &Document) -> HashMap<NodeId, String> {
    let mut ids = HashMap::new();
    if let Some(root) = document.logical_root() {
        for (index, node) in document.descendants(root).into_iter().enumerate() {
            ids.insert(node, format!("LOG_{:04}", index + 1));
        }
    }
    if let Some(root) = document.physical_root() {
        for (index, node) in document.descendants(root).into_iter().enumerate() {
            ids.insert(node, format!("PHYS_{:04}", index + 1));
        }
    }
    ids
}

fn file_id(index: usize) -> String {
    format!("FILE_{:04}", index + 1)
}

fn node_has_payload(document: &Document, node: NodeId) -> bool {
    let n = document.node(node);
    !(n.metadata().is_empty() && n.persons().is_empty() && n.groups().is_empty())
}

fn render_mets(
    document: &Document,
    path: &Path,
    file_class: Option<&str>,
) -> FormatResult<Vec<u8>> {
    let ids = assign_div_ids(document);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("mets")))?;

    // Descriptive metadata, one section per div with payload, both trees.
    for root in [document.logical_root(), document.physical_root()]
        .into_iter()
        .flatten()
    {
        for node in document.descendants(root) {
            if !node_has_payload(document, node) {
                continue;
            }
            let div_id = ids.get(&node).ok_or_else(|| {
                write_error(path, "node outside both trees carries metadata")
            })?;
            let dmd_id = format!("DMD_{}", div_id);
            let mut dmd = BytesStart::new("dmdSec");
            dmd.push_attribute(("ID", dmd_id.as_str()));
            writer.write_event(Event::Start(dmd))?;
            let mut wrap = BytesStart::new("mdWrap");
            wrap.push_attribute(("MDTYPE", "MODS"));
            writer.write_event(Event::Start(wrap))?;
            writer.write_event(Event::Start(BytesStart::new("xmlData")))?;
            write_entries(&mut writer, document.node(node))?;
            writer.write_event(Event::End(BytesEnd::new("xmlData")))?;
            writer.write_event(Event::End(BytesEnd::new("mdWrap")))?;
            writer.write_event(Event::End(BytesEnd::new("dmdSec")))?;
        }
    }

    // Administrative metadata: opaque fragments, stored as escaped text.
    if let Some(amd) = document.amd_sec() {
        let mut amd_start = BytesStart::new("amdSec");
        if let Some(id) = &amd.id {
            amd_start.push_attribute(("ID", id.as_str()));
        }
        writer.write_event(Event::Start(amd_start))?;
        for tech_md in amd.tech_mds() {
            let mut tech = BytesStart::new("techMD");
            tech.push_attribute(("ID", tech_md.id.as_str()));
            writer.write_event(Event::Start(tech))?;
            writer.write_event(Event::Text(BytesText::new(&tech_md.fragment)))?;
            writer.write_event(Event::End(BytesEnd::new("techMD")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("amdSec")))?;
    }

    // File section.
    if let Some(file_set) = document.file_set() {
        if !file_set.is_empty() || !file_set.virtual_groups().is_empty() {
            writer.write_event(Event::Start(BytesStart::new("fileSec")))?;
            let mut local = BytesStart::new("fileGrp");
            local.push_attribute(("USE", "LOCAL"));
            writer.write_event(Event::Start(local))?;
            for (id, file) in file_set.files() {
                let id_string = file_id(id.index());
                let mut elem = BytesStart::new("file");
                elem.push_attribute(("ID", id_string.as_str()));
                elem.push_attribute(("MIMETYPE", file.mime_type.as_str()));
                if file.representative {
                    elem.push_attribute(("USE", "banner"));
                }
                writer.write_event(Event::Start(elem))?;
                let mut locat = BytesStart::new("FLocat");
                locat.push_attribute(("href", file.location.as_str()));
                writer.write_event(Event::Empty(locat))?;
                writer.write_event(Event::End(BytesEnd::new("file")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("fileGrp")))?;

            for group in file_set.virtual_groups() {
                let mut elem = BytesStart::new("fileGrp");
                elem.push_attribute(("USE", group.name.as_str()));
                elem.push_attribute(("PATH", group.path_to_files.as_str()));
                elem.push_attribute(("MIMETYPE", group.mime_type.as_str()));
                elem.push_attribute(("FILESUFFIX", group.file_suffix.as_str()));
                elem.push_attribute(("IDSUFFIX", group.id_suffix.as_str()));
                writer.write_event(Event::Empty(elem))?;
            }
            writer.write_event(Event::End(BytesEnd::new("fileSec")))?;
        }
    }

    // Structure maps.
    if let Some(root) = document.logical_root() {
        let mut map = BytesStart::new("structMap");
        map.push_attribute(("TYPE", "LOGICAL"));
        writer.write_event(Event::Start(map))?;
        write_div(&mut writer, document, root, &ids, false, file_class, path)?;
        writer.write_event(Event::End(BytesEnd::new("structMap")))?;
    }
    if let Some(root) = document.physical_root() {
        let mut map = BytesStart::new("structMap");
        map.push_attribute(("TYPE", "PHYSICAL"));
        writer.write_event(Event::Start(map))?;
        write_div(&mut writer, document, root, &ids, true, file_class, path)?;
        writer.write_event(Event::End(BytesEnd::new("structMap")))?;
    }

    // Cross-tree links, every edge once, source order.
    writer.write_event(Event::Start(BytesStart::new("structLink")))?;
    for root in [document.logical_root(), document.physical_root()]
        .into_iter()
        .flatten()
    {
        for node in document.descendants(root) {
            for reference in document.node(node).refs_to() {
                let (Some(from), Some(to)) =
                    (ids.get(&reference.source), ids.get(&reference.target))
                else {
                    continue;
                };
                let mut link = BytesStart::new("smLink");
                link.push_attribute(("from", from.as_str()));
                link.push_attribute(("to", to.as_str()));
                link.push_attribute(("type", reference.kind.as_str()));
                writer.write_event(Event::Empty(link))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new("structLink")))?;

    writer.write_event(Event::End(BytesEnd::new("mets")))?;
    Ok(writer.into_inner())
}

fn write_div(
    writer: &mut Writer<Vec<u8>>,
    document: &Document,
    node: NodeId,
    ids: &HashMap<NodeId, String>,
    physical: bool,
    file_class: Option<&str>,
    path: &Path,
) -> FormatResult<()> {
    let n = document.node(node);
    let div_id = ids
        .get(&node)
        .ok_or_else(|| write_error(path, "unassigned div id"))?;

    let dmd_id = format!("DMD_{}", div_id);
    let adm_id = n.tech_md_refs().join(" ");
    let mut div = BytesStart::new("div");
    div.push_attribute(("ID", div_id.as_str()));
    div.push_attribute(("TYPE", n.type_name()));
    if node_has_payload(document, node) {
        div.push_attribute(("DMDID", dmd_id.as_str()));
    }
    if let Some(identifier) = n.identifier() {
        div.push_attribute(("CONTENTIDS", identifier));
    }
    if let Some(anchor) = n.reference_to_anchor() {
        div.push_attribute(("ANCHOR", anchor));
    }
    if !adm_id.is_empty() {
        div.push_attribute(("ADMID", adm_id.as_str()));
    }
    writer.write_event(Event::Start(div))?;

    // Pointer elements when writing one anchor unit of a larger document.
    if let Some(class) = file_class {
        let downward = document.must_write_downward_pointer(node, class);
        let upward = document.must_write_upward_pointer(node, class)?;
        if downward || upward {
            if let Some(href) = pointer_target(document, node) {
                let mut mptr = BytesStart::new("mptr");
                mptr.push_attribute(("LOCTYPE", "URL"));
                mptr.push_attribute(("href", href.as_str()));
                writer.write_event(Event::Empty(mptr))?;
            }
        }
    }

    if physical {
        for content_ref in n.content_refs() {
            let file_ref = file_id(content_ref.file.index());
            let mut fptr = BytesStart::new("fptr");
            fptr.push_attribute(("FILEID", file_ref.as_str()));
            if let Some(area) = &content_ref.area {
                push_area_attributes(&mut fptr, area);
            }
            writer.write_event(Event::Empty(fptr))?;
        }
    }

    for &child in n.children() {
        write_div(writer, document, child, ids, physical, file_class, path)?;
    }

    writer.write_event(Event::End(BytesEnd::new("div")))?;
    Ok(())
}

/// Target of a pointer element: a pointer metadata value, or the node's
/// anchor reference
fn pointer_target(document: &Document, node: NodeId) -> Option<String> {
    let n = document.node(node);
    n.metadata_by_type(crate::model::MPTR_ELEMENT_TYPE)
        .first()
        .and_then(|md| md.value())
        .map(str::to_string)
        .or_else(|| n.reference_to_anchor().map(str::to_string))
}

//
// Reading
//

enum ParsedEntry {
    Value(ValueEntry),
    Person(PersonEntry),
    Group(MetadataGroup),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MapKind {
    None,
    Logical,
    Physical,
}

fn parse_mets(content: &str, ruleset: &RuleSet, path: &Path) -> FormatResult<Document> {
    let mut document = Document::new();
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // dmd payloads by section id, in document order before the struct maps.
    let mut dmd_sections: HashMap<String, Vec<ParsedEntry>> = HashMap::new();
    let mut current_dmd: Option<String> = None;

    let mut files_by_id: HashMap<String, ContentFile> = HashMap::new();
    let mut files_order: Vec<String> = Vec::new();
    let mut current_file: Option<String> = None;
    let mut div_nodes: HashMap<String, NodeId> = HashMap::new();
    let mut links: Vec<(String, String, String)> = Vec::new();
    let mut content_refs: Vec<(NodeId, String, Option<crate::model::ContentFileArea>)> =
        Vec::new();

    let mut map_kind = MapKind::None;
    let mut div_stack: Vec<NodeId> = Vec::new();
    let mut roots: Vec<(MapKind, NodeId)> = Vec::new();

    let mut in_amd = false;
    let mut current_tech_id: Option<String> = None;
    let mut saw_envelope = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| read_error(path, &e.to_string()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"mets" => saw_envelope = true,
                b"dmdSec" => {
                    current_dmd = Some(attr_req(&e, "ID", path)?);
                }
                b"amdSec" => {
                    in_amd = true;
                    document.set_amd_sec(AmdSec::new(attr_opt(&e, "ID", path)?));
                }
                b"techMD" if in_amd => {
                    current_tech_id = Some(attr_req(&e, "ID", path)?);
                }
                b"structMap" => {
                    map_kind = match attr_req(&e, "TYPE", path)?.as_str() {
                        "LOGICAL" => MapKind::Logical,
                        "PHYSICAL" => MapKind::Physical,
                        other => {
                            return Err(read_error(
                                path,
                                &format!("unknown structMap type '{}'", other),
                            ))
                        }
                    };
                }
                b"div" if map_kind != MapKind::None => {
                    let node = open_div(
                        &mut document,
                        ruleset,
                        &e,
                        &dmd_sections,
                        &div_stack,
                        path,
                    )?;
                    div_nodes.insert(attr_req(&e, "ID", path)?, node);
                    if div_stack.is_empty() {
                        roots.push((map_kind, node));
                    }
                    div_stack.push(node);
                }
                b"file" => {
                    let id = attr_req(&e, "ID", path)?;
                    let mime = attr_req(&e, "MIMETYPE", path)?;
                    let mut file = ContentFile::new("", &mime);
                    file.representative = attr_opt(&e, "USE", path)?.as_deref() == Some("banner");
                    files_order.push(id.clone());
                    files_by_id.insert(id.clone(), file);
                    current_file = Some(id);
                }
                name if name == EL_GROUP.as_bytes() && current_dmd.is_some() => {
                    let group = parse_group(&mut reader, ruleset, &e, path)?;
                    if let Some(dmd_id) = &current_dmd {
                        dmd_sections
                            .entry(dmd_id.clone())
                            .or_default()
                            .push(ParsedEntry::Group(group));
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                name if name == EL_METADATA.as_bytes() && current_dmd.is_some() => {
                    let entry = parse_value_entry(ruleset, &e, path)?;
                    if let Some(dmd_id) = &current_dmd {
                        dmd_sections
                            .entry(dmd_id.clone())
                            .or_default()
                            .push(ParsedEntry::Value(entry));
                    }
                }
                name if name == EL_PERSON.as_bytes() && current_dmd.is_some() => {
                    let person = parse_person_entry(ruleset, &e, path)?;
                    if let Some(dmd_id) = &current_dmd {
                        dmd_sections
                            .entry(dmd_id.clone())
                            .or_default()
                            .push(ParsedEntry::Person(person));
                    }
                }
                b"FLocat" => {
                    let href = attr_req(&e, "href", path)?;
                    if let Some(file) = current_file
                        .as_ref()
                        .and_then(|id| files_by_id.get_mut(id))
                    {
                        file.location = href;
                    }
                }
                b"fileGrp" => {
                    let group = crate::model::VirtualFileGroup {
                        name: attr_req(&e, "USE", path)?,
                        path_to_files: attr_opt(&e, "PATH", path)?.unwrap_or_default(),
                        mime_type: attr_opt(&e, "MIMETYPE", path)?.unwrap_or_default(),
                        file_suffix: attr_opt(&e, "FILESUFFIX", path)?.unwrap_or_default(),
                        id_suffix: attr_opt(&e, "IDSUFFIX", path)?.unwrap_or_default(),
                    };
                    document.file_set_mut().add_virtual_group(group);
                }
                b"fptr" => {
                    let file_ref = attr_req(&e, "FILEID", path)?;
                    let area = parse_area(&e, path)?;
                    let node = *div_stack.last().ok_or_else(|| {
                        read_error(path, "fptr outside of a structure div")
                    })?;
                    content_refs.push((node, file_ref, area));
                }
                b"smLink" => {
                    links.push((
                        attr_req(&e, "from", path)?,
                        attr_req(&e, "to", path)?,
                        attr_req(&e, "type", path)?,
                    ));
                }
                b"div" if map_kind != MapKind::None => {
                    let node = open_div(
                        &mut document,
                        ruleset,
                        &e,
                        &dmd_sections,
                        &div_stack,
                        path,
                    )?;
                    div_nodes.insert(attr_req(&e, "ID", path)?, node);
                    if div_stack.is_empty() {
                        roots.push((map_kind, node));
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if let Some(tech_id) = current_tech_id.take() {
                    let fragment = text
                        .unescape()
                        .map_err(|e| read_error(path, &e.to_string()))?;
                    document.add_tech_md(TechMd::new(&tech_id, &fragment));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"dmdSec" => current_dmd = None,
                b"amdSec" => in_amd = false,
                b"techMD" => current_tech_id = None,
                b"file" => current_file = None,
                b"structMap" => map_kind = MapKind::None,
                b"div" if map_kind != MapKind::None => {
                    div_stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_envelope {
        return Err(read_error(path, "no mets envelope found"));
    }

    // Restore the file set in file-section order, then the node links.
    if !files_order.is_empty() {
        for id in &files_order {
            if let Some(file) = files_by_id.get(id) {
                document.file_set_mut().add_file(file.clone());
            }
        }
    }
    for (node, file_ref, area) in content_refs {
        let file = files_by_id.get(&file_ref).ok_or_else(|| {
            read_error(path, &format!("fptr references unknown file '{}'", file_ref))
        })?;
        document.add_content_file(node, file.clone(), area);
    }

    for (kind, root) in roots {
        match kind {
            MapKind::Logical => document.set_logical_root(root),
            MapKind::Physical => document.set_physical_root(root),
            MapKind::None => {}
        }
    }

    for (from, to, kind) in links {
        let (Some(&source), Some(&target)) = (div_nodes.get(&from), div_nodes.get(&to)) else {
            return Err(read_error(
                path,
                &format!("structLink references unknown div '{}' or '{}'", from, to),
            ));
        };
        document.add_reference_to(source, target, &kind);
    }

    Ok(document)
}

/// Creates the node for a structure div, applies its descriptive metadata
/// and attaches it to the enclosing div
fn open_div(
    document: &mut Document,
    ruleset: &RuleSet,
    element: &BytesStart<'_>,
    dmd_sections: &HashMap<String, Vec<ParsedEntry>>,
    div_stack: &[NodeId],
    path: &Path,
) -> FormatResult<NodeId> {
    let type_name = attr_req(element, "TYPE", path)?;
    let struct_type = ruleset.struct_type(&type_name).ok_or_else(|| {
        FormatError::Model(crate::error::ModelError::Preferences(format!(
            "struct type '{}' is not declared in the rule set",
            type_name
        )))
    })?;

    let node = document.create_struct_node(struct_type);
    if let Some(identifier) = attr_opt(element, "CONTENTIDS", path)? {
        document.node_mut(node).set_identifier(&identifier);
    }
    if let Some(anchor) = attr_opt(element, "ANCHOR", path)? {
        document.node_mut(node).set_reference_to_anchor(&anchor);
    }
    if let Some(admid) = attr_opt(element, "ADMID", path)? {
        for id in admid.split_whitespace() {
            document.node_mut(node).add_tech_md_ref(id);
        }
    }

    if let Some(dmd_id) = attr_opt(element, "DMDID", path)? {
        if let Some(entries) = dmd_sections.get(&dmd_id) {
            for entry in entries {
                match entry {
                    ParsedEntry::Value(value) => {
                        document.node_mut(node).add_metadata(value.clone())?
                    }
                    ParsedEntry::Person(person) => {
                        document.node_mut(node).add_person(person.clone())?
                    }
                    ParsedEntry::Group(group) => {
                        document.node_mut(node).add_metadata_group(group.clone())?
                    }
                }
            }
        }
    }

    if let Some(&parent) = div_stack.last() {
        document.add_child(parent, node, None)?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentFileArea, PersonEntry, LOGICAL_PHYSICAL};
    use crate::ruleset::{Cardinality, MetadataDecl, MetadataType, StructType};
    use tempfile::TempDir;

    fn make_ruleset() -> Arc<RuleSet> {
        let mut rs = RuleSet::new();
        let title = rs.add_metadata_type(MetadataType::new("TitleDocMain"));
        let author = rs.add_metadata_type(MetadataType {
            name: "Author".to_string(),
            labels: Default::default(),
            is_person: true,
            is_identifier: false,
        });
        let page_no = rs.add_metadata_type(MetadataType::new("physPageNumber"));

        let mut mono = StructType::new("Monograph");
        mono.allowed_children.push("Chapter".to_string());
        mono.metadata.push(MetadataDecl {
            md_type: Arc::clone(&title),
            cardinality: Cardinality::ExactlyOne,
            default_display: true,
        });
        mono.metadata.push(MetadataDecl {
            md_type: author,
            cardinality: Cardinality::ZeroOrMore,
            default_display: false,
        });
        rs.add_struct_type(mono);

        let mut chapter = StructType::new("Chapter");
        chapter.metadata.push(MetadataDecl {
            md_type: title,
            cardinality: Cardinality::ZeroOrOne,
            default_display: false,
        });
        rs.add_struct_type(chapter);

        let mut bound = StructType::new("BoundBook");
        bound.allowed_children.push("Page".to_string());
        rs.add_struct_type(bound);

        let mut page = StructType::new("Page");
        page.metadata.push(MetadataDecl {
            md_type: page_no,
            cardinality: Cardinality::ZeroOrOne,
            default_display: false,
        });
        rs.add_struct_type(page);

        Arc::new(rs)
    }

    fn make_document(rs: &RuleSet) -> Document {
        let mut doc = Document::new();
        let root = doc.create_struct_node(rs.struct_type("Monograph").unwrap());
        let chapter = doc.create_struct_node(rs.struct_type("Chapter").unwrap());
        doc.add_child(root, chapter, None).unwrap();
        doc.node_mut(root)
            .add_metadata_value("TitleDocMain", "Hello")
            .unwrap();
        doc.node_mut(root)
            .add_person(PersonEntry::with_name(
                rs.metadata_type("Author").unwrap(),
                "Doe",
                "John",
            ))
            .unwrap();
        doc.set_logical_root(root);

        let bound = doc.create_struct_node(rs.struct_type("BoundBook").unwrap());
        let page = doc.create_struct_node(rs.struct_type("Page").unwrap());
        doc.add_child(bound, page, None).unwrap();
        doc.node_mut(page)
            .add_metadata_value("physPageNumber", "1")
            .unwrap();
        doc.set_physical_root(bound);

        doc.add_content_file(
            page,
            ContentFile::new("images/00000001.tif", "image/tiff"),
            Some(ContentFileArea {
                kind: "coordinates".to_string(),
                begin: Some("0,0".to_string()),
                end: None,
            }),
        );
        doc.add_reference_to(chapter, page, LOGICAL_PHYSICAL);
        doc.add_tech_md(TechMd::new("TMD_0001", "<mix:mix/>"));
        doc
    }

    #[test]
    fn test_mets_round_trip_is_equal() {
        let rs = make_ruleset();
        let doc = make_document(&rs);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.xml");

        let mut out = MetsFormat::new(Arc::clone(&rs));
        out.set_document(doc);
        assert!(out.write(&path).unwrap());

        let mut back = MetsFormat::new(rs);
        assert!(back.read(&path).unwrap());

        assert!(out.document().unwrap().deep_equals(back.document().unwrap()));
        // Administrative fragments survive verbatim.
        let amd = back.document().unwrap().amd_sec().unwrap();
        assert_eq!(amd.tech_md("TMD_0001").unwrap().fragment, "<mix:mix/>");
    }

    #[test]
    fn test_mets_write_is_deterministic() {
        let rs = make_ruleset();
        let doc = make_document(&rs);
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.xml");
        let b = dir.path().join("b.xml");

        let mut fmt = MetsFormat::new(rs);
        fmt.set_document(doc);
        fmt.write(&a).unwrap();
        fmt.write(&b).unwrap();

        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn test_anchor_file_truncates_and_points_downward() {
        let mut rs = RuleSet::new();
        let title = rs.add_metadata_type(MetadataType::new("TitleDocMain"));
        let mptr = rs.add_metadata_type(MetadataType::new(crate::model::MPTR_ELEMENT_TYPE));

        let mut journal = StructType::new("Journal");
        journal.anchor_class = Some("J".to_string());
        journal.allowed_children.push("Volume".to_string());
        journal.metadata.push(MetadataDecl {
            md_type: Arc::clone(&title),
            cardinality: Cardinality::ZeroOrOne,
            default_display: true,
        });
        rs.add_struct_type(journal);

        let mut volume = StructType::new("Volume");
        volume.allowed_children.push("Article".to_string());
        volume.metadata.push(MetadataDecl {
            md_type: mptr,
            cardinality: Cardinality::ZeroOrOne,
            default_display: false,
        });
        rs.add_struct_type(volume);
        rs.add_struct_type(StructType::new("Article"));
        let rs = Arc::new(rs);

        let mut doc = Document::new();
        let journal = doc.create_struct_node(rs.struct_type("Journal").unwrap());
        let volume = doc.create_struct_node(rs.struct_type("Volume").unwrap());
        let article = doc.create_struct_node(rs.struct_type("Article").unwrap());
        doc.add_child(journal, volume, None).unwrap();
        doc.add_child(volume, article, None).unwrap();
        doc.node_mut(journal)
            .add_metadata_value("TitleDocMain", "A Journal")
            .unwrap();
        doc.node_mut(volume)
            .add_metadata_value(crate::model::MPTR_ELEMENT_TYPE, "meta.xml")
            .unwrap();
        doc.set_logical_root(journal);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta_anchor.xml");
        let mut fmt = MetsFormat::new(rs);
        fmt.set_document(doc);
        assert!(fmt.write_anchor_file(&path, "J").unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        // The anchor unit keeps Journal and the Volume stub, drops Article,
        // and points downward at the main file.
        assert!(content.contains(r#"TYPE="Journal""#));
        assert!(content.contains(r#"TYPE="Volume""#));
        assert!(!content.contains(r#"TYPE="Article""#));
        assert!(content.contains(r#"<mptr LOCTYPE="URL" href="meta.xml"/>"#));
        // The full title travels with the anchor unit.
        assert!(content.contains(r#"value="A Journal""#));
    }

    #[test]
    fn test_read_missing_file() {
        let rs = make_ruleset();
        let mut fmt = MetsFormat::new(rs);
        assert!(matches!(
            fmt.read(Path::new("/nonexistent/meta.xml")),
            Err(FormatError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_read_unknown_struct_type_is_ruleset_violation() {
        let rs = make_ruleset();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<mets>
  <structMap TYPE="LOGICAL">
    <div ID="LOG_0001" TYPE="Pamphlet"/>
  </structMap>
</mets>"#,
        )
        .unwrap();

        let mut fmt = MetsFormat::new(rs);
        assert!(matches!(
            fmt.read(&path),
            Err(FormatError::Model(crate::error::ModelError::Preferences(_)))
        ));
    }
}
