// src/format/rdf.rs

//! RDF-flavoured XML adapter
//!
//! The older wire format: one `RDF/Description` envelope holding the file
//! set, both structure trees with their metadata inline, and the cross-tree
//! links. Struct elements carry the same payload encoding as the METS
//! adapter's descriptive sections; the envelopes differ.
//!
//! The administrative-metadata section has no representation in this
//! format; documents round-tripped through it come back without one.

use super::{
    attr_opt, attr_req, parse_area, parse_group, parse_person_entry, parse_value_entry,
    push_area_attributes, read_error, write_entries, write_error, FileFormat, EL_GROUP,
    EL_METADATA, EL_PERSON,
};
use crate::error::{FormatError, FormatResult};
use crate::model::{ContentFile, ContentFileArea, Document, NodeId, VirtualFileGroup};
use crate::ruleset::RuleSet;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Adapter for the RDF-flavoured metadata format
pub struct RdfFormat {
    ruleset: Arc<RuleSet>,
    document: Option<Document>,
}

impl RdfFormat {
    pub fn new(ruleset: Arc<RuleSet>) -> Self {
        Self {
            ruleset,
            document: None,
        }
    }
}

impl FileFormat for RdfFormat {
    fn read(&mut self, path: &Path) -> FormatResult<bool> {
        if !path.exists() {
            return Err(FormatError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let document = parse_rdf(&content, &self.ruleset, path)?;
        self.document = Some(document);
        tracing::debug!(target: "adapter", "read RDF file '{}'", path.display());
        Ok(true)
    }

    fn write(&self, path: &Path) -> FormatResult<bool> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| write_error(path, "no document attached"))?;
        let xml = render_rdf(document, path)?;
        std::fs::write(path, xml)?;
        tracing::debug!(target: "adapter", "wrote RDF file '{}'", path.display());
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

fn div_ids(document: &Document) -> HashMap<NodeId, String> {
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

fn render_rdf(document: &Document, path: &Path) -> FormatResult<Vec<u8>> {
    let ids = div_ids(document);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut rdf = BytesStart::new("RDF:RDF");
    rdf.push_attribute(("xmlns:RDF", RDF_NAMESPACE));
    writer.write_event(Event::Start(rdf))?;
    writer.write_event(Event::Start(BytesStart::new("RDF:Description")))?;

    // File set first, so struct file references resolve on a single pass.
    if let Some(file_set) = document.file_set() {
        if !file_set.is_empty() || !file_set.virtual_groups().is_empty() {
            writer.write_event(Event::Start(BytesStart::new("fileset")))?;
            for (id, file) in file_set.files() {
                let id_string = file_id(id.index());
                let mut elem = BytesStart::new("file");
                elem.push_attribute(("id", id_string.as_str()));
                elem.push_attribute(("location", file.location.as_str()));
                elem.push_attribute(("mimeType", file.mime_type.as_str()));
                if file.representative {
                    elem.push_attribute(("representative", "true"));
                }
                writer.write_event(Event::Empty(elem))?;
            }
            for group in file_set.virtual_groups() {
                let mut elem = BytesStart::new("filegroup");
                elem.push_attribute(("name", group.name.as_str()));
                elem.push_attribute(("path", group.path_to_files.as_str()));
                elem.push_attribute(("mimeType", group.mime_type.as_str()));
                elem.push_attribute(("fileSuffix", group.file_suffix.as_str()));
                elem.push_attribute(("idSuffix", group.id_suffix.as_str()));
                writer.write_event(Event::Empty(elem))?;
            }
            writer.write_event(Event::End(BytesEnd::new("fileset")))?;
        }
    }

    if let Some(root) = document.logical_root() {
        writer.write_event(Event::Start(BytesStart::new("logical")))?;
        write_struct(&mut writer, document, root, &ids, path)?;
        writer.write_event(Event::End(BytesEnd::new("logical")))?;
    }
    if let Some(root) = document.physical_root() {
        writer.write_event(Event::Start(BytesStart::new("physical")))?;
        write_struct(&mut writer, document, root, &ids, path)?;
        writer.write_event(Event::End(BytesEnd::new("physical")))?;
    }

    writer.write_event(Event::Start(BytesStart::new("links")))?;
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
                let mut link = BytesStart::new("link");
                link.push_attribute(("from", from.as_str()));
                link.push_attribute(("to", to.as_str()));
                link.push_attribute(("type", reference.kind.as_str()));
                writer.write_event(Event::Empty(link))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new("links")))?;

    writer.write_event(Event::End(BytesEnd::new("RDF:Description")))?;
    writer.write_event(Event::End(BytesEnd::new("RDF:RDF")))?;
    Ok(writer.into_inner())
}

fn write_struct(
    writer: &mut Writer<Vec<u8>>,
    document: &Document,
    node: NodeId,
    ids: &HashMap<NodeId, String>,
    path: &Path,
) -> FormatResult<()> {
    let n = document.node(node);
    let id = ids
        .get(&node)
        .ok_or_else(|| write_error(path, "unassigned structure id"))?;

    let mut elem = BytesStart::new("struct");
    elem.push_attribute(("id", id.as_str()));
    elem.push_attribute(("type", n.type_name()));
    if let Some(identifier) = n.identifier() {
        elem.push_attribute(("identifier", identifier));
    }
    if let Some(anchor) = n.reference_to_anchor() {
        elem.push_attribute(("anchor", anchor));
    }
    writer.write_event(Event::Start(elem))?;

    write_entries(writer, n)?;

    for content_ref in n.content_refs() {
        let file_ref = file_id(content_ref.file.index());
        let mut fileref = BytesStart::new("fileref");
        fileref.push_attribute(("file", file_ref.as_str()));
        if let Some(area) = &content_ref.area {
            push_area_attributes(&mut fileref, area);
        }
        writer.write_event(Event::Empty(fileref))?;
    }

    for &child in n.children() {
        write_struct(writer, document, child, ids, path)?;
    }

    writer.write_event(Event::End(BytesEnd::new("struct")))?;
    Ok(())
}

//
// Reading
//

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tree {
    None,
    Logical,
    Physical,
}

fn parse_rdf(content: &str, ruleset: &RuleSet, path: &Path) -> FormatResult<Document> {
    let mut document = Document::new();
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut files: HashMap<String, ContentFile> = HashMap::new();
    let mut tree = Tree::None;
    let mut stack: Vec<NodeId> = Vec::new();
    let mut roots: Vec<(Tree, NodeId)> = Vec::new();
    let mut nodes_by_id: HashMap<String, NodeId> = HashMap::new();
    let mut links: Vec<(String, String, String)> = Vec::new();
    let mut saw_envelope = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| read_error(path, &e.to_string()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"RDF:RDF" => saw_envelope = true,
                b"logical" => tree = Tree::Logical,
                b"physical" => tree = Tree::Physical,
                b"struct" if tree != Tree::None => {
                    let node = open_struct(&mut document, ruleset, &e, &stack, path)?;
                    nodes_by_id.insert(attr_req(&e, "id", path)?, node);
                    if stack.is_empty() {
                        roots.push((tree, node));
                    }
                    stack.push(node);
                }
                name if name == EL_GROUP.as_bytes() && !stack.is_empty() => {
                    let group = parse_group(&mut reader, ruleset, &e, path)?;
                    if let Some(&node) = stack.last() {
                        document.node_mut(node).add_metadata_group(group)?;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"file" => {
                    let id = attr_req(&e, "id", path)?;
                    let mut file = ContentFile::new(
                        &attr_req(&e, "location", path)?,
                        &attr_req(&e, "mimeType", path)?,
                    );
                    file.representative =
                        attr_opt(&e, "representative", path)?.as_deref() == Some("true");
                    document.file_set_mut().add_file(file.clone());
                    files.insert(id, file);
                }
                b"filegroup" => {
                    let group = VirtualFileGroup {
                        name: attr_req(&e, "name", path)?,
                        path_to_files: attr_opt(&e, "path", path)?.unwrap_or_default(),
                        mime_type: attr_opt(&e, "mimeType", path)?.unwrap_or_default(),
                        file_suffix: attr_opt(&e, "fileSuffix", path)?.unwrap_or_default(),
                        id_suffix: attr_opt(&e, "idSuffix", path)?.unwrap_or_default(),
                    };
                    document.file_set_mut().add_virtual_group(group);
                }
                b"fileref" => {
                    let file_ref = attr_req(&e, "file", path)?;
                    let file = files.get(&file_ref).ok_or_else(|| {
                        read_error(
                            path,
                            &format!("fileref references unknown file '{}'", file_ref),
                        )
                    })?;
                    let area: Option<ContentFileArea> = parse_area(&e, path)?;
                    let node = *stack.last().ok_or_else(|| {
                        read_error(path, "fileref outside of a struct element")
                    })?;
                    document.add_content_file(node, file.clone(), area);
                }
                b"link" => {
                    links.push((
                        attr_req(&e, "from", path)?,
                        attr_req(&e, "to", path)?,
                        attr_req(&e, "type", path)?,
                    ));
                }
                b"struct" if tree != Tree::None => {
                    let node = open_struct(&mut document, ruleset, &e, &stack, path)?;
                    nodes_by_id.insert(attr_req(&e, "id", path)?, node);
                    if stack.is_empty() {
                        roots.push((tree, node));
                    }
                }
                name if name == EL_METADATA.as_bytes() && !stack.is_empty() => {
                    let entry = parse_value_entry(ruleset, &e, path)?;
                    if let Some(&node) = stack.last() {
                        document.node_mut(node).add_metadata(entry)?;
                    }
                }
                name if name == EL_PERSON.as_bytes() && !stack.is_empty() => {
                    let person = parse_person_entry(ruleset, &e, path)?;
                    if let Some(&node) = stack.last() {
                        document.node_mut(node).add_person(person)?;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"logical" | b"physical" => tree = Tree::None,
                b"struct" if tree != Tree::None => {
                    stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_envelope {
        return Err(read_error(path, "no RDF envelope found"));
    }

    for (kind, root) in roots {
        match kind {
            Tree::Logical => document.set_logical_root(root),
            Tree::Physical => document.set_physical_root(root),
            Tree::None => {}
        }
    }

    for (from, to, kind) in links {
        let (Some(&source), Some(&target)) = (nodes_by_id.get(&from), nodes_by_id.get(&to))
        else {
            return Err(read_error(
                path,
                &format!("link references unknown struct '{}' or '{}'", from, to),
            ));
        };
        document.add_reference_to(source, target, &kind);
    }

    Ok(document)
}

fn open_struct(
    document: &mut Document,
    ruleset: &RuleSet,
    element: &BytesStart<'_>,
    stack: &[NodeId],
    path: &Path,
) -> FormatResult<NodeId> {
    let type_name = attr_req(element, "type", path)?;
    let struct_type = ruleset.struct_type(&type_name).ok_or_else(|| {
        FormatError::Model(crate::error::ModelError::Preferences(format!(
            "struct type '{}' is not declared in the rule set",
            type_name
        )))
    })?;

    let node = document.create_struct_node(struct_type);
    if let Some(identifier) = attr_opt(element, "identifier", path)? {
        document.node_mut(node).set_identifier(&identifier);
    }
    if let Some(anchor) = attr_opt(element, "anchor", path)? {
        document.node_mut(node).set_reference_to_anchor(&anchor);
    }
    if let Some(&parent) = stack.last() {
        document.add_child(parent, node, None)?;
    }
    Ok(node)
}
