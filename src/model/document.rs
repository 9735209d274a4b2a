// src/model/document.rs

//! The digital document
//!
//! A [`Document`] owns every struct node of both trees in a flat arena,
//! plus the file set and the administrative-metadata section. Nodes address
//! each other by [`NodeId`]; all operations touching more than one node
//! (children, cross-references, content files) live here so that paired
//! state is always mutated together.
//!
//! Deep equality between two documents survives the cycles that
//! cross-references introduce: each traversal direction keeps a visited set
//! of node-handle pairs and treats a revisited pair as already verified.

use crate::error::{ModelError, Result};
use crate::ruleset::{RuleSet, StructType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::amd::{AmdSec, TechMd};
use super::files::{ContentFile, ContentFileArea, ContentFileRef, FileId, FileSet};
use super::node::{NodeId, StructNode, FOREIGN_STUB_METADATA_TYPES, MPTR_ELEMENT_TYPE};
use super::reference::Reference;

/// A digital document: two structure trees, a file set, and optionally an
/// administrative-metadata section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<StructNode>,
    logical_root: Option<NodeId>,
    physical_root: Option<NodeId>,
    file_set: Option<FileSet>,
    /// Excluded from the deep-copy buffer; re-attached after copying
    #[serde(skip)]
    amd_sec: Option<AmdSec>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    //
    // Node factory and access
    //

    /// Creates a fresh, detached node of the given type in this document
    pub fn create_struct_node(&mut self, struct_type: Arc<StructType>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StructNode::new(id, Some(struct_type)));
        id
    }

    /// Creates a fresh node without a type; most operations on it fail with
    /// `NoType` until one is set
    pub fn create_untyped_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StructNode::new(id, None));
        id
    }

    pub fn node(&self, id: NodeId) -> &StructNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut StructNode {
        &mut self.nodes[id.0]
    }

    /// Checked node lookup for handles of unknown provenance
    pub fn try_node(&self, id: NodeId) -> Result<&StructNode> {
        self.nodes.get(id.0).ok_or(ModelError::UnknownNode(id.0))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    //
    // Roots
    //

    pub fn logical_root(&self) -> Option<NodeId> {
        self.logical_root
    }

    pub fn physical_root(&self) -> Option<NodeId> {
        self.physical_root
    }

    /// Sets the logical root and marks the whole subtree as logical.
    /// A previous root's subtree is unmarked first.
    pub fn set_logical_root(&mut self, root: NodeId) {
        if let Some(old) = self.logical_root {
            self.set_logical_flag(old, false);
        }
        self.logical_root = Some(root);
        self.set_logical_flag(root, true);
    }

    /// Sets the physical root and marks the whole subtree as physical
    pub fn set_physical_root(&mut self, root: NodeId) {
        if let Some(old) = self.physical_root {
            self.set_physical_flag(old, false);
        }
        self.physical_root = Some(root);
        self.set_physical_flag(root, true);
    }

    /// Detaches the logical tree, unmarking its nodes
    pub fn clear_logical_root(&mut self) {
        if let Some(old) = self.logical_root.take() {
            self.set_logical_flag(old, false);
        }
    }

    /// Detaches the physical tree, unmarking its nodes
    pub fn clear_physical_root(&mut self) {
        if let Some(old) = self.physical_root.take() {
            self.set_physical_flag(old, false);
        }
    }

    fn set_logical_flag(&mut self, node: NodeId, value: bool) {
        self.nodes[node.0].logical = value;
        let children = self.nodes[node.0].children.clone();
        for child in children {
            self.set_logical_flag(child, value);
        }
    }

    fn set_physical_flag(&mut self, node: NodeId, value: bool) {
        self.nodes[node.0].physical = value;
        let children = self.nodes[node.0].children.clone();
        for child in children {
            self.set_physical_flag(child, value);
        }
    }

    //
    // Tree mutation
    //

    /// Attaches `child` under `parent`, at `index` or at the end.
    ///
    /// The child's type must be listed as allowed on the parent's type. A
    /// child attached elsewhere is detached from its previous parent first;
    /// the parent's logical/physical state propagates to the whole attached
    /// subtree.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<()> {
        let parent_type = self
            .node(parent)
            .struct_type()
            .ok_or(ModelError::NoType)?
            .clone();
        let child_type_name = match self.node(child).struct_type() {
            Some(t) => t.name.clone(),
            None => {
                tracing::warn!("child node without a struct type");
                return Err(ModelError::NoType);
            }
        };

        if !parent_type.allows_child(&child_type_name) {
            tracing::debug!(
                "struct type '{}' not allowed as child of '{}'",
                child_type_name,
                parent_type.name
            );
            return Err(ModelError::TypeNotAllowedAsChild {
                child_type: child_type_name,
                parent_type: parent_type.name.clone(),
            });
        }

        // Detach from a previous parent, if any.
        if let Some(previous) = self.node(child).parent() {
            self.remove_child(previous, child);
        }

        let position = index
            .unwrap_or(self.nodes[parent.0].children.len())
            .min(self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);

        if self.node(parent).is_logical() {
            self.set_logical_flag(child, true);
        }
        if self.node(parent).is_physical() {
            self.set_physical_flag(child, true);
        }

        Ok(())
    }

    /// Detaches `child` from `parent`; returns whether it was present
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return false;
        };
        children.remove(pos);
        self.nodes[child.0].parent = None;

        if self.node(parent).is_logical() {
            self.set_logical_flag(child, false);
        }
        if self.node(parent).is_physical() {
            self.set_physical_flag(child, false);
        }
        true
    }

    /// Moves `child` to `position` in the ordered child list, clamped to
    /// `[0, len]`; returns whether the child was found
    pub fn move_child(&mut self, parent: NodeId, child: NodeId, position: usize) -> bool {
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return false;
        };
        children.remove(pos);
        let clamped = position.min(children.len());
        children.insert(clamped, child);
        true
    }

    /// Position of `child` under `parent`, if attached there
    pub fn position_of_child(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent).children().iter().position(|c| *c == child)
    }

    /// Moves `child` into the slot right after `anchor` in the child list.
    /// Both must already be children of `parent`.
    pub fn move_child_after(&mut self, parent: NodeId, child: NodeId, anchor: NodeId) -> bool {
        self.move_child_relative(parent, child, anchor, 1)
    }

    /// Moves `child` into the slot right before `anchor` in the child list
    pub fn move_child_before(&mut self, parent: NodeId, child: NodeId, anchor: NodeId) -> bool {
        self.move_child_relative(parent, child, anchor, 0)
    }

    fn move_child_relative(
        &mut self,
        parent: NodeId,
        child: NodeId,
        anchor: NodeId,
        offset: usize,
    ) -> bool {
        if child == anchor {
            return false;
        }
        let children = &mut self.nodes[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return false;
        };
        children.remove(pos);
        let Some(anchor_pos) = children.iter().position(|c| *c == anchor) else {
            children.insert(pos, child);
            return false;
        };
        children.insert(anchor_pos + offset, child);
        true
    }

    /// Child following `child` in the ordered list, if any
    pub fn next_child(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let children = self.node(parent).children();
        let pos = children.iter().position(|c| *c == child)?;
        children.get(pos + 1).copied()
    }

    /// Child preceding `child` in the ordered list, if any
    pub fn previous_child(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let children = self.node(parent).children();
        let pos = children.iter().position(|c| *c == child)?;
        pos.checked_sub(1).and_then(|p| children.get(p)).copied()
    }

    /// Comma-separated child-index path from `ancestor` down to `descendant`
    /// (e.g. `"0,2"` for the third child of the first child)
    pub fn index_path_of(&self, ancestor: NodeId, descendant: NodeId) -> Option<String> {
        if ancestor == descendant {
            return Some(String::new());
        }
        for (index, &child) in self.node(ancestor).children().iter().enumerate() {
            if child == descendant {
                return Some(index.to_string());
            }
            if let Some(rest) = self.index_path_of(child, descendant) {
                if !rest.is_empty() {
                    return Some(format!("{},{}", index, rest));
                }
            }
        }
        None
    }

    /// Resolves a comma-separated child-index path from `node`
    pub fn child_at_path(&self, node: NodeId, path: &str) -> Option<NodeId> {
        let mut current = node;
        for segment in path.split(',') {
            let index: usize = segment.trim().parse().ok()?;
            current = self.node(current).children().get(index).copied()?;
        }
        Some(current)
    }

    //
    // Cross-references
    //

    /// Adds an outgoing reference `source -> target` of the given type.
    /// The edge is stored on both endpoints.
    pub fn add_reference_to(&mut self, source: NodeId, target: NodeId, kind: &str) -> Reference {
        let reference = Reference::new(kind, source, target);
        self.nodes[source.0].refs_to.push(reference.clone());
        self.nodes[target.0].refs_from.push(reference.clone());
        reference
    }

    /// Adds an incoming reference `source -> target` from the target's view
    pub fn add_reference_from(&mut self, target: NodeId, source: NodeId, kind: &str) -> Reference {
        self.add_reference_to(source, target, kind)
    }

    /// Removes all references `source -> target` from both endpoints;
    /// returns whether any edge was removed
    pub fn remove_reference_to(&mut self, source: NodeId, target: NodeId) -> bool {
        let before = self.nodes[source.0].refs_to.len();
        self.nodes[source.0]
            .refs_to
            .retain(|r| r.target != target);
        self.nodes[target.0]
            .refs_from
            .retain(|r| r.source != source);
        before != self.nodes[source.0].refs_to.len()
    }

    /// Removes all references `source -> target` from the target's view
    pub fn remove_reference_from(&mut self, target: NodeId, source: NodeId) -> bool {
        self.remove_reference_to(source, target)
    }

    //
    // Content files
    //

    pub fn file_set(&self) -> Option<&FileSet> {
        self.file_set.as_ref()
    }

    pub fn file_set_mut(&mut self) -> &mut FileSet {
        self.file_set.get_or_insert_with(FileSet::new)
    }

    pub fn set_file_set(&mut self, file_set: FileSet) {
        self.file_set = Some(file_set);
    }

    /// Links a content file to `node`. The file is added to the document's
    /// file set (created on demand, set semantics); the node records a
    /// reference with the optional area, and the file records the node.
    pub fn add_content_file(
        &mut self,
        node: NodeId,
        file: ContentFile,
        area: Option<ContentFileArea>,
    ) -> FileId {
        let file_id = self.file_set_mut().add_file(file);
        self.nodes[node.0].content_refs.push(ContentFileRef {
            file: file_id,
            area,
        });
        if let Some(stored) = self.file_set_mut().file_mut(file_id) {
            stored.register_node(node);
        }
        file_id
    }

    /// Removes every reference from `node` to the file at `location`
    pub fn remove_content_file(&mut self, node: NodeId, location: &str) -> Result<()> {
        let file_id = self
            .file_set
            .as_ref()
            .and_then(|fs| fs.find_by_location(location));

        let removed = match file_id {
            Some(id) => {
                let refs = &mut self.nodes[node.0].content_refs;
                let before = refs.len();
                refs.retain(|r| r.file != id);
                before != refs.len()
            }
            None => false,
        };

        if !removed {
            return Err(ModelError::ContentFileNotLinked {
                location: location.to_string(),
                struct_type: self.node(node).type_name().to_string(),
            });
        }

        if let (Some(fs), Some(id)) = (self.file_set.as_mut(), file_id) {
            if let Some(file) = fs.file_mut(id) {
                file.unregister_node(node);
            }
        }
        Ok(())
    }

    /// Rebuilds the file set from the physical metadata: every page (direct
    /// child of the physical root) with a `physPageNumber` gets one image
    /// file under the root's `pathimagefiles` path. Existing files are
    /// discarded; virtual file groups survive.
    ///
    /// A `_representative` value on the physical root marks the matching
    /// page's file as representative.
    pub fn add_all_content_files(&mut self) {
        let Some(root) = self.physical_root else {
            return;
        };

        let image_path = self
            .node(root)
            .metadata_by_type("pathimagefiles")
            .first()
            .and_then(|md| md.value())
            .unwrap_or("")
            .to_string();
        let representative = self
            .node(root)
            .metadata_by_type("_representative")
            .first()
            .and_then(|md| md.value())
            .unwrap_or("")
            .to_string();

        self.reset_file_set_keeping_groups();

        for page in self.node(root).children().to_vec() {
            let numbers: Vec<String> = self
                .node(page)
                .metadata_by_type("physPageNumber")
                .iter()
                .filter_map(|md| md.value().map(str::to_string))
                .collect();
            for number in numbers {
                let Ok(ordinal) = number.parse::<u32>() else {
                    tracing::warn!("page number '{}' is not numeric, skipped", number);
                    continue;
                };
                let mut file = ContentFile::new(
                    &format!("{}/{:08}.tif", image_path, ordinal),
                    "image/tiff",
                );
                if !representative.is_empty() && representative == number {
                    file.representative = true;
                }
                self.add_content_file(page, file, None);
            }
        }
    }

    /// Re-points every page's content file at a new image name, in page
    /// order. `images[n-1]` is the file for `physPageNumber` n.
    pub fn override_content_files(&mut self, images: &[String]) {
        let Some(root) = self.physical_root else {
            return;
        };
        let image_path = self
            .node(root)
            .metadata_by_type("pathimagefiles")
            .first()
            .and_then(|md| md.value())
            .unwrap_or("")
            .to_string();

        self.reset_file_set_keeping_groups();

        for page in self.node(root).children().to_vec() {
            let numbers: Vec<String> = self
                .node(page)
                .metadata_by_type("physPageNumber")
                .iter()
                .filter_map(|md| md.value().map(str::to_string))
                .collect();
            for number in numbers {
                let Ok(ordinal) = number.parse::<usize>() else {
                    continue;
                };
                let Some(image) = ordinal.checked_sub(1).and_then(|i| images.get(i)) else {
                    tracing::warn!("no image name for page {}", number);
                    continue;
                };
                let file = ContentFile::new(
                    &format!("{}/{}", image_path, image),
                    "image/tiff",
                );
                self.add_content_file(page, file, None);
            }
        }
    }

    /// Empties the file set but keeps the configured virtual groups
    fn reset_file_set_keeping_groups(&mut self) {
        let groups = self
            .file_set
            .take()
            .map(|fs| fs.virtual_groups().to_vec())
            .unwrap_or_default();
        let mut file_set = FileSet::new();
        for group in groups {
            file_set.add_virtual_group(group);
        }
        self.file_set = Some(file_set);
        for node in &mut self.nodes {
            node.content_refs.clear();
        }
    }

    /// Replaces every node's struct and metadata types with the rule set's
    /// current objects. Fails when a struct type is unknown there; metadata
    /// types missing from the rule set keep their deserialized objects.
    ///
    /// Needed after loading an archived document, whose embedded type
    /// objects may lag behind the rule set.
    pub fn refresh_types(&mut self, ruleset: &RuleSet) -> Result<()> {
        let ids: Vec<NodeId> = [self.logical_root, self.physical_root]
            .into_iter()
            .flatten()
            .flat_map(|root| self.descendants(root))
            .collect();

        for id in ids {
            let node = &mut self.nodes[id.0];
            if let Some(current) = node.struct_type.as_ref() {
                let updated = ruleset.struct_type(&current.name).ok_or_else(|| {
                    ModelError::Preferences(format!(
                        "struct type '{}' is not declared in the rule set",
                        current.name
                    ))
                })?;
                node.struct_type = Some(updated);
            }
            for entry in &mut node.metadata {
                if let Some(updated) = ruleset.metadata_type(entry.core.type_name()) {
                    entry.core.md_type = updated;
                }
            }
            for person in &mut node.persons {
                if let Some(updated) = ruleset.metadata_type(person.core.type_name()) {
                    person.core.md_type = updated;
                }
            }
        }
        Ok(())
    }

    /// Human-readable outline of both trees, one node per line
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for (label, root) in [
            ("logical", self.logical_root),
            ("physical", self.physical_root),
        ] {
            let Some(root) = root else {
                continue;
            };
            out.push_str(label);
            out.push('\n');
            self.outline_node(root, 1, &mut out);
        }
        out
    }

    fn outline_node(&self, node: NodeId, depth: usize, out: &mut String) {
        let n = self.node(node);
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(n.type_name());
        for md in n.metadata() {
            out.push_str(&format!("  [{}]", md));
        }
        for person in n.persons() {
            out.push_str(&format!("  [{}]", person));
        }
        out.push('\n');
        for &child in n.children() {
            self.outline_node(child, depth + 1, out);
        }
    }

    //
    // Administrative metadata
    //

    pub fn amd_sec(&self) -> Option<&AmdSec> {
        self.amd_sec.as_ref()
    }

    pub fn set_amd_sec(&mut self, amd_sec: AmdSec) {
        self.amd_sec = Some(amd_sec);
    }

    pub fn add_tech_md(&mut self, tech_md: TechMd) {
        self.amd_sec
            .get_or_insert_with(|| AmdSec::new(None))
            .add_tech_md(tech_md);
    }

    //
    // Queries
    //

    /// Direct children of `node` matching a struct type name and carrying a
    /// metadata type; `"*"` is the wildcard for either predicate
    pub fn children_by_type_and_metadata_type(
        &self,
        node: NodeId,
        struct_name: &str,
        md_name: &str,
    ) -> Vec<NodeId> {
        self.node(node)
            .children()
            .iter()
            .copied()
            .filter(|child| {
                let child_node = self.node(*child);
                let type_ok = struct_name == "*" || child_node.type_name() == struct_name;
                let md_ok = md_name == "*" || child_node.has_metadata(md_name);
                type_ok && md_ok
            })
            .collect()
    }

    /// All nodes of the given struct type, in both trees (physical first)
    pub fn all_nodes_by_type(&self, type_name: &str) -> Vec<NodeId> {
        let mut result = Vec::new();
        for root in [self.physical_root, self.logical_root].into_iter().flatten() {
            for id in self.descendants(root) {
                if self.node(id).type_name() == type_name {
                    result.push(id);
                }
            }
        }
        result
    }

    /// The node and all its descendants, preorder
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = vec![node];
        let mut index = 0;
        while index < result.len() {
            result.extend(self.node(result[index]).children().iter().copied());
            index += 1;
        }
        result
    }

    /// Root of the tree containing `node`
    pub fn top_struct(&self, node: NodeId) -> NodeId {
        match self.node(node).parent() {
            Some(parent) => self.top_struct(parent),
            None => node,
        }
    }

    /// Whether `node` consists of pointer entries only: it carries a pointer
    /// metadata entry itself, or all of its children do, without exception
    pub fn is_pointer_struct(&self, node: NodeId) -> bool {
        if self.node(node).has_metadata(MPTR_ELEMENT_TYPE) {
            return true;
        }
        let children = self.node(node).children();
        if children.is_empty() {
            return false;
        }
        children.iter().all(|child| self.is_pointer_struct(*child))
    }

    /// First descendants on each branch that change anchor class or have
    /// none, skipping pure pointer stubs
    pub fn real_successors(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let own_class = self.node(node).anchor_class();
        for &child in self.node(node).children() {
            if self.node(child).anchor_class() == own_class {
                result.extend(self.real_successors(child));
            } else if !self.is_pointer_struct(child) {
                result.push(child);
            }
        }
        result
    }

    /// Ordered chain of anchor classes used below `node`, walked level by
    /// level over real successors.
    ///
    /// Fails when one level mixes two anchor classes, or when a class
    /// reappears after the descent left it (an interrupted anchor hierarchy).
    pub fn anchor_classes(&self, node: NodeId) -> Result<Vec<String>> {
        let mut result = Vec::new();
        let Some(own_class) = self.node(node).anchor_class() else {
            return Ok(result);
        };
        result.push(own_class.to_string());

        let mut frontier = self.real_successors(node);
        while !frontier.is_empty() {
            let mut level_class: Option<String> = None;
            let mut next = Vec::new();
            for &successor in &frontier {
                if let Some(class) = self.node(successor).anchor_class() {
                    match &level_class {
                        None => level_class = Some(class.to_string()),
                        Some(seen) if seen != class => {
                            return Err(ModelError::Preferences(format!(
                                "different anchor classes at the same level: '{}' and '{}'",
                                seen, class
                            )));
                        }
                        _ => {}
                    }
                }
                next.extend(self.real_successors(successor));
            }
            if let Some(class) = level_class {
                if result.contains(&class) {
                    return Err(ModelError::Preferences(format!(
                        "interruption of anchor hierarchy: class '{}' reappears below itself",
                        class
                    )));
                }
                result.push(class);
            }
            frontier = next;
        }
        Ok(result)
    }

    /// Whether a downward pointer must be written for `file_class`: the
    /// parent belongs to that class but this node does not
    pub fn must_write_downward_pointer(&self, node: NodeId, file_class: &str) -> bool {
        let Some(parent) = self.node(node).parent() else {
            return false;
        };
        self.node(parent).anchor_class() == Some(file_class)
            && self.node(node).anchor_class() != Some(file_class)
    }

    /// Whether an upward pointer must be written for `file_class`: this
    /// node's content lives in an earlier unit of the document's anchor chain
    pub fn must_write_upward_pointer(&self, node: NodeId, file_class: &str) -> Result<bool> {
        let own_class = self.node(node).anchor_class();
        if own_class == Some(file_class) {
            return Ok(false);
        }
        let Some(parent) = self.node(node).parent() else {
            return Ok(own_class.is_some());
        };
        let parent_class = self.node(parent).anchor_class().map(str::to_string);
        let Some(parent_class) = parent_class else {
            return Ok(false);
        };
        if Some(parent_class.as_str()) == own_class {
            return Ok(false);
        }

        let chain = self.anchor_classes(self.top_struct(node))?;
        // The end-of-chain sentinel has no class; it only terminates the walk.
        for link in chain.iter().map(Some).chain(std::iter::once(None)) {
            if link.map(String::as_str) == Some(file_class) {
                return Ok(false);
            }
            if link.map(String::as_str) == Some(parent_class.as_str()) {
                return Ok(true);
            }
        }
        Ok(true)
    }

    //
    // Copies
    //

    /// Deep-copies a subtree into this document's arena; the copy is
    /// detached (no parent).
    ///
    /// `recursive` is tri-state: `Some(true)` copies all descendants,
    /// `None` copies only descendants of the same anchor class as `source`,
    /// `Some(false)` copies none. Content-file references, cross-references
    /// and administrative-metadata pointers are identity-bearing and never
    /// copied.
    pub fn copy_node(
        &mut self,
        source: NodeId,
        copy_metadata: bool,
        recursive: Option<bool>,
    ) -> NodeId {
        let src = self.node(source).clone();
        let copy_id = NodeId(self.nodes.len());
        let mut copy = StructNode::new(copy_id, src.struct_type.clone());
        copy.logical = src.logical;
        copy.physical = src.physical;
        copy.reference_to_anchor = src.reference_to_anchor.clone();

        if copy_metadata {
            copy.metadata = src.metadata.clone();
            copy.persons = src.persons.clone();
            copy.groups = src.groups.clone();
        }
        self.nodes.push(copy);

        if recursive != Some(false) {
            let own_class = src.anchor_class().map(str::to_string);
            for child in src.children {
                if recursive.is_none() {
                    let child_class = self.node(child).anchor_class().map(str::to_string);
                    if own_class.is_none() || child_class != own_class {
                        continue;
                    }
                }
                let child_copy = self.copy_node(child, copy_metadata, recursive);
                self.attach_unchecked(copy_id, child_copy);
            }
        }

        copy_id
    }

    /// Partial copy keeping the structural skeleton down to one level below
    /// the given anchor class.
    ///
    /// Nodes inside the contiguous region of that class (from `source`
    /// downward) keep their full metadata, persons and groups, minus pointer
    /// entries. The first node below the region becomes a stub carrying only
    /// pointer, label and order-label entries; an anchor-class node directly
    /// below such a stub is kept as a stub too, without its own children.
    pub fn copy_truncated(&mut self, source: NodeId, anchor_class: &str) -> NodeId {
        self.copy_truncated_inner(source, anchor_class, TruncatedState::approach_or_region(
            self.node(source).anchor_class() == Some(anchor_class),
        ))
    }

    fn copy_truncated_inner(
        &mut self,
        source: NodeId,
        anchor_class: &str,
        state: TruncatedState,
    ) -> NodeId {
        let src = self.node(source).clone();
        let copy_id = NodeId(self.nodes.len());
        let mut copy = StructNode::new(copy_id, src.struct_type.clone());
        copy.logical = src.logical;
        copy.reference_to_anchor = src.reference_to_anchor.clone();

        match state {
            TruncatedState::Region => {
                copy.metadata = src
                    .metadata
                    .iter()
                    .filter(|md| md.type_name() != MPTR_ELEMENT_TYPE)
                    .cloned()
                    .collect();
                copy.persons = src.persons.clone();
                copy.groups = src.groups.clone();
            }
            TruncatedState::Boundary | TruncatedState::ReentrantStub | TruncatedState::Approach => {
                copy.metadata = src
                    .metadata
                    .iter()
                    .filter(|md| FOREIGN_STUB_METADATA_TYPES.contains(&md.type_name()))
                    .cloned()
                    .collect();
            }
        }
        self.nodes.push(copy);

        match state {
            TruncatedState::Region | TruncatedState::Approach => {
                for child in src.children {
                    let child_in_class = self.node(child).anchor_class() == Some(anchor_class);
                    let child_state = if child_in_class {
                        TruncatedState::Region
                    } else if state == TruncatedState::Region {
                        TruncatedState::Boundary
                    } else {
                        TruncatedState::Approach
                    };
                    // Outside the region, subtrees that are nothing but
                    // pointers belong to another unit already.
                    if state == TruncatedState::Approach
                        && !child_in_class
                        && self.is_pointer_struct(child)
                    {
                        continue;
                    }
                    let child_copy = self.copy_truncated_inner(child, anchor_class, child_state);
                    self.attach_unchecked(copy_id, child_copy);
                }
            }
            TruncatedState::Boundary => {
                // One level below the region: keep only re-entrant anchor
                // nodes, as childless stubs.
                for child in src.children {
                    if self.node(child).anchor_class() == Some(anchor_class) {
                        let child_copy = self.copy_truncated_inner(
                            child,
                            anchor_class,
                            TruncatedState::ReentrantStub,
                        );
                        self.attach_unchecked(copy_id, child_copy);
                    }
                }
            }
            TruncatedState::ReentrantStub => {}
        }

        copy_id
    }

    /// Attaches a copied child without re-checking the schema; flags were
    /// already copied from the source nodes.
    fn attach_unchecked(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Deep copy through an in-memory serialization buffer. The
    /// administrative section is excluded from the buffer and re-attached.
    pub fn deep_copy(&self) -> Result<Document> {
        let buffer = serde_json::to_vec(self).map_err(|e| ModelError::Copy(e.to_string()))?;
        let mut copy: Document =
            serde_json::from_slice(&buffer).map_err(|e| ModelError::Copy(e.to_string()))?;
        copy.amd_sec = self.amd_sec.clone();
        Ok(copy)
    }

    //
    // Sorting
    //

    /// Reorders metadata and persons on every node of both trees according
    /// to the declaration order in the rule set
    pub fn sort_metadata_recursively(&mut self, ruleset: &RuleSet) {
        for root in [self.logical_root, self.physical_root].into_iter().flatten() {
            for id in self.descendants(root) {
                self.nodes[id.0].sort_metadata(ruleset);
            }
        }
    }

    /// Reorders metadata and persons on every node of both trees by type
    /// name, lexicographically
    pub fn sort_metadata_lexical_recursively(&mut self) {
        for root in [self.logical_root, self.physical_root].into_iter().flatten() {
            for id in self.descendants(root) {
                self.nodes[id.0].sort_metadata_lexical();
            }
        }
    }

    //
    // Equality
    //

    /// Structural equality of one node pair across two documents (or within
    /// one document, passed twice)
    pub fn node_equals(&self, node: NodeId, other: &Document, other_node: NodeId) -> bool {
        let mut ctx = EqualityContext::default();
        node_pair_equals(self, node, other, other_node, &mut ctx)
    }

    /// Structural equality of both trees (see [`node_pair_equals`])
    pub fn deep_equals(&self, other: &Document) -> bool {
        let mut ctx = EqualityContext::default();

        for (mine, theirs) in [
            (self.physical_root, other.physical_root),
            (self.logical_root, other.logical_root),
        ] {
            match (mine, theirs) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    if !node_pair_equals(self, a, other, b, &mut ctx) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TruncatedState {
    /// Above the region: the class has not started on this path yet
    Approach,
    /// Inside the contiguous run of the target anchor class
    Region,
    /// Direct child of the region that is not of the class itself
    Boundary,
    /// Anchor-class node directly below a boundary stub
    ReentrantStub,
}

impl TruncatedState {
    fn approach_or_region(in_class: bool) -> Self {
        if in_class {
            Self::Region
        } else {
            Self::Approach
        }
    }
}

/// Per-traversal state of a deep-equality walk: visited node-handle pairs,
/// one set per reference direction
#[derive(Debug, Default)]
pub(crate) struct EqualityContext {
    to_visited: HashSet<(usize, usize)>,
    from_visited: HashSet<(usize, usize)>,
}

/// Structural equality of two nodes from two documents.
///
/// Flags, anchor reference and struct type compare field-wise; children and
/// content-file references compare positionally; metadata, persons and
/// groups compare as multisets; references compare by type and target, with
/// the visited sets breaking reference cycles.
pub(crate) fn node_pair_equals(
    doc_a: &Document,
    a: NodeId,
    doc_b: &Document,
    b: NodeId,
    ctx: &mut EqualityContext,
) -> bool {
    let na = doc_a.node(a);
    let nb = doc_b.node(b);

    if na.logical != nb.logical || na.physical != nb.physical {
        return false;
    }
    if na.reference_to_anchor != nb.reference_to_anchor {
        return false;
    }
    if na.struct_type != nb.struct_type {
        return false;
    }

    // Size checks before any in-depth comparison.
    if na.metadata.len() != nb.metadata.len()
        || na.groups.len() != nb.groups.len()
        || na.persons.len() != nb.persons.len()
        || na.children.len() != nb.children.len()
        || na.content_refs.len() != nb.content_refs.len()
        || na.refs_to.len() != nb.refs_to.len()
        || na.refs_from.len() != nb.refs_from.len()
    {
        return false;
    }

    // Children: positional.
    for (&ca, &cb) in na.children.iter().zip(nb.children.iter()) {
        if !node_pair_equals(doc_a, ca, doc_b, cb, ctx) {
            return false;
        }
    }

    // Metadata, groups, persons: multiset containment (sizes already equal).
    for md in &na.metadata {
        if !nb.metadata.iter().any(|other| md == other) {
            return false;
        }
    }
    for group in &na.groups {
        if !nb.groups.iter().any(|other| group == other) {
            return false;
        }
    }
    for person in &na.persons {
        if !nb.persons.iter().any(|other| person == other) {
            return false;
        }
    }

    // Content-file references: positional, compared through the file sets.
    for (ra, rb) in na.content_refs.iter().zip(nb.content_refs.iter()) {
        if !content_refs_equal(doc_a, ra, doc_b, rb) {
            return false;
        }
    }

    // Incoming references: every edge needs a counterpart with equal type
    // and equal target. Register the pair first; meeting it again means the
    // cycle is closed and counts as verified.
    if !(na.refs_from.is_empty() && nb.refs_from.is_empty()) {
        if !ctx.from_visited.insert((a.0, b.0)) {
            return true;
        }
        for ra in &na.refs_from {
            let found = nb.refs_from.iter().any(|rb| {
                ra.kind == rb.kind && node_pair_equals(doc_a, ra.target, doc_b, rb.target, ctx)
            });
            if !found {
                ctx.from_visited.remove(&(a.0, b.0));
                return false;
            }
        }
        ctx.from_visited.remove(&(a.0, b.0));
    }

    // Outgoing references, same scheme with the other visited set.
    if !(na.refs_to.is_empty() && nb.refs_to.is_empty()) {
        if !ctx.to_visited.insert((a.0, b.0)) {
            return true;
        }
        for ra in &na.refs_to {
            let found = nb.refs_to.iter().any(|rb| {
                ra.kind == rb.kind && node_pair_equals(doc_a, ra.target, doc_b, rb.target, ctx)
            });
            if !found {
                ctx.to_visited.remove(&(a.0, b.0));
                return false;
            }
        }
        ctx.to_visited.remove(&(a.0, b.0));
    }

    true
}

fn content_refs_equal(
    doc_a: &Document,
    ra: &ContentFileRef,
    doc_b: &Document,
    rb: &ContentFileRef,
) -> bool {
    if ra.area != rb.area {
        return false;
    }
    let fa = doc_a.file_set().and_then(|fs| fs.file(ra.file));
    let fb = doc_b.file_set().and_then(|fs| fs.file(rb.file));
    match (fa, fb) {
        (Some(fa), Some(fb)) => {
            fa.location == fb.location
                && fa.mime_type == fb.mime_type
                && fa.representative == fb.representative
        }
        (None, None) => true,
        _ => false,
    }
}
