// src/model/files.rs

//! Content files and their grouping
//!
//! A [`ContentFile`] points at one file on disk (image, text, ...). The
//! document-level [`FileSet`] owns all content files; struct nodes reference
//! them through [`ContentFileRef`] entries holding a [`FileId`] handle plus
//! an optional area within the file. Files register their referencing nodes
//! as weak back-references by node handle.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Handle of a content file within its document's file set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FileId(pub(crate) usize);

impl FileId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A reference to one file on the file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    pub location: String,
    pub mime_type: String,
    /// Marks the file representing the whole document (e.g. a title image)
    #[serde(default)]
    pub representative: bool,
    /// Nodes referencing this file
    #[serde(default)]
    pub(crate) back_refs: Vec<NodeId>,
}

impl ContentFile {
    pub fn new(location: &str, mime_type: &str) -> Self {
        Self {
            location: location.to_string(),
            mime_type: mime_type.to_string(),
            representative: false,
            back_refs: Vec::new(),
        }
    }

    /// Nodes currently referencing this file
    pub fn referencing_nodes(&self) -> &[NodeId] {
        &self.back_refs
    }

    pub(crate) fn register_node(&mut self, node: NodeId) {
        if !self.back_refs.contains(&node) {
            self.back_refs.push(node);
        }
    }

    pub(crate) fn unregister_node(&mut self, node: NodeId) {
        self.back_refs.retain(|n| *n != node);
    }
}

/// A selected area within a content file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFileArea {
    /// How the coordinates are expressed, e.g. "coordinates" or "byteoffset"
    pub kind: String,
    pub begin: Option<String>,
    pub end: Option<String>,
}

/// A node's link to a content file, with an optional area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFileRef {
    pub file: FileId,
    pub area: Option<ContentFileArea>,
}

/// A named group of files forming one delivery variant (e.g. thumbnails)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFileGroup {
    pub name: String,
    pub path_to_files: String,
    pub mime_type: String,
    pub file_suffix: String,
    pub id_suffix: String,
}

impl VirtualFileGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// The set of all content files of a document
///
/// Inclusion is by content identity: adding a file whose location is already
/// present returns the existing handle instead of inserting a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    files: Vec<ContentFile>,
    virtual_groups: Vec<VirtualFileGroup>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, or returns the handle of the already-present equal file
    pub fn add_file(&mut self, file: ContentFile) -> FileId {
        if let Some(pos) = self.files.iter().position(|f| f.location == file.location) {
            return FileId(pos);
        }
        self.files.push(file);
        FileId(self.files.len() - 1)
    }

    pub fn file(&self, id: FileId) -> Option<&ContentFile> {
        self.files.get(id.0)
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> Option<&mut ContentFile> {
        self.files.get_mut(id.0)
    }

    /// Handle of the file stored at `location`, if present
    pub fn find_by_location(&self, location: &str) -> Option<FileId> {
        self.files
            .iter()
            .position(|f| f.location == location)
            .map(FileId)
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &ContentFile)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn add_virtual_group(&mut self, group: VirtualFileGroup) {
        self.virtual_groups.push(group);
    }

    pub fn virtual_groups(&self) -> &[VirtualFileGroup] {
        &self.virtual_groups
    }
}
