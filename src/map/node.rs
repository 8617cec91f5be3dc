use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::MapError;

/// The two node shapes a course hierarchy is made of.
///
/// On the wire a folder is spelled `"set"`; `"folder"` is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnitType {
    #[serde(rename = "set")]
    Folder,
    #[serde(rename = "module")]
    Module,
}

impl UnitType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "set" | "folder" => Some(Self::Folder),
            "module" => Some(Self::Module),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "set",
            Self::Module => "module",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable resource attached to a module. `url` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Normalized per-module metadata.
///
/// `None` / empty means "not observed by either channel".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_link: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Raw markup-scan hits, kept for provenance. Every url here is also in
    /// `attachments`.
    #[serde(rename = "resource_links", skip_serializing_if = "Vec::is_empty")]
    pub resource_links: Vec<Attachment>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.video_duration_ms.is_none()
            && self.video_link.is_none()
            && self.attachments.is_empty()
            && self.resource_links.is_empty()
    }

    pub fn has_video(&self) -> bool {
        self.video_duration_ms.is_some_and(|ms| ms > 0)
            || self
                .video_link
                .as_deref()
                .is_some_and(|link| !link.trim().is_empty())
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Module(Metadata),
}

/// One entry of a course hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn folder(id: impl Into<String>, title: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: NodeKind::Folder,
            children,
        }
    }

    pub fn module(id: impl Into<String>, title: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: NodeKind::Module(Metadata::default()),
            children,
        }
    }

    pub fn unit_type(&self) -> UnitType {
        match self.kind {
            NodeKind::Folder => UnitType::Folder,
            NodeKind::Module(_) => UnitType::Module,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, NodeKind::Module(_))
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match &self.kind {
            NodeKind::Module(metadata) => Some(metadata),
            NodeKind::Folder => None,
        }
    }

    /// A module whose metadata carries no observed field at all.
    pub fn is_empty_module(&self) -> bool {
        self.metadata().is_some_and(Metadata::is_empty)
    }

    pub fn attach_metadata(&mut self, metadata: Metadata) -> Result<(), MapError> {
        match &mut self.kind {
            NodeKind::Module(slot) => {
                *slot = metadata;
                Ok(())
            }
            NodeKind::Folder => Err(MapError::InvalidNodeKind {
                id: self.id.clone(),
                kind: UnitType::Folder,
            }),
        }
    }

    /// Depth-first, pre-order walk over this node and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        Preorder::new(std::slice::from_ref(self)).map(|(_, node)| node)
    }
}

/// Pre-order traversal over a list of sibling roots, yielding `(depth, node)`.
///
/// Each call to [`Preorder::new`] starts an independent walk.
#[derive(Debug, Clone)]
pub struct Preorder<'a> {
    stack: Vec<(usize, &'a Node)>,
}

impl<'a> Preorder<'a> {
    pub fn new(roots: &'a [Node]) -> Self {
        Self {
            stack: roots.iter().rev().map(|node| (0, node)).collect(),
        }
    }
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub title: String,
    pub locked: bool,
    pub hierarchy: Vec<Node>,
}

impl Course {
    pub fn new(title: impl Into<String>, hierarchy: Vec<Node>) -> Self {
        Self {
            title: title.into(),
            locked: false,
            hierarchy,
        }
    }

    /// A course the collector could not open. Never carries nodes.
    pub fn locked(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locked: true,
            hierarchy: Vec::new(),
        }
    }

    pub fn nodes(&self) -> Preorder<'_> {
        Preorder::new(&self.hierarchy)
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.nodes().map(|(_, node)| node).find(|node| node.id == id)
    }
}

/// Every course of one collection run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentForest {
    pub scanned_at: Option<DateTime<Utc>>,
    courses: Vec<Course>,
}

impl ContentForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, course: Course) -> Result<(), MapError> {
        if self.get(&course.title).is_some() {
            return Err(MapError::DuplicateCourse(course.title));
        }
        self.courses.push(course);
        Ok(())
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn get(&self, title: &str) -> Option<&Course> {
        self.courses.iter().find(|course| course.title == title)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
