//! Incremental assembly of course hierarchies.
//!
//! A collector walks the remote course one module at a time and reports what it
//! saw through [`TreeBuilder::attach_metadata`]. The builder owns the skeleton,
//! resolves node ids to positions once, and records which modules never got
//! their metadata.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::error::MapError;
use super::node::{ContentForest, Course, Metadata, Node, Preorder};
use super::reconcile::{MarkupScan, Reconciler};

/// A module that ends the run without any observed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyModule {
    pub course: String,
    pub id: String,
    pub title: String,
    /// `false` when the collector never reported this module at all.
    pub visited: bool,
}

#[derive(Debug, Clone)]
pub struct TreeBuilder {
    course: String,
    hierarchy: Vec<Node>,
    index: HashMap<String, Vec<usize>>,
    attached: HashSet<String>,
    reconciler: Reconciler,
}

impl TreeBuilder {
    pub fn new(course: impl Into<String>, hierarchy: Vec<Node>, reconciler: Reconciler) -> Self {
        let course = course.into();
        let mut index = HashMap::new();
        let mut path = Vec::new();
        index_nodes(&course, &hierarchy, &mut path, &mut index);

        Self {
            course,
            hierarchy,
            index,
            attached: HashSet::new(),
            reconciler,
        }
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    /// Module ids in pre-order; the order a collector would naturally visit.
    pub fn module_ids(&self) -> Vec<&str> {
        Preorder::new(&self.hierarchy)
            .filter(|(_, node)| node.is_module())
            .map(|(_, node)| node.id.as_str())
            .collect()
    }

    pub fn is_attached(&self, id: &str) -> bool {
        self.attached.contains(id)
    }

    /// Reconciles both extraction channels for `id` and stores the result.
    pub fn attach_metadata(
        &mut self,
        id: &str,
        structured: &Value,
        scan: &MarkupScan,
    ) -> Result<(), MapError> {
        let metadata = self.reconciler.reconcile(structured, scan);
        self.attach(id, metadata)
    }

    /// Stores already-reconciled metadata for `id`. At most once per node.
    pub fn attach(&mut self, id: &str, metadata: Metadata) -> Result<(), MapError> {
        if self.attached.contains(id) {
            return Err(MapError::AlreadyAttached(id.to_owned()));
        }
        let node = self
            .index
            .get(id)
            .and_then(|path| node_at_mut(&mut self.hierarchy, path))
            .ok_or_else(|| MapError::UnknownNode(id.to_owned()))?;

        let empty = metadata.is_empty();
        let attachments = metadata.attachment_count();
        let video = metadata.has_video();
        node.attach_metadata(metadata)?;
        self.attached.insert(id.to_owned());

        tracing::debug!(
            course = %self.course,
            node_id = id,
            video,
            attachments,
            empty,
            "attached module metadata"
        );
        Ok(())
    }

    pub fn finish(self) -> (Course, Vec<EmptyModule>) {
        let mut empty_modules = Vec::new();
        for (_, node) in Preorder::new(&self.hierarchy) {
            if !node.is_module() {
                continue;
            }
            let visited = self.attached.contains(&node.id);
            if visited && !node.is_empty_module() {
                continue;
            }
            tracing::warn!(
                course = %self.course,
                node_id = %node.id,
                title = %node.title,
                visited,
                "empty module"
            );
            empty_modules.push(EmptyModule {
                course: self.course.clone(),
                id: node.id.clone(),
                title: node.title.clone(),
                visited,
            });
        }

        (Course::new(self.course, self.hierarchy), empty_modules)
    }
}

fn index_nodes(
    course: &str,
    nodes: &[Node],
    path: &mut Vec<usize>,
    index: &mut HashMap<String, Vec<usize>>,
) {
    for (position, node) in nodes.iter().enumerate() {
        path.push(position);
        if index.contains_key(&node.id) {
            tracing::warn!(
                course,
                node_id = %node.id,
                "duplicate node id in skeleton; keeping the first occurrence"
            );
        } else {
            index.insert(node.id.clone(), path.clone());
        }
        index_nodes(course, &node.children, path, index);
        path.pop();
    }
}

fn node_at_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Node> {
    let (first, rest) = path.split_first()?;
    let mut node = nodes.get_mut(*first)?;
    for position in rest {
        node = node.children.get_mut(*position)?;
    }
    Some(node)
}

#[derive(Debug, Clone)]
enum CourseSlot {
    Locked(String),
    Open(TreeBuilder),
}

impl CourseSlot {
    fn title(&self) -> &str {
        match self {
            Self::Locked(title) => title,
            Self::Open(builder) => builder.course(),
        }
    }
}

/// Builds a whole [`ContentForest`] for one collection run.
#[derive(Debug, Clone, Default)]
pub struct ForestBuilder {
    reconciler: Reconciler,
    courses: Vec<CourseSlot>,
}

/// The result of one collection run.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub forest: ContentForest,
    pub empty_modules: Vec<EmptyModule>,
}

impl ForestBuilder {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            courses: Vec::new(),
        }
    }

    pub fn add_course(&mut self, title: &str, hierarchy: Vec<Node>) -> Result<(), MapError> {
        self.ensure_new(title)?;
        self.courses.push(CourseSlot::Open(TreeBuilder::new(
            title,
            hierarchy,
            self.reconciler.clone(),
        )));
        Ok(())
    }

    pub fn add_locked(&mut self, title: &str) -> Result<(), MapError> {
        self.ensure_new(title)?;
        self.courses.push(CourseSlot::Locked(title.to_owned()));
        Ok(())
    }

    fn ensure_new(&self, title: &str) -> Result<(), MapError> {
        if self.courses.iter().any(|slot| slot.title() == title) {
            return Err(MapError::DuplicateCourse(title.to_owned()));
        }
        Ok(())
    }

    pub fn course_mut(&mut self, title: &str) -> Option<&mut TreeBuilder> {
        self.courses.iter_mut().find_map(|slot| match slot {
            CourseSlot::Open(builder) if builder.course() == title => Some(builder),
            _ => None,
        })
    }

    pub fn attach_metadata(
        &mut self,
        course: &str,
        id: &str,
        structured: &Value,
        scan: &MarkupScan,
    ) -> Result<(), MapError> {
        self.course_mut(course)
            .ok_or_else(|| MapError::UnknownCourse(course.to_owned()))?
            .attach_metadata(id, structured, scan)
    }

    pub fn finish(self) -> Assembly {
        let mut assembly = Assembly::default();
        for slot in self.courses {
            let course = match slot {
                CourseSlot::Locked(title) => Course::locked(title),
                CourseSlot::Open(builder) => {
                    let (course, empty) = builder.finish();
                    assembly.empty_modules.extend(empty);
                    course
                }
            };
            // Titles were checked on insertion.
            if let Err(err) = assembly.forest.push(course) {
                tracing::warn!(%err, "dropping course");
            }
        }
        assembly
    }
}
