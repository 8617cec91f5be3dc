//! Summary counts over a content forest.
//!
//! All walks over a forest go through [`walk`] with a caller-owned
//! [`Visitor`]; the counting here and the outline renderer share it.

use serde::{Deserialize, Serialize};

use super::node::{ContentForest, Course, Node, NodeKind};

pub trait Visitor {
    fn enter_course(&mut self, _course: &Course) {}

    fn visit_node(&mut self, node: &Node, depth: usize);

    fn leave_course(&mut self, _course: &Course) {}
}

/// Visits every course and, in pre-order, every node beneath it.
pub fn walk<V: Visitor + ?Sized>(forest: &ContentForest, visitor: &mut V) {
    for course in forest.courses() {
        visitor.enter_course(course);
        for (depth, node) in course.nodes() {
            visitor.visit_node(node, depth);
        }
        visitor.leave_course(course);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub courses: usize,
    pub modules: usize,
    pub sets: usize,
    pub videos: usize,
    pub attachments: usize,
}

impl Visitor for Stats {
    fn enter_course(&mut self, _course: &Course) {
        self.courses += 1;
    }

    fn visit_node(&mut self, node: &Node, _depth: usize) {
        match &node.kind {
            NodeKind::Folder => self.sets += 1,
            NodeKind::Module(metadata) => {
                self.modules += 1;
                if metadata.has_video() {
                    self.videos += 1;
                }
                self.attachments += metadata.attachment_count();
            }
        }
    }
}

pub fn aggregate(forest: &ContentForest) -> Stats {
    let mut stats = Stats::default();
    walk(forest, &mut stats);
    stats
}
