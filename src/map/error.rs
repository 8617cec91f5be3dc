use thiserror::Error;

use super::node::UnitType;

/// Contract violations raised by the content-map model.
///
/// Malformed input never ends up here: it degrades to empty values at the
/// ingestion boundary. These variants are programming errors of the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("cannot attach metadata to {kind} node {id:?}")]
    InvalidNodeKind { id: String, kind: UnitType },

    #[error("unknown node id: {0:?}")]
    UnknownNode(String),

    #[error("unknown course: {0:?}")]
    UnknownCourse(String),

    #[error("metadata already attached to node {0:?}")]
    AlreadyAttached(String),

    #[error("duplicate course title: {0:?}")]
    DuplicateCourse(String),
}
