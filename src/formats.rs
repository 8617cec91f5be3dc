//! On-disk shapes of the snapshot document and the collector inputs.
//!
//! Writing goes through borrowed `*Record` structs that mirror the document
//! field for field. Reading goes through `serde_json::Value` so that a bad
//! course or node is skipped instead of failing the whole document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::map::{ContentForest, Course, Metadata, Node, NodeKind, Reconciler, UnitType};

static EMPTY_METADATA: Metadata = Metadata {
    description: None,
    video_duration_ms: None,
    video_link: None,
    attachments: Vec::new(),
    resource_links: Vec::new(),
};

#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    scanned_at: Option<String>,
    courses: Vec<CourseRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct CourseRecord<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    locked: bool,
    details: DetailsRecord<'a>,
}

#[derive(Debug, Serialize)]
struct DetailsRecord<'a> {
    hierarchy: Vec<NodeRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct NodeRecord<'a> {
    id: &'a str,
    title: &'a str,
    #[serde(rename = "unitType")]
    unit_type: UnitType,
    children: Vec<NodeRecord<'a>>,
    metadata: &'a Metadata,
}

impl<'a> From<&'a Node> for NodeRecord<'a> {
    fn from(node: &'a Node) -> Self {
        Self {
            id: &node.id,
            title: &node.title,
            unit_type: node.unit_type(),
            children: node.children.iter().map(NodeRecord::from).collect(),
            metadata: node.metadata().unwrap_or(&EMPTY_METADATA),
        }
    }
}

impl<'a> From<&'a Course> for CourseRecord<'a> {
    fn from(course: &'a Course) -> Self {
        Self {
            title: &course.title,
            locked: course.locked,
            details: DetailsRecord {
                hierarchy: course.hierarchy.iter().map(NodeRecord::from).collect(),
            },
        }
    }
}

impl Serialize for ContentForest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SnapshotRecord {
            scanned_at: self.scanned_at.map(|at| at.to_rfc3339()),
            courses: self.courses().iter().map(CourseRecord::from).collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentForest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(forest_from_value(&value))
    }
}

/// Reads a snapshot document. Unreadable parts contribute nothing.
pub fn forest_from_value(value: &Value) -> ContentForest {
    let mut forest = ContentForest::new();
    forest.scanned_at = value
        .get("scanned_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));

    let Some(courses) = value.get("courses").and_then(Value::as_array) else {
        tracing::warn!("snapshot has no courses array");
        return forest;
    };

    let reconciler = Reconciler::default();
    for (position, raw) in courses.iter().enumerate() {
        let Some(course) = course_from_value(raw, &reconciler) else {
            tracing::warn!(position, "skipping malformed course entry");
            continue;
        };
        if let Err(err) = forest.push(course) {
            tracing::warn!(position, %err, "skipping course entry");
        }
    }
    forest
}

fn course_from_value(value: &Value, reconciler: &Reconciler) -> Option<Course> {
    let obj = value.as_object()?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let locked = obj.get("locked").and_then(Value::as_bool).unwrap_or(false);
    let details = obj.get("details");

    let mut hierarchy = details
        .and_then(|details| details.get("hierarchy"))
        .map(|nodes| nodes_from_value(nodes, Some(reconciler)))
        .unwrap_or_default();
    if hierarchy.is_empty()
        && let Some(details) = details
    {
        // Snapshots predating nested hierarchies listed modules and sets flat.
        for key in ["modules", "sets"] {
            if let Some(nodes) = details.get(key) {
                hierarchy.extend(nodes_from_value(nodes, Some(reconciler)));
            }
        }
    }

    if locked {
        if !hierarchy.is_empty() {
            tracing::warn!(course = %title, "locked course lists nodes; dropping them");
        }
        return Some(Course::locked(title));
    }
    Some(Course::new(title, hierarchy))
}

/// Reads a raw skeleton (`{id, title, unitType, children}`); any stored
/// metadata is ignored.
pub fn skeleton_from_value(value: &Value) -> Vec<Node> {
    nodes_from_value(value, None)
}

fn nodes_from_value(value: &Value, reconciler: Option<&Reconciler>) -> Vec<Node> {
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            tracing::warn!("node list is not an array; treating as empty");
        }
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let node = node_from_value(item, reconciler);
            if node.is_none() {
                tracing::warn!("skipping malformed node entry");
            }
            node
        })
        .collect()
}

fn node_from_value(value: &Value, reconciler: Option<&Reconciler>) -> Option<Node> {
    let obj = value.as_object()?;
    let id = match obj.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let children = obj
        .get("children")
        .map(|children| nodes_from_value(children, reconciler))
        .unwrap_or_default();

    let raw_unit = obj.get("unitType").and_then(Value::as_str);
    let kind = match raw_unit.and_then(UnitType::parse) {
        Some(UnitType::Module) => NodeKind::Module(match (reconciler, obj.get("metadata")) {
            (Some(reconciler), Some(stored)) => reconciler.normalize_stored(stored),
            _ => Metadata::default(),
        }),
        Some(UnitType::Folder) => NodeKind::Folder,
        None => {
            tracing::debug!(node_id = %id, unit_type = ?raw_unit, "unknown unitType; treating as folder");
            NodeKind::Folder
        }
    };

    Some(Node {
        id,
        title,
        kind,
        children,
    })
}
