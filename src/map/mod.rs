//! The content map: courses, their node trees, and the logic that fills and
//! summarizes them.

pub mod builder;
pub mod error;
pub mod node;
pub mod reconcile;
pub mod stats;

pub use builder::{Assembly, EmptyModule, ForestBuilder, TreeBuilder};
pub use error::MapError;
pub use node::{Attachment, ContentForest, Course, Metadata, Node, NodeKind, Preorder, UnitType};
pub use reconcile::{HitOrigin, MarkupScan, Reconciler, ScanHit};
pub use stats::{Stats, Visitor, aggregate, walk};
