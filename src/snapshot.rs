use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde_json::Value;

use crate::map::ContentForest;

pub const DEFAULT_SNAPSHOT_FILE: &str = "map.json";

/// The single persisted document describing the whole content map.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no collection run has written a snapshot yet.
    pub fn load(&self) -> anyhow::Result<Option<ContentForest>> {
        let value = crate::store::read_json::<Value>(&self.path)
            .with_context(|| format!("read snapshot: {}", self.path.display()))?;
        let Some(value) = value else {
            tracing::debug!(path = %self.path.display(), "no snapshot yet");
            return Ok(None);
        };
        Ok(Some(crate::formats::forest_from_value(&value)))
    }

    /// Replaces the snapshot with `forest` in one rename.
    pub fn save(&self, forest: &ContentForest) -> anyhow::Result<()> {
        crate::store::write_json_atomic(&self.path, forest)
            .with_context(|| format!("write snapshot: {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            courses = forest.len(),
            "snapshot written"
        );
        Ok(())
    }
}
