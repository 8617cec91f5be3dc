use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::StatsArgs;
use crate::map::{ContentForest, Stats, aggregate};
use crate::settings::Settings;
use crate::snapshot::SnapshotStore;

/// What the dashboard shows: the counts plus whether there is anything to
/// count yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub stats: Stats,
    pub has_settings: bool,
    pub target_url: Option<String>,
    pub has_snapshot: bool,
}

impl DashboardStats {
    pub fn new(forest: Option<&ContentForest>, settings: &Settings) -> Self {
        Self {
            stats: forest.map(aggregate).unwrap_or_default(),
            has_settings: settings.has_target(),
            target_url: settings.target().map(str::to_owned),
            has_snapshot: forest.is_some(),
        }
    }

    /// Loads the snapshot behind `store`; a missing one yields zero counts.
    pub fn load(store: &SnapshotStore, settings: &Settings) -> anyhow::Result<Self> {
        let forest = store.load()?;
        Ok(Self::new(forest.as_ref(), settings))
    }
}

/// Prints the dashboard summary for a snapshot as JSON on stdout.
pub fn run(args: StatsArgs) -> anyhow::Result<()> {
    let settings = Settings::load(Path::new(&args.settings)).context("load settings")?;
    let store = SnapshotStore::new(&args.snapshot);
    let stats = DashboardStats::load(&store, &settings).context("compute stats")?;
    if !stats.has_snapshot {
        tracing::warn!(snapshot = %store.path().display(), "no snapshot yet; run `assemble` first");
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &stats).context("serialize stats")?;
    stdout.write_all(b"\n").context("write stats newline")?;
    Ok(())
}
