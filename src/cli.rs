use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Assemble(AssembleArgs),
    Stats(StatsArgs),
    Outline(OutlineArgs),
}

#[derive(Debug, Args)]
pub struct AssembleArgs {
    /// Course skeleton document (`{"courses": [{"title", "locked", "hierarchy"}]}`).
    #[arg(long)]
    pub skeleton: String,

    /// Visit log (JSON Lines, one record per visited module).
    #[arg(long)]
    pub visits: String,

    /// Output path for the snapshot. An existing snapshot is replaced.
    #[arg(long, default_value = crate::snapshot::DEFAULT_SNAPSHOT_FILE)]
    pub out: String,

    /// Settings file (supplies extra resource hosts).
    #[arg(long)]
    pub settings: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Snapshot written by `assemble`.
    #[arg(long, default_value = crate::snapshot::DEFAULT_SNAPSHOT_FILE)]
    pub snapshot: String,

    /// Settings file (reports whether a target is configured).
    #[arg(long, default_value = crate::settings::DEFAULT_SETTINGS_FILE)]
    pub settings: String,
}

#[derive(Debug, Args)]
pub struct OutlineArgs {
    /// Snapshot written by `assemble`.
    #[arg(long, default_value = crate::snapshot::DEFAULT_SNAPSHOT_FILE)]
    pub snapshot: String,

    /// Output file for the Markdown outline (default: stdout).
    #[arg(long)]
    pub out: Option<String>,
}
