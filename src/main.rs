use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    coursemap::logging::init().context("init logging")?;

    let cli = coursemap::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        coursemap::cli::Command::Assemble(args) => {
            coursemap::assemble::run(args).context("assemble")?;
        }
        coursemap::cli::Command::Stats(args) => {
            coursemap::report::run(args).context("stats")?;
        }
        coursemap::cli::Command::Outline(args) => {
            coursemap::outline::run(args).context("outline")?;
        }
    }

    Ok(())
}
