use std::net::SocketAddr;
use std::path::PathBuf;

use axum::response::Html;
use clap::Parser;
use tower_http::services::{ServeDir, ServeFile};

use coursemap::app::{AppState, router};
use coursemap::snapshot::SnapshotStore;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Snapshot written by `coursemap assemble`.
    #[arg(long, default_value = coursemap::snapshot::DEFAULT_SNAPSHOT_FILE)]
    snapshot: PathBuf,

    #[arg(long, default_value = coursemap::settings::DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "dashboard/static")]
    web_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    coursemap::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting coursemap-app");

    let state = AppState::new(SnapshotStore::new(&args.snapshot), &args.settings);
    let mut app = router(state);

    let web_index = args.web_dir.join("index.html");
    if web_index.exists() {
        let static_files = ServeDir::new(&args.web_dir).not_found_service(ServeFile::new(web_index));
        app = app.fallback_service(static_files);
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>coursemap-app</title></head>
  <body>
    <h1>coursemap-app</h1>
    <p>web assets not found. Point <code>--web-dir</code> at the dashboard build, or use the
    <code>/api/stats</code>, <code>/api/map</code> and <code>/api/outline</code> endpoints directly.</p>
  </body>
</html>
"#,
            )
        });
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
