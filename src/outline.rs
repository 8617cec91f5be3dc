use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::OutlineArgs;
use crate::map::{ContentForest, Course, Node, NodeKind, Visitor, walk};
use crate::snapshot::SnapshotStore;

pub fn run(args: OutlineArgs) -> anyhow::Result<()> {
    let store = SnapshotStore::new(&args.snapshot);
    let forest = store
        .load()
        .context("load snapshot")?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no snapshot at {}; run `assemble` first",
                store.path().display()
            )
        })?;

    let markdown = render_markdown(&forest);
    match args.out {
        Some(out) => {
            let out_path = PathBuf::from(out);
            if let Some(parent) = out_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create outline dir: {}", parent.display()))?;
            }
            std::fs::write(&out_path, markdown)
                .with_context(|| format!("write outline: {}", out_path.display()))?;
            tracing::info!(out = %out_path.display(), "outline written");
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

pub fn render_markdown(forest: &ContentForest) -> String {
    let scanned_at = forest
        .scanned_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "Unknown".to_owned());

    let mut outline = Outline {
        out: format!("# Community Map\n\nScanned at: {scanned_at}\n"),
        nodes_in_course: 0,
    };
    walk(forest, &mut outline);
    outline.out
}

struct Outline {
    out: String,
    nodes_in_course: usize,
}

impl Visitor for Outline {
    fn enter_course(&mut self, course: &Course) {
        self.nodes_in_course = 0;
        let lock = if course.locked { " (locked)" } else { "" };
        let _ = write!(self.out, "\n## {}{lock}\n\n", display_title(&course.title));
    }

    fn visit_node(&mut self, node: &Node, depth: usize) {
        self.nodes_in_course += 1;
        let indent = "  ".repeat(depth);
        let title = display_title(&node.title);
        let _ = match &node.kind {
            NodeKind::Folder => writeln!(self.out, "{indent}- **{title}**"),
            NodeKind::Module(metadata) => {
                let mut badges = String::new();
                match metadata.video_duration_ms.filter(|ms| *ms > 0) {
                    Some(ms) => {
                        let minutes = (ms as f64 / 60_000.0).round() as u64;
                        let _ = write!(badges, " [video {minutes}m]");
                    }
                    None if metadata.has_video() => badges.push_str(" [video]"),
                    None => {}
                }
                match metadata.attachment_count() {
                    0 => {}
                    1 => badges.push_str(" [1 file]"),
                    n => {
                        let _ = write!(badges, " [{n} files]");
                    }
                }
                writeln!(self.out, "{indent}- {title}{badges}")
            }
        };
    }

    fn leave_course(&mut self, _course: &Course) {
        if self.nodes_in_course == 0 {
            self.out.push_str("_No visible modules._\n");
        }
    }
}

fn display_title(title: &str) -> &str {
    if title.trim().is_empty() {
        "Untitled"
    } else {
        title
    }
}
