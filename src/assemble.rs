use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use serde_json::Value;

use crate::cli::AssembleArgs;
use crate::map::{Assembly, ForestBuilder, MarkupScan, Reconciler, aggregate};
use crate::settings::Settings;
use crate::snapshot::SnapshotStore;

/// One line of the visit log: what the collector saw on a module page.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub course: String,
    pub id: String,
    pub structured: Value,
    pub scan: MarkupScan,
}

impl Visit {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let course = obj.get("course").and_then(Value::as_str)?.to_owned();
        let id = match obj.get("id")? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(Self {
            course,
            id,
            structured: obj.get("structured").cloned().unwrap_or(Value::Null),
            scan: obj
                .get("scan")
                .map(MarkupScan::from_value)
                .unwrap_or_default(),
        })
    }
}

pub fn run(args: AssembleArgs) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => Settings::load(Path::new(path)).context("load settings")?,
        None => Settings::default(),
    };

    let skeleton_path = PathBuf::from(&args.skeleton);
    let skeleton = std::fs::read_to_string(&skeleton_path)
        .with_context(|| format!("read skeleton: {}", skeleton_path.display()))?;
    let skeleton: Value = serde_json::from_str(&skeleton).context("parse skeleton json")?;

    let mut builder = builder_from_skeleton(&skeleton, settings.reconciler());

    let visits_path = PathBuf::from(&args.visits);
    let (applied, skipped) = apply_visits(&mut builder, &visits_path)?;

    let Assembly {
        mut forest,
        empty_modules,
    } = builder.finish();
    forest.scanned_at = Some(Utc::now());

    SnapshotStore::new(&args.out)
        .save(&forest)
        .context("save snapshot")?;

    let stats = aggregate(&forest);
    tracing::info!(
        courses = stats.courses,
        modules = stats.modules,
        sets = stats.sets,
        videos = stats.videos,
        attachments = stats.attachments,
        visits_applied = applied,
        visits_skipped = skipped,
        empty_modules = empty_modules.len(),
        "assembled content map"
    );
    Ok(())
}

/// Registers every course of a skeleton document with a fresh builder.
pub fn builder_from_skeleton(skeleton: &Value, reconciler: Reconciler) -> ForestBuilder {
    let mut builder = ForestBuilder::new(reconciler);
    let Some(courses) = skeleton.get("courses").and_then(Value::as_array) else {
        tracing::warn!("skeleton has no courses array");
        return builder;
    };

    for (position, course) in courses.iter().enumerate() {
        let Some(title) = course.get("title").and_then(Value::as_str) else {
            tracing::warn!(position, "skipping skeleton course without title");
            continue;
        };
        let locked = course
            .get("locked")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let added = if locked {
            builder.add_locked(title)
        } else {
            let hierarchy = course
                .get("hierarchy")
                .or_else(|| course.get("details").and_then(|d| d.get("hierarchy")))
                .map(crate::formats::skeleton_from_value)
                .unwrap_or_default();
            builder.add_course(title, hierarchy)
        };
        if let Err(err) = added {
            tracing::warn!(position, %err, "skipping skeleton course");
        }
    }
    builder
}

/// Feeds the visit log into `builder`. Returns `(applied, skipped)`.
///
/// A missing log means the collector stopped before visiting anything.
fn apply_visits(builder: &mut ForestBuilder, path: &Path) -> anyhow::Result<(usize, usize)> {
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "visit log not found; every module will be empty");
            return Ok((0, 0));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("open visit log: {}", path.display()));
        }
    };

    let mut applied = 0;
    let mut skipped = 0;
    // Byte lines: a collector killed mid-write may leave a non-UTF-8 tail.
    for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line_no = idx + 1;
        let line = line.context("read visit jsonl line")?;
        if line.trim_ascii().is_empty() {
            continue;
        }

        let visit = match serde_json::from_slice::<Value>(&line) {
            Ok(value) => Visit::from_value(&value),
            Err(err) => {
                tracing::warn!(line = line_no, %err, "skipping unparsable visit record");
                skipped += 1;
                continue;
            }
        };
        let Some(visit) = visit else {
            tracing::warn!(line = line_no, "skipping visit record without course/id");
            skipped += 1;
            continue;
        };

        match builder.attach_metadata(&visit.course, &visit.id, &visit.structured, &visit.scan) {
            Ok(()) => applied += 1,
            Err(err) => {
                tracing::warn!(line = line_no, course = %visit.course, %err, "visit rejected");
                skipped += 1;
            }
        }
    }
    Ok((applied, skipped))
}
