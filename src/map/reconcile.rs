//! Merges the structured-state channel and the markup-scan channel of one
//! module into a single [`Metadata`] value.
//!
//! Every "maybe a string, maybe a list, maybe absent" shape the collectors
//! produce is resolved here. Nothing in this module returns an error: a field
//! that cannot be understood is treated as not observed.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use url::Url;

use super::node::{Attachment, Metadata};

/// Substrings of link targets that identify downloadable resources when a
/// link is found outside the "Resources" section of a page.
pub const DEFAULT_RESOURCE_HOSTS: &[&str] = &[
    "/f/",
    "assets.skool.com",
    "notion.site",
    "airtable.com",
    "drive.google.com",
    "dropbox.com",
    "docs.google.com",
    "tally.so",
];

const DESCRIPTION_KEYS: &[&str] = &["description", "desc"];
const DURATION_KEYS: &[&str] = &["videoDurationMs", "videoLenMs"];
const VIDEO_LINK_KEYS: &[&str] = &["videoLink"];

/// Where on the page a scanned link was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitOrigin {
    /// Inside the region following a "Resources" heading. Always trusted.
    #[default]
    Heading,
    /// Anywhere on the page; only kept when the host is allowlisted.
    Host,
}

impl HitOrigin {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "host" | "anywhere" => Self::Host,
            _ => Self::Heading,
        }
    }
}

/// One link found by the markup scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanHit {
    pub name: Option<String>,
    pub url: Option<String>,
    pub link: Option<String>,
    pub origin: HitOrigin,
}

impl ScanHit {
    pub fn new(name: Option<&str>, url: &str, origin: HitOrigin) -> Self {
        Self {
            name: name.map(str::to_owned),
            url: Some(url.to_owned()),
            link: None,
            origin,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            name: non_blank(obj.get("name")),
            url: non_blank(obj.get("url")),
            link: non_blank(obj.get("link")),
            origin: obj
                .get("origin")
                .and_then(Value::as_str)
                .map(HitOrigin::parse)
                .unwrap_or_default(),
        })
    }

    pub fn resolved_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.link.as_deref())
    }
}

/// Everything the markup scan produced for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupScan {
    pub hits: Vec<ScanHit>,
    pub description: Option<String>,
}

impl MarkupScan {
    /// Reads `{"hits": [...], "description": "..."}`; a bare array is taken
    /// as the hit list.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self {
                hits: hits_from_list(items),
                description: None,
            },
            Value::Object(obj) => Self {
                hits: obj
                    .get("hits")
                    .and_then(Value::as_array)
                    .map(|items| hits_from_list(items))
                    .unwrap_or_default(),
                description: non_blank(obj.get("description")),
            },
            Value::Null => Self::default(),
            other => {
                tracing::debug!(kind = value_kind(other), "ignoring malformed markup scan");
                Self::default()
            }
        }
    }
}

fn hits_from_list(items: &[Value]) -> Vec<ScanHit> {
    items
        .iter()
        .filter_map(|item| {
            let hit = ScanHit::from_value(item);
            if hit.is_none() {
                tracing::debug!(kind = value_kind(item), "ignoring malformed scan hit");
            }
            hit
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciler {
    hosts: Vec<String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_RESOURCE_HOSTS
                .iter()
                .map(|host| (*host).to_owned())
                .collect(),
        }
    }
}

impl Reconciler {
    pub fn with_extra_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for host in hosts {
            let host = host.as_ref().trim();
            if !host.is_empty() && !self.hosts.iter().any(|known| known == host) {
                self.hosts.push(host.to_owned());
            }
        }
        self
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn is_resource_link(&self, url: &str) -> bool {
        self.hosts.iter().any(|host| url.contains(host.as_str()))
    }

    /// Builds the canonical metadata for one module from both channels.
    pub fn reconcile(&self, structured: &Value, scan: &MarkupScan) -> Metadata {
        let empty = Map::new();
        let fields = match structured {
            Value::Object(fields) => fields,
            Value::Null => &empty,
            other => {
                tracing::debug!(
                    kind = value_kind(other),
                    "structured metadata is not an object; ignoring"
                );
                &empty
            }
        };

        let mut attachments = seed_attachments(fields);
        let mut resource_links: Vec<Attachment> = Vec::new();

        for hit in &scan.hits {
            let Some(url) = hit.resolved_url() else {
                tracing::debug!(name = ?hit.name, "scan hit without url; dropping");
                continue;
            };
            if hit.origin == HitOrigin::Host && !self.is_resource_link(url) {
                tracing::debug!(url, "scan hit outside resource hosts; dropping");
                continue;
            }

            let attachment = Attachment::labelled(hit.name.as_deref(), url);
            if !attachments.iter().any(|known| known.url == attachment.url) {
                attachments.push(attachment.clone());
            }
            if !resource_links.iter().any(|known| known.url == attachment.url) {
                resource_links.push(attachment);
            }
        }

        let description = first_string(fields, DESCRIPTION_KEYS).or_else(|| {
            scan.description
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .map(str::to_owned)
        });

        Metadata {
            description,
            video_duration_ms: first_duration(fields, DURATION_KEYS),
            video_link: first_string(fields, VIDEO_LINK_KEYS),
            attachments,
            resource_links,
        }
    }

    /// Re-reads metadata stored in a snapshot. A stored `resource_links` list
    /// is folded back in as scan hits, so older snapshots whose hits were never
    /// merged count the same way fresh ones do.
    pub fn normalize_stored(&self, stored: &Value) -> Metadata {
        let hits = stored
            .get("resource_links")
            .and_then(Value::as_array)
            .map(|items| hits_from_list(items))
            .unwrap_or_default();
        self.reconcile(
            stored,
            &MarkupScan {
                hits,
                description: None,
            },
        )
    }
}

impl Attachment {
    /// Uses `name` when it has visible text, otherwise the last path segment
    /// of `url`.
    pub fn labelled(name: Option<&str>, url: &str) -> Self {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| label_from_url(url));
        Self {
            name,
            url: url.to_owned(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(url) if !url.trim().is_empty() => Some(Self::labelled(None, url)),
            Value::Object(obj) => {
                let url = non_blank(obj.get("url")).or_else(|| non_blank(obj.get("link")))?;
                let name = non_blank(obj.get("name")).or_else(|| non_blank(obj.get("title")));
                Some(Self::labelled(name.as_deref(), &url))
            }
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Reconciler::default().normalize_stored(&value))
    }
}

fn seed_attachments(fields: &Map<String, Value>) -> Vec<Attachment> {
    let mut raw = decode_list(fields.get("attachments"));
    if raw.is_empty() {
        raw = decode_list(fields.get("resources"));
    }

    let mut seed: Vec<Attachment> = Vec::with_capacity(raw.len());
    for item in &raw {
        let Some(attachment) = Attachment::from_value(item) else {
            tracing::debug!(kind = value_kind(item), "ignoring attachment without url");
            continue;
        };
        if !seed.iter().any(|known| known.url == attachment.url) {
            seed.push(attachment);
        }
    }
    seed
}

/// Accepts a native list or a JSON-encoded list; anything else is empty.
fn decode_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                tracing::debug!(
                    kind = value_kind(&other),
                    "encoded attachment list is not an array"
                );
                Vec::new()
            }
            Err(err) => {
                tracing::debug!(%err, "encoded attachment list is not valid json");
                Vec::new()
            }
        },
        Some(other) => {
            tracing::debug!(kind = value_kind(other), "ignoring malformed attachment list");
            Vec::new()
        }
    }
}

fn first_string(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_blank(fields.get(*key)))
}

fn first_duration(fields: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(duration_ms))
}

fn duration_ms(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|ms| ms.is_finite() && *ms >= 0.0)
                .map(|ms| ms.round() as u64)
        }),
        Value::String(raw) => {
            let raw = raw.trim();
            raw.parse::<u64>().ok().or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|ms| ms.is_finite() && *ms >= 0.0)
                    .map(|ms| ms.round() as u64)
            })
        }
        _ => None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_owned)
}

fn label_from_url(raw: &str) -> String {
    let segment = match Url::parse(raw) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
            .map(str::to_owned),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
            .map(str::to_owned),
    };
    segment.unwrap_or_else(|| raw.to_owned())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn hit(name: Option<&str>, url: &str) -> ScanHit {
        ScanHit::new(name, url, HitOrigin::Heading)
    }

    fn scan(hits: Vec<ScanHit>) -> MarkupScan {
        MarkupScan {
            hits,
            description: None,
        }
    }

    #[test]
    fn scanned_duplicate_keeps_seed_label() {
        let structured = json!({ "attachments": [{ "name": "Workbook", "url": "http://x/1" }] });
        let metadata = Reconciler::default()
            .reconcile(&structured, &scan(vec![hit(Some("dup"), "http://x/1")]));

        assert_eq!(
            metadata.attachments,
            vec![Attachment {
                name: "Workbook".to_owned(),
                url: "http://x/1".to_owned(),
            }]
        );
        assert_eq!(metadata.resource_links.len(), 1);
        assert_eq!(metadata.resource_links[0].name, "dup");
    }

    #[test]
    fn reconciling_twice_is_identical() {
        let structured = json!({
            "desc": "<p>Welcome</p>",
            "videoLenMs": 61000,
            "attachments": "[{\"title\":\"Slides\",\"link\":\"https://drive.google.com/a\"}]",
        });
        let hits = scan(vec![
            hit(None, "https://assets.skool.com/f/abc/notes.pdf?v=2"),
            hit(Some("Slides again"), "https://drive.google.com/a"),
        ]);
        let reconciler = Reconciler::default();

        let first = reconciler.reconcile(&structured, &hits);
        let second = reconciler.reconcile(&structured, &hits);
        assert_eq!(first, second);
        assert_eq!(first.attachment_count(), 2);
    }

    #[test]
    fn merged_list_holds_every_url_once() {
        let seed = ["http://a/1", "http://a/2", "http://a/2", "http://a/3"];
        let scanned = ["http://a/3", "http://b/1", "http://b/1", "http://a/1", "http://b/2"];
        let structured = json!({
            "attachments": seed.iter().map(|url| json!({ "url": url })).collect::<Vec<_>>(),
        });
        let hits = scan(scanned.iter().map(|url| hit(None, url)).collect());

        let metadata = Reconciler::default().reconcile(&structured, &hits);
        assert!(metadata.attachments.len() <= seed.len() + scanned.len());

        let expected = seed.iter().chain(scanned.iter()).copied().collect::<HashSet<_>>();
        let urls = metadata
            .attachments
            .iter()
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(urls.len(), expected.len());
        assert_eq!(urls.iter().copied().collect::<HashSet<_>>(), expected);
        assert_eq!(&urls[..3], &["http://a/1", "http://a/2", "http://a/3"]);
    }

    #[test]
    fn encoded_empty_resources_is_an_empty_seed() {
        let metadata =
            Reconciler::default().reconcile(&json!({ "resources": "[]" }), &MarkupScan::default());
        assert!(metadata.attachments.is_empty());
        assert!(metadata.is_empty());
    }

    #[test]
    fn broken_encoded_list_degrades_to_empty() {
        let metadata = Reconciler::default().reconcile(
            &json!({ "attachments": "[{not json", "videoLink": "https://v/1" }),
            &MarkupScan::default(),
        );
        assert!(metadata.attachments.is_empty());
        assert_eq!(metadata.video_link.as_deref(), Some("https://v/1"));
    }

    #[test]
    fn resources_used_only_when_attachments_empty() {
        let structured = json!({
            "attachments": [],
            "resources": [{ "name": "Legacy", "url": "http://r/1" }],
        });
        let metadata = Reconciler::default().reconcile(&structured, &MarkupScan::default());
        assert_eq!(metadata.attachments[0].name, "Legacy");

        let structured = json!({
            "attachments": [{ "url": "http://a/1" }],
            "resources": [{ "url": "http://r/1" }],
        });
        let metadata = Reconciler::default().reconcile(&structured, &MarkupScan::default());
        assert_eq!(metadata.attachments.len(), 1);
        assert_eq!(metadata.attachments[0].url, "http://a/1");
    }

    #[test]
    fn label_falls_back_to_trailing_segment() {
        let metadata = Reconciler::default().reconcile(
            &Value::Null,
            &scan(vec![
                hit(Some("   "), "https://assets.skool.com/f/abc/notes.pdf?v=2"),
                hit(None, "https://example.com/"),
            ]),
        );
        assert_eq!(metadata.attachments[0].name, "notes.pdf");
        assert_eq!(metadata.attachments[1].name, "https://example.com/");
    }

    #[test]
    fn host_hits_must_match_allowlist() {
        let hits = MarkupScan {
            hits: vec![
                ScanHit::new(Some("Board"), "https://airtable.com/shr1", HitOrigin::Host),
                ScanHit::new(Some("Home"), "https://example.com/about", HitOrigin::Host),
                ScanHit::new(Some("Kept"), "https://example.com/kit", HitOrigin::Heading),
            ],
            description: None,
        };

        let metadata = Reconciler::default().reconcile(&Value::Null, &hits);
        let names = metadata
            .attachments
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Board", "Kept"]);

        let widened = Reconciler::default()
            .with_extra_hosts(["example.com"])
            .reconcile(&Value::Null, &hits);
        assert_eq!(widened.attachments.len(), 3);
    }

    #[test]
    fn structured_description_wins_over_markup() {
        let markup = MarkupScan {
            hits: Vec::new(),
            description: Some("<div>scraped</div>".to_owned()),
        };
        let reconciler = Reconciler::default();

        let from_state = reconciler.reconcile(&json!({ "description": "<p>state</p>" }), &markup);
        assert_eq!(from_state.description.as_deref(), Some("<p>state</p>"));

        let fallback = reconciler.reconcile(&json!({}), &markup);
        assert_eq!(fallback.description.as_deref(), Some("<div>scraped</div>"));
    }

    #[test]
    fn durations_accept_floats_and_strings() {
        let reconciler = Reconciler::default();
        let cases = [
            (json!({ "videoDurationMs": 1500 }), Some(1500)),
            (json!({ "videoLenMs": 1499.6 }), Some(1500)),
            (json!({ "videoLenMs": "42" }), Some(42)),
            (json!({ "videoLenMs": -5 }), None),
            (json!({ "videoLenMs": true }), None),
        ];
        for (structured, expected) in cases {
            let metadata = reconciler.reconcile(&structured, &MarkupScan::default());
            assert_eq!(metadata.video_duration_ms, expected, "{structured}");
        }
    }

    #[test]
    fn malformed_shapes_never_fail() {
        let reconciler = Reconciler::default();
        let metadata = reconciler.reconcile(&json!("not an object"), &MarkupScan::default());
        assert!(metadata.is_empty());

        let scan = MarkupScan::from_value(&json!({
            "hits": [42, { "name": "no url" }, { "link": "https://docs.google.com/d/1" }],
        }));
        let metadata = reconciler.reconcile(&json!({ "attachments": {"url": "x"} }), &scan);
        assert_eq!(metadata.attachments.len(), 1);
        assert_eq!(metadata.attachments[0].url, "https://docs.google.com/d/1");
    }

    #[test]
    fn stored_resource_links_are_folded_in() {
        let stored = json!({
            "attachments": [{ "name": "A", "url": "http://x/1" }],
            "resource_links": [
                { "name": "A (scan)", "url": "http://x/1" },
                { "name": "B", "url": "http://x/2" },
            ],
        });
        let metadata: Metadata = serde_json::from_value(stored).unwrap();
        let urls = metadata
            .attachments
            .iter()
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(urls, vec!["http://x/1", "http://x/2"]);

        let reparsed: Metadata =
            serde_json::from_value(serde_json::to_value(&metadata).unwrap()).unwrap();
        assert_eq!(reparsed, metadata);
    }
}
