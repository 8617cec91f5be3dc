//! Key-value settings shared by the CLI and the dashboard.
//!
//! The file is a flat JSON object. Known keys are typed; every other key is
//! kept as-is so that tools sharing the file do not lose each other's values.
//! Reading never fails on content: a known key with the wrong type is logged
//! and treated as unset.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::map::Reconciler;

pub const DEFAULT_SETTINGS_FILE: &str = "config/settings.json";

const TARGET_URL: &str = "target_url";
const OUTPUT_DIR: &str = "output_dir";
const RESOURCE_HOSTS: &str = "resource_hosts";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Extra link patterns accepted as resources, on top of the built-in list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_hosts: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A settings update whose value does not fit a known key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("setting {key:?} must be {expected}")]
pub struct InvalidSetting {
    pub key: &'static str,
    pub expected: &'static str,
}

impl Settings {
    /// Loads settings; a missing or unreadable-as-JSON file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "settings file not found; using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read settings: {}", path.display()));
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Self::from_map(map)),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "settings file is not a JSON object; using defaults");
                Ok(Self::default())
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "settings file is not valid JSON; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        crate::store::write_json_atomic(path, self)
            .with_context(|| format!("write settings: {}", path.display()))
    }

    /// Builds settings from a raw object, dropping mistyped known keys.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let target_url = take_string(&mut map, TARGET_URL);
        let output_dir = take_string(&mut map, OUTPUT_DIR);
        let resource_hosts = match map.remove(RESOURCE_HOSTS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(host) => Some(host),
                    other => {
                        tracing::warn!(entry = %other, "ignoring non-string resource host");
                        None
                    }
                })
                .collect(),
            Some(other) => {
                tracing::warn!(key = RESOURCE_HOSTS, value = %other, "expected a list; ignoring");
                Vec::new()
            }
        };

        Self {
            target_url,
            output_dir,
            resource_hosts,
            extra: map,
        }
    }

    /// The configured target, if any. Blank values count as unset.
    pub fn target(&self) -> Option<&str> {
        self.target_url
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }

    pub fn has_target(&self) -> bool {
        self.target().is_some()
    }

    /// Checks that every known key in `patch` carries a usable value.
    /// `null` clears a key.
    pub fn validate_patch(patch: &Map<String, Value>) -> Result<(), InvalidSetting> {
        for key in [TARGET_URL, OUTPUT_DIR] {
            if let Some(value) = patch.get(key)
                && !matches!(value, Value::Null | Value::String(_))
            {
                return Err(InvalidSetting {
                    key,
                    expected: "a string or null",
                });
            }
        }
        if let Some(value) = patch.get(RESOURCE_HOSTS) {
            let ok = match value {
                Value::Null => true,
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            };
            if !ok {
                return Err(InvalidSetting {
                    key: RESOURCE_HOSTS,
                    expected: "a list of strings or null",
                });
            }
        }
        Ok(())
    }

    /// Applies `patch` key by key on top of the current values.
    pub fn merge(&mut self, patch: Map<String, Value>) -> Result<(), InvalidSetting> {
        Self::validate_patch(&patch)?;
        let mut current = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        current.extend(patch);
        *self = Self::from_map(current);
        Ok(())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::default().with_extra_hosts(&self.resource_hosts)
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_map(Map::deserialize(deserializer)?))
    }
}

fn take_string(map: &mut Map<String, Value>, key: &'static str) -> Option<String> {
    match map.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            tracing::warn!(key, value = %other, "expected a string; ignoring");
            None
        }
    }
}
