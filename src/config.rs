use std::{collections::BTreeMap, path::Path};

use anyhow::Context as _;

use crate::error::ShotblastResult;

/// Namespace prefix for every key the pipeline reads from the host preference
/// store. Keys outside this prefix are never touched.
pub const CONFIG_NAMESPACE: &str = "shotblast.";

/// Read-only view of the host's flat key/value preference store.
///
/// The pipeline only ever reads: preset overrides, the ffmpeg location, and
/// encoder defaults. Writing preferences is the embedding application's job.
pub trait ConfigStore: Send + Sync {
    /// Look up a fully-qualified key (including the `shotblast.` prefix).
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory store, used for tests and for embedding hosts that marshal their
/// preference state up front.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfigStore {
    values: BTreeMap<String, String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Store backed by a flat JSON object on disk (`{"shotblast.ffmpeg_path": "..."}`
/// or nested-free string/number values). Loaded once; the file is never written.
#[derive(Clone, Debug, Default)]
pub struct JsonConfigStore {
    values: BTreeMap<String, String>,
}

impl JsonConfigStore {
    pub fn load(path: &Path) -> ShotblastResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        let parsed: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&text).with_context(|| "parse config JSON object")?;

        let mut values = BTreeMap::new();
        for (key, value) in parsed {
            let flat = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            values.insert(key, flat);
        }
        Ok(Self { values })
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Empty store for callers that have no host preferences.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConfig;

impl ConfigStore for NoConfig {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}
