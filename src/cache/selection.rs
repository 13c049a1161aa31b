//! Persisted key-value store of prior decisions

use crate::cache::keys::CacheKey;
use crate::cache::merge::merge_values;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the cache, created next to the compose file
pub const CACHE_FILE_NAME: &str = ".lzc-dtl-cache.json";

/// Decisions from previous runs, plus the ones taken so far in this run.
///
/// Every [`update`](Self::update) is written through to the backing file
/// before it returns, so an interrupted run keeps its partial progress.
/// Entries are never removed by the engine.
#[derive(Debug, Clone, Default)]
pub struct SelectionCache {
    values: Map<String, Value>,
    store: Option<PathBuf>,
}

impl SelectionCache {
    /// A cache that is never written anywhere (tests, dry runs)
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An in-memory cache seeded with existing values
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            store: None,
        }
    }

    /// Open the cache stored at `path`.
    ///
    /// A missing file is an empty cache. A file that cannot be read or
    /// parsed is logged and treated as empty; it is overwritten on the
    /// first update.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Cache {} is not a JSON object, starting empty", path.display());
                    Map::new()
                }
                Err(e) => {
                    warn!("Cache {} is corrupt ({}), starting empty", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => {
                warn!("Could not read cache {}: {}", path.display(), e);
                Map::new()
            }
        };

        Self {
            values,
            store: Some(path),
        }
    }

    /// Raw cached value for a key
    pub fn get(&self, key: &CacheKey) -> Option<&Value> {
        self.values
            .get(key.section())
            .and_then(Value::as_object)
            .and_then(|section| section.get(key.id()))
    }

    /// Cached value decoded into `T`.
    ///
    /// An entry that no longer decodes (edited by hand, older format) is
    /// reported and treated as absent so the decision is asked again.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Merge a partial document into the cache and persist it.
    ///
    /// Objects merge recursively, everything else replaces what was there.
    pub fn update(mut self, partial: Map<String, Value>) -> Self {
        merge_values(&mut self.values, partial);
        self.persist();
        self
    }

    /// Record a single decision under `key`
    pub fn record<T: Serialize>(self, key: &CacheKey, value: &T) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not encode cache entry {}: {}", key, e);
                return self;
            }
        };

        let mut section = Map::new();
        section.insert(key.id().to_string(), value);
        let mut partial = Map::new();
        partial.insert(key.section().to_string(), Value::Object(section));

        debug!("Caching decision {}", key);
        self.update(partial)
    }

    /// The whole cache document
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    fn persist(&self) {
        let Some(ref path) = self.store else {
            return;
        };

        if let Err(e) = write_atomically(path, &Value::Object(self.values.clone())) {
            warn!("Could not write cache {}: {}", path.display(), e);
        }
    }
}

/// Write to a sibling temp file, sync it, then rename over the target
fn write_atomically(path: &Path, value: &Value) -> std::io::Result<()> {
    let content = serde_json::to_vec_pretty(value).map_err(std::io::Error::other)?;
    let tmp = path.with_extension("json.tmp");

    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&content)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp, path)
}
