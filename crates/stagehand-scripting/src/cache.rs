//! Rename-aware metadata cache for script assets.
//!
//! Entries are keyed by normalized file path. The cache is what lets the
//! classifier recognize a "changed at an unknown path" event as a rename: the
//! uuid still points at the old path until the entry is moved.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::paths;

/// Cached metadata for one script asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCacheEntry {
    pub uuid: String,
    pub file_path: PathBuf,
    pub url: Url,
    pub is_plugin_script: bool,
    /// Asset version reported by the database, when the host chooses to
    /// cache it alongside the metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Source text, when the host chooses to cache it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Path-keyed store of script metadata for one project.
///
/// At most one entry per uuid is live at any time; `upsert` evicts a stale
/// entry whose uuid moved to a different path.
#[derive(Debug, Default)]
pub struct ScriptMetadataCache {
    entries: FxHashMap<PathBuf, ScriptCacheEntry>,
}

impl ScriptMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for its path.
    ///
    /// Returns the entry that previously held the same uuid at a different
    /// path, if one was evicted.
    pub fn upsert(&mut self, mut entry: ScriptCacheEntry) -> Option<ScriptCacheEntry> {
        entry.file_path = paths::normalize(&entry.file_path);
        let stale_path = self
            .entries
            .values()
            .find(|existing| existing.uuid == entry.uuid && existing.file_path != entry.file_path)
            .map(|existing| existing.file_path.clone());
        let evicted = stale_path.and_then(|path| {
            debug!(
                uuid = %entry.uuid,
                old = %path.display(),
                new = %entry.file_path.display(),
                "Script uuid moved, evicting stale cache entry"
            );
            self.entries.remove(&path)
        });
        self.entries.insert(entry.file_path.clone(), entry);
        evicted
    }

    pub fn get(&self, path: &Path) -> Option<&ScriptCacheEntry> {
        self.entries.get(&paths::normalize(path))
    }

    /// Remove the entry at `path`. Returns whether one existed.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.entries.remove(&paths::normalize(path)).is_some()
    }

    /// Remove and return every entry under `prefix`, sorted by path.
    ///
    /// Matching is component-wise, so `/db-root-2` is not under `/db-root`.
    pub fn remove_by_path_prefix(&mut self, prefix: &Path) -> Vec<ScriptCacheEntry> {
        let prefix = paths::normalize(prefix);
        let doomed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect();
        let mut removed: Vec<ScriptCacheEntry> = doomed
            .into_iter()
            .filter_map(|path| self.entries.remove(&path))
            .collect();
        removed.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        removed
    }

    /// Look an entry up by uuid. Linear scan; the cache holds at most a few
    /// thousand entries per project.
    pub fn find_by_uuid(&self, uuid: &str) -> Option<&ScriptCacheEntry> {
        self.entries.values().find(|entry| entry.uuid == uuid)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ScriptCacheEntry>) {
        for entry in entries {
            self.upsert(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptCacheEntry> {
        self.entries.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
