//! Classification of raw asset events into queued changes.
//!
//! Owns the change log, the script metadata cache and the one-shot
//! suppression set for one project. Rename detection works two ways:
//!
//! - a `Changed` event at a path the cache does not know, whose uuid matches
//!   an entry at another path, is a rename that surfaced as a bare change;
//! - an `Added` event whose uuid matches a still-pending `Deleted` record is
//!   the second half of a delete/add rename pair.
//!
//! Both produce a single `Changed` record carrying `old_file_path` and
//! `new_file_path`. The heuristics key on different event kinds, so one event
//! can only ever trigger one of them.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::cache::{ScriptCacheEntry, ScriptMetadataCache};
use crate::change::{AssetChange, AssetChangeKind, ChangeLog, RawAssetEvent, RawChangeKind};
use crate::error::{Result, ScriptingError};
use crate::paths;

/// Importer name of compiled project scripts; only these get cache and
/// rename treatment.
pub const TYPESCRIPT_IMPORTER: &str = "typescript";

/// Importer name of plain scripts; queued for compilation but never cached.
pub const JAVASCRIPT_IMPORTER: &str = "javascript";

/// Change tracking state for one project.
pub struct ChangeClassifier {
    log: ChangeLog,
    cache: ScriptMetadataCache,
    suppressed: FxHashSet<String>,
}

impl ChangeClassifier {
    pub fn new() -> Self {
        Self {
            log: ChangeLog::new(),
            cache: ScriptMetadataCache::new(),
            suppressed: FxHashSet::default(),
        }
    }

    /// Classify one raw event, update the cache and append to the log.
    ///
    /// Returns the queued record, or `None` when a one-shot suppression
    /// swallowed the event. Malformed events (empty uuid or path) fail
    /// without touching any state.
    pub fn classify(
        &mut self,
        kind: RawChangeKind,
        event: RawAssetEvent,
    ) -> Result<Option<AssetChange>> {
        if event.uuid.is_empty() {
            return Err(ScriptingError::MalformedEvent { field: "uuid" });
        }
        if event.file_path.as_os_str().is_empty() {
            return Err(ScriptingError::MalformedEvent { field: "filePath" });
        }

        let kind = kind.normalize();
        let file_path = paths::normalize(&event.file_path);
        let url = paths::file_url(&file_path)?;
        let is_plugin_script = event.is_plugin_script();

        let mut change = AssetChange {
            kind,
            uuid: event.uuid.clone(),
            file_path: file_path.clone(),
            url: url.clone(),
            importer: event.importer.clone(),
            is_plugin_script,
            old_file_path: None,
            new_file_path: None,
        };

        if event.importer == TYPESCRIPT_IMPORTER {
            let entry = ScriptCacheEntry {
                uuid: event.uuid.clone(),
                file_path: file_path.clone(),
                url,
                is_plugin_script,
                version: None,
                content: None,
            };

            match kind {
                AssetChangeKind::Changed => {
                    if self.cache.get(&file_path).is_none() {
                        if let Some(stale) = self.cache.find_by_uuid(&event.uuid) {
                            let old_path = stale.file_path.clone();
                            self.cache.remove(&old_path);
                            self.cache.upsert(entry);
                            debug!(
                                uuid = %event.uuid,
                                old = %old_path.display(),
                                new = %file_path.display(),
                                "Change at unknown path resolved as rename"
                            );
                            change.old_file_path = Some(old_path);
                            change.new_file_path = Some(file_path);
                        }
                    }
                }
                AssetChangeKind::Added => {
                    let pending_delete = self.log.pending().iter().any(|queued| {
                        queued.kind == AssetChangeKind::Deleted && queued.uuid == event.uuid
                    });
                    if pending_delete {
                        let removed = self
                            .log
                            .take_pending_matching(|queued| queued.uuid == event.uuid);
                        if let Some(deleted) = removed
                            .iter()
                            .find(|queued| queued.kind == AssetChangeKind::Deleted)
                        {
                            debug!(
                                uuid = %event.uuid,
                                old = %deleted.file_path.display(),
                                new = %file_path.display(),
                                "Coalesced delete/add pair into rename"
                            );
                            change.kind = AssetChangeKind::Changed;
                            change.old_file_path = Some(deleted.file_path.clone());
                            change.new_file_path = Some(file_path);
                        }
                    }
                    self.cache.upsert(entry);
                }
                AssetChangeKind::Deleted => {
                    self.cache.remove(&file_path);
                }
            }
        }

        if self.suppressed.remove(&event.uuid) {
            debug!(uuid = %event.uuid, "Asset change suppressed");
            return Ok(None);
        }

        self.log.push(change.clone());
        Ok(Some(change))
    }

    /// Swallow the next notification for `uuid`. Cache bookkeeping still
    /// happens; only the log append is skipped.
    pub fn suppress_next(&mut self, uuid: impl Into<String>) {
        let uuid = uuid.into();
        if !self.suppressed.insert(uuid.clone()) {
            warn!(uuid = %uuid, "Asset change already suppressed");
        }
    }

    pub fn log(&self) -> &ChangeLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ChangeLog {
        &mut self.log
    }

    pub fn cache(&self) -> &ScriptMetadataCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ScriptMetadataCache {
        &mut self.cache
    }

    /// Drop all tracked state. Used at subsystem teardown.
    pub fn clear(&mut self) {
        self.log.clear();
        self.cache.clear();
        self.suppressed.clear();
    }
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new()
    }
}
