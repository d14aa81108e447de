//! Asset-change records and the pending change log.
//!
//! Raw notifications from the asset database are classified into
//! [`AssetChange`] records and queued in a [`ChangeLog`] until a compile
//! drains them. Draining is bracketed so that a failed build never loses
//! changes and records appended mid-build survive untouched.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// What happened to an asset, after kind normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetChangeKind {
    Added,
    Changed,
    Deleted,
}

/// Change kind as reported by the asset database. `None` means the database
/// could not tell what happened and is normalized to
/// [`AssetChangeKind::Changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawChangeKind {
    None,
    Added,
    Changed,
    Deleted,
}

impl RawChangeKind {
    pub fn normalize(self) -> AssetChangeKind {
        match self {
            RawChangeKind::None | RawChangeKind::Changed => AssetChangeKind::Changed,
            RawChangeKind::Added => AssetChangeKind::Added,
            RawChangeKind::Deleted => AssetChangeKind::Deleted,
        }
    }
}

/// One raw notification from the asset database, before classification.
#[derive(Debug, Clone)]
pub struct RawAssetEvent {
    pub uuid: String,
    pub file_path: PathBuf,
    /// Engine-assigned asset classification, e.g. `typescript`.
    pub importer: String,
    /// Free-form metadata attached by the asset database. Only the
    /// `isPlugin` flag is interpreted here.
    pub user_data: serde_json::Value,
}

impl RawAssetEvent {
    pub fn is_plugin_script(&self) -> bool {
        self.user_data
            .get("isPlugin")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// One classified change, in the shape the build driver consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetChange {
    pub kind: AssetChangeKind,
    pub uuid: String,
    pub file_path: PathBuf,
    pub url: Url,
    pub importer: String,
    pub is_plugin_script: bool,
    /// Set only when the classifier recognized this record as a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_file_path: Option<PathBuf>,
}

impl AssetChange {
    pub fn is_rename(&self) -> bool {
        self.old_file_path.is_some() && self.new_file_path.is_some()
    }
}

/// Ordered buffer of classified changes awaiting compilation.
///
/// `begin_drain` snapshots everything currently pending and marks it in
/// flight; at most one drain may be in flight at a time. `commit_drain`
/// discards exactly the in-flight prefix after a successful build and
/// `abort_drain` returns it to pending, preserving order relative to records
/// appended while the build ran.
#[derive(Debug, Default)]
pub struct ChangeLog {
    entries: Vec<AssetChange>,
    in_flight: Option<usize>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: AssetChange) {
        self.entries.push(change);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records not currently claimed by a drain, in classification order.
    pub fn pending(&self) -> &[AssetChange] {
        &self.entries[self.in_flight.unwrap_or(0)..]
    }

    /// Remove every still-pending record matching `pred`, returning them in
    /// order. In-flight records are never touched.
    pub fn take_pending_matching<F>(&mut self, mut pred: F) -> Vec<AssetChange>
    where
        F: FnMut(&AssetChange) -> bool,
    {
        let start = self.in_flight.unwrap_or(0);
        let mut removed = Vec::new();
        let mut index = start;
        while index < self.entries.len() {
            if pred(&self.entries[index]) {
                removed.push(self.entries.remove(index));
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Claim everything currently pending for one compile.
    ///
    /// Returns `None` when a drain is already in flight; the caller should
    /// treat that like a busy build engine.
    pub fn begin_drain(&mut self) -> Option<Vec<AssetChange>> {
        if self.in_flight.is_some() {
            return None;
        }
        self.in_flight = Some(self.entries.len());
        Some(self.entries.clone())
    }

    /// Discard the in-flight records after a successful build.
    pub fn commit_drain(&mut self) {
        if let Some(count) = self.in_flight.take() {
            self.entries.drain(..count);
        }
    }

    /// Return the in-flight records to pending after a failed build.
    pub fn abort_drain(&mut self) {
        self.in_flight = None;
    }

    pub fn drain_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths;
    use std::path::Path;

    fn change(kind: AssetChangeKind, uuid: &str, path: &str) -> AssetChange {
        AssetChange {
            kind,
            uuid: uuid.to_string(),
            file_path: PathBuf::from(path),
            url: paths::file_url(Path::new(path)).unwrap(),
            importer: "typescript".to_string(),
            is_plugin_script: false,
            old_file_path: None,
            new_file_path: None,
        }
    }

    #[test]
    fn test_none_kind_normalizes_to_changed() {
        assert_eq!(RawChangeKind::None.normalize(), AssetChangeKind::Changed);
        assert_eq!(RawChangeKind::Added.normalize(), AssetChangeKind::Added);
        assert_eq!(RawChangeKind::Deleted.normalize(), AssetChangeKind::Deleted);
    }

    #[test]
    fn test_plugin_flag_from_user_data() {
        let event = RawAssetEvent {
            uuid: "u1".to_string(),
            file_path: PathBuf::from("/a/Foo.ts"),
            importer: "typescript".to_string(),
            user_data: serde_json::json!({ "isPlugin": true }),
        };
        assert!(event.is_plugin_script());

        let event = RawAssetEvent {
            user_data: serde_json::json!({}),
            ..event
        };
        assert!(!event.is_plugin_script());
    }

    #[test]
    fn test_commit_drain_keeps_mid_build_appends() {
        let mut log = ChangeLog::new();
        log.push(change(AssetChangeKind::Added, "u1", "/a/Foo.ts"));
        log.push(change(AssetChangeKind::Changed, "u2", "/a/Bar.ts"));

        let drained = log.begin_drain().unwrap();
        assert_eq!(drained.len(), 2);

        log.push(change(AssetChangeKind::Changed, "u3", "/a/Baz.ts"));
        assert_eq!(log.pending().len(), 1);

        log.commit_drain();
        assert_eq!(log.len(), 1);
        assert_eq!(log.pending()[0].uuid, "u3");
    }

    #[test]
    fn test_abort_drain_restores_order() {
        let mut log = ChangeLog::new();
        log.push(change(AssetChangeKind::Added, "u1", "/a/Foo.ts"));
        let _ = log.begin_drain().unwrap();
        log.push(change(AssetChangeKind::Changed, "u2", "/a/Bar.ts"));

        log.abort_drain();
        let pending: Vec<&str> = log.pending().iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(pending, vec!["u1", "u2"]);
    }

    #[test]
    fn test_single_drain_bracket() {
        let mut log = ChangeLog::new();
        log.push(change(AssetChangeKind::Added, "u1", "/a/Foo.ts"));

        assert!(!log.drain_in_flight());
        assert!(log.begin_drain().is_some());
        assert!(log.drain_in_flight());
        assert!(log.begin_drain().is_none());
        log.commit_drain();
        assert!(!log.drain_in_flight());
        assert!(log.begin_drain().is_some());
    }

    #[test]
    fn test_take_pending_matching_skips_in_flight() {
        let mut log = ChangeLog::new();
        log.push(change(AssetChangeKind::Deleted, "u1", "/a/Foo.ts"));
        let _ = log.begin_drain().unwrap();
        log.push(change(AssetChangeKind::Deleted, "u1", "/a/Bar.ts"));

        let removed = log.take_pending_matching(|c| c.uuid == "u1");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].file_path, PathBuf::from("/a/Bar.ts"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_asset_change_camel_case_wire_shape() {
        let mut record = change(AssetChangeKind::Changed, "u1", "/a/Bar.ts");
        record.old_file_path = Some(PathBuf::from("/a/Foo.ts"));
        record.new_file_path = Some(PathBuf::from("/a/Bar.ts"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"filePath\""));
        assert!(json.contains("\"isPluginScript\""));
        assert!(json.contains("\"oldFilePath\""));
        assert!(record.is_rename());
    }
}
