//! Property-based tests for change tracking
//!
//! These tests use proptest to verify the change log, the metadata cache and
//! the classifier across randomized event sequences, beyond the specific
//! scenarios covered by the example-based tests.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use stagehand_scripting::{
    paths, AssetChange, AssetChangeKind, ChangeClassifier, ChangeLog, RawAssetEvent, RawChangeKind,
    ScriptMetadataCache, TYPESCRIPT_IMPORTER,
};
use stagehand_test_helpers::{cache_entry, change};

fn uuid_at(index: u8) -> String {
    format!("u{index}")
}

fn path_at(index: u8) -> String {
    format!("/p/assets/s{index}.ts")
}

fn changes_from(indices: &[u8]) -> Vec<AssetChange> {
    indices
        .iter()
        .map(|&i| change(AssetChangeKind::Changed, &uuid_at(i), &path_at(i)))
        .collect()
}

/// Strategy for raw event sequences over a small pool of uuids and paths, so
/// renames and collisions actually happen.
fn event_sequence_strategy() -> impl Strategy<Value = Vec<(RawChangeKind, u8, u8)>> {
    let kind = prop_oneof![
        Just(RawChangeKind::None),
        Just(RawChangeKind::Added),
        Just(RawChangeKind::Changed),
        Just(RawChangeKind::Deleted),
    ];
    prop::collection::vec((kind, 0u8..4, 0u8..4), 0..40)
}

proptest! {
    // Property: a committed drain removes exactly the claimed records and
    // leaves later arrivals pending, in order
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_commit_drain_keeps_only_late_arrivals(
        before in prop::collection::vec(0u8..8, 0..12),
        after in prop::collection::vec(0u8..8, 0..12)
    ) {
        let mut log = ChangeLog::new();
        for record in changes_from(&before) {
            log.push(record);
        }

        let drained = log.begin_drain().expect("no drain in flight");
        prop_assert_eq!(drained.len(), before.len());

        for record in changes_from(&after) {
            log.push(record);
        }
        log.commit_drain();

        let pending: Vec<String> = log.pending().iter().map(|c| c.uuid.clone()).collect();
        let expected: Vec<String> = after.iter().map(|&i| uuid_at(i)).collect();
        prop_assert_eq!(pending, expected);
    }

    #[test]
    fn prop_abort_drain_loses_nothing(
        before in prop::collection::vec(0u8..8, 0..12),
        after in prop::collection::vec(0u8..8, 0..12)
    ) {
        let mut log = ChangeLog::new();
        for record in changes_from(&before) {
            log.push(record);
        }
        let _ = log.begin_drain().expect("no drain in flight");
        for record in changes_from(&after) {
            log.push(record);
        }
        log.abort_drain();

        let pending: Vec<String> = log.pending().iter().map(|c| c.uuid.clone()).collect();
        let expected: Vec<String> = before
            .iter()
            .chain(after.iter())
            .map(|&i| uuid_at(i))
            .collect();
        prop_assert_eq!(pending, expected);
    }
}

proptest! {
    // Property: the cache never holds two entries for the same uuid, and
    // every entry sits at the path of its most recent upsert
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_cache_keeps_one_entry_per_uuid(
        ops in prop::collection::vec((0u8..5, 0u8..5), 0..40)
    ) {
        let mut cache = ScriptMetadataCache::new();
        let mut model: HashMap<PathBuf, String> = HashMap::new();

        for (uuid_index, path_index) in ops {
            let uuid = uuid_at(uuid_index);
            let path = PathBuf::from(path_at(path_index));
            cache.upsert(cache_entry(&uuid, &path_at(path_index)));
            model.retain(|_, existing| existing != &uuid);
            model.insert(path, uuid);
        }

        prop_assert_eq!(cache.len(), model.len());
        for (path, uuid) in &model {
            let entry = cache.get(path).expect("modelled entry must exist");
            prop_assert_eq!(&entry.uuid, uuid);
            let found = cache.find_by_uuid(uuid).expect("uuid must be findable");
            prop_assert_eq!(&found.file_path, path);
        }
    }
}

proptest! {
    // Property: under arbitrary script event sequences the classifier keeps
    // its structural invariants
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_classifier_invariants_hold(sequence in event_sequence_strategy()) {
        let mut classifier = ChangeClassifier::new();
        let mut classified = 0usize;

        for (kind, uuid_index, path_index) in sequence {
            let event = RawAssetEvent {
                uuid: uuid_at(uuid_index),
                file_path: PathBuf::from(path_at(path_index)),
                importer: TYPESCRIPT_IMPORTER.to_string(),
                user_data: serde_json::json!({}),
            };
            classifier.classify(kind, event).expect("well-formed event");
            classified += 1;
        }

        let pending = classifier.log().pending();
        prop_assert!(pending.len() <= classified);

        // Rename markers come in pairs.
        for record in pending {
            prop_assert_eq!(
                record.old_file_path.is_some(),
                record.new_file_path.is_some()
            );
        }

        // A pending delete is never followed by an add of the same script.
        for (index, record) in pending.iter().enumerate() {
            if record.kind == AssetChangeKind::Deleted {
                let readded = pending[index + 1..]
                    .iter()
                    .any(|later| later.uuid == record.uuid && later.kind == AssetChangeKind::Added);
                prop_assert!(!readded, "unswept delete/add pair for {}", record.uuid);
            }
        }

        // At most one cache entry per uuid.
        let mut seen = HashSet::new();
        for entry in classifier.cache().iter() {
            prop_assert!(seen.insert(entry.uuid.clone()), "duplicate cache uuid {}", entry.uuid);
        }
    }
}

proptest! {
    // Property: path normalization is idempotent and leaves no dot segments
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_normalize_is_idempotent(
        segments in prop::collection::vec(
            prop_oneof![
                Just("a".to_string()),
                Just("b".to_string()),
                Just("sub".to_string()),
                Just(".".to_string()),
                Just("..".to_string()),
            ],
            0..10
        )
    ) {
        let raw = PathBuf::from(format!("/{}", segments.join("/")));
        let normalized = paths::normalize(&raw);

        prop_assert!(normalized.has_root());
        for component in normalized.components() {
            prop_assert!(
                !matches!(
                    component,
                    std::path::Component::CurDir | std::path::Component::ParentDir
                ),
                "dot segment survived in {}",
                normalized.display()
            );
        }
        prop_assert_eq!(paths::normalize(&normalized), normalized.clone());
    }
}

// The pool sizes above are deliberately tiny; a sanity check that collisions
// do occur, otherwise the cache property tests nothing.
#[test]
fn test_pool_produces_uuid_collisions() {
    let first = uuid_at(1);
    let second = uuid_at(1);
    assert_eq!(first, second);
    assert_ne!(Path::new(&path_at(0)), Path::new(&path_at(1)));
}
