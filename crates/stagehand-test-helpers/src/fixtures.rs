//! Test fixtures - asset events, changes and cache entries.
//!
//! All paths handed to these builders must be absolute so they can be turned
//! into `file://` URLs.

use std::path::{Path, PathBuf};

use serde_json::json;
use stagehand_scripting::paths::file_url;
use stagehand_scripting::{
    AssetChange, AssetChangeKind, InitializeOptions, PluginScriptInfo, RawAssetEvent,
    ScriptCacheEntry, ScriptConfig, JAVASCRIPT_IMPORTER, TYPESCRIPT_IMPORTER,
};
use uuid::Uuid;

pub fn random_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// A raw database event for a regular TypeScript asset.
pub fn script_event(uuid: &str, path: &str) -> RawAssetEvent {
    RawAssetEvent {
        uuid: uuid.to_string(),
        file_path: PathBuf::from(path),
        importer: TYPESCRIPT_IMPORTER.to_string(),
        user_data: json!({}),
    }
}

/// A raw database event for a TypeScript asset flagged as a plugin script.
pub fn plugin_script_event(uuid: &str, path: &str) -> RawAssetEvent {
    RawAssetEvent {
        user_data: json!({ "isPlugin": true }),
        ..script_event(uuid, path)
    }
}

/// A raw database event for a JavaScript asset.
pub fn js_event(uuid: &str, path: &str) -> RawAssetEvent {
    RawAssetEvent {
        importer: JAVASCRIPT_IMPORTER.to_string(),
        ..script_event(uuid, path)
    }
}

/// A raw database event for a non-script asset.
pub fn scene_event(uuid: &str, path: &str) -> RawAssetEvent {
    RawAssetEvent {
        importer: "scene".to_string(),
        ..script_event(uuid, path)
    }
}

/// An already classified change for seeding logs directly.
pub fn change(kind: AssetChangeKind, uuid: &str, path: &str) -> AssetChange {
    AssetChange {
        kind,
        uuid: uuid.to_string(),
        file_path: PathBuf::from(path),
        url: file_url(Path::new(path)).unwrap(),
        importer: TYPESCRIPT_IMPORTER.to_string(),
        is_plugin_script: false,
        old_file_path: None,
        new_file_path: None,
    }
}

pub fn cache_entry(uuid: &str, path: &str) -> ScriptCacheEntry {
    ScriptCacheEntry {
        uuid: uuid.to_string(),
        file_path: PathBuf::from(path),
        url: file_url(Path::new(path)).unwrap(),
        is_plugin_script: false,
        version: None,
        content: None,
    }
}

pub fn plugin_script(uuid: &str, path: &str) -> PluginScriptInfo {
    PluginScriptInfo {
        uuid: uuid.to_string(),
        file_path: PathBuf::from(path),
        url: file_url(Path::new(path)).unwrap(),
    }
}

/// Default initialize options rooted at `project_path`.
pub fn initialize_options(project_path: impl Into<PathBuf>) -> InitializeOptions {
    let project_path = project_path.into();
    let engine_path = project_path.join("engine");
    InitializeOptions {
        project_path,
        engine_path,
        features: Vec::new(),
        config: ScriptConfig::default(),
    }
}
