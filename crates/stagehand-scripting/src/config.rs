use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use url::Url;

use crate::error::{Result, ScriptingError};
use crate::paths;

/// Per-project script settings, as stored by the host editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Emit class fields with define semantics (default: true)
    #[serde(default = "default_true")]
    pub use_define_for_class_fields: bool,

    /// Keep `declare`-only class fields out of emitted code (default: true)
    #[serde(default = "default_true")]
    pub allow_declare_fields: bool,

    /// Loose transform mode (default: false)
    #[serde(default)]
    pub loose: bool,

    /// Guess named exports for CommonJS modules (default: false)
    #[serde(default)]
    pub guess_common_js_exports: bool,

    /// Conditions used when resolving `exports` fields (default: empty)
    #[serde(default)]
    pub exports_conditions: Vec<String>,

    /// Path to an import-map JSON file, relative to the project root unless
    /// absolute. Empty or absent means the project uses no import map.
    #[serde(default)]
    pub import_map: Option<PathBuf>,

    /// Resolve symlinked scripts by their link path (default: false)
    #[serde(default)]
    pub preserve_symlinks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            use_define_for_class_fields: true,
            allow_declare_fields: true,
            loose: false,
            guess_common_js_exports: false,
            exports_conditions: Vec::new(),
            import_map: None,
            preserve_symlinks: false,
        }
    }
}

impl ScriptConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScriptConfig =
            serde_yaml::from_str(&content).map_err(|e| ScriptingError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Resolve the settings shared with the build pipeline, loading the
    /// import map from disk when one is configured.
    ///
    /// Import-map problems are reported but never fatal; the settings are
    /// returned without one.
    pub fn resolve_shared_settings(&self, project_path: &Path) -> SharedSettings {
        SharedSettings {
            use_define_for_class_fields: self.use_define_for_class_fields,
            allow_declare_fields: self.allow_declare_fields,
            loose: self.loose,
            guess_common_js_exports: self.guess_common_js_exports,
            exports_conditions: self.exports_conditions.clone(),
            import_map: self.resolve_import_map(project_path),
            preserve_symlinks: self.preserve_symlinks,
        }
    }

    fn resolve_import_map(&self, project_path: &Path) -> Option<ResolvedImportMap> {
        let configured = match &self.import_map {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return None,
        };
        let file = if configured.is_absolute() {
            configured.clone()
        } else {
            project_path.join(configured)
        };
        let file = paths::normalize(&file);
        if !file.exists() {
            warn!("Import map file not found in: {}", file.display());
            return None;
        }
        load_import_map(&file)
    }
}

/// Settings shared between the editor process and the build pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSettings {
    pub use_define_for_class_fields: bool,
    pub allow_declare_fields: bool,
    pub loose: bool,
    pub guess_common_js_exports: bool,
    pub exports_conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_map: Option<ResolvedImportMap>,
    pub preserve_symlinks: bool,
}

impl Default for SharedSettings {
    fn default() -> Self {
        ScriptConfig::default().resolve_shared_settings(Path::new(""))
    }
}

/// An import map together with the URL it was loaded from, so the build
/// pipeline can resolve relative targets against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedImportMap {
    pub json: ImportMap,
    pub url: Url,
}

/// Import-map contents. Entry order is preserved because specifier
/// resolution is order-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: IndexMap<String, String>,
    #[serde(default)]
    pub scopes: IndexMap<String, IndexMap<String, String>>,
}

fn load_import_map(file: &Path) -> Option<ResolvedImportMap> {
    let json: serde_json::Value = match std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(json) => json,
        Err(err) => {
            error!("Failed to load import map at {}: {err}", file.display());
            return None;
        }
    };
    // Shape check only: unknown keys are tolerated, non-string targets are not.
    let Ok(import_map) = serde_json::from_value::<ImportMap>(json) else {
        error!("Ill-formed import map.");
        return None;
    };
    let url = paths::file_url(file).ok()?;
    Some(ResolvedImportMap {
        json: import_map,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ScriptConfig::default();
        assert!(config.use_define_for_class_fields);
        assert!(config.allow_declare_fields);
        assert!(!config.loose);
        assert!(!config.guess_common_js_exports);
        assert!(config.exports_conditions.is_empty());
        assert!(config.import_map.is_none());
        assert!(!config.preserve_symlinks);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
useDefineForClassFields: false
exportsConditions:
  - editor
"#;
        let config: ScriptConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.use_define_for_class_fields);
        assert!(config.allow_declare_fields);
        assert_eq!(config.exports_conditions, vec!["editor".to_string()]);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script-config.yaml");
        std::fs::write(&path, "loose: true\n").unwrap();
        let config = ScriptConfig::from_file(&path).unwrap();
        assert!(config.loose);
    }

    #[test]
    fn test_shared_settings_defaults() {
        let settings = SharedSettings::default();
        assert!(settings.use_define_for_class_fields);
        assert!(settings.allow_declare_fields);
        assert!(!settings.loose);
        assert!(settings.import_map.is_none());
    }

    #[test]
    fn test_resolve_import_map() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("import-map.json");
        let mut handle = std::fs::File::create(&file).unwrap();
        write!(
            handle,
            r#"{{"imports": {{"engine": "./engine/index.js"}}, "scopes": {{"./vendor/": {{"lodash": "./vendor/lodash.js"}}}}}}"#
        )
        .unwrap();

        let config = ScriptConfig {
            import_map: Some(PathBuf::from("import-map.json")),
            ..ScriptConfig::default()
        };
        let settings = config.resolve_shared_settings(dir.path());
        let resolved = settings.import_map.expect("import map should resolve");
        assert_eq!(resolved.json.imports["engine"], "./engine/index.js");
        assert_eq!(resolved.json.scopes["./vendor/"]["lodash"], "./vendor/lodash.js");
        assert_eq!(resolved.url.scheme(), "file");
    }

    #[test]
    fn test_ill_formed_import_map_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("import-map.json");
        std::fs::write(&file, r#"{"imports": {"engine": 42}}"#).unwrap();

        let config = ScriptConfig {
            import_map: Some(file),
            ..ScriptConfig::default()
        };
        let settings = config.resolve_shared_settings(dir.path());
        assert!(settings.import_map.is_none());
    }

    #[test]
    fn test_missing_import_map_is_skipped() {
        let config = ScriptConfig {
            import_map: Some(PathBuf::from("/definitely/not/here.json")),
            ..ScriptConfig::default()
        };
        let settings = config.resolve_shared_settings(Path::new("/tmp"));
        assert!(settings.import_map.is_none());
    }
}
