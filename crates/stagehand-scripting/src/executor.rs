//! Script-executor and engine-module-loader contracts.
//!
//! The executor runs compiled project scripts inside the editor process.
//! [`crate::manager::ScriptManager`] creates it lazily on the first
//! `load_script` call and wraps every reload in a global-namespace snapshot.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Scripts flagged via asset user data to run outside the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginScriptInfo {
    pub uuid: String,
    pub file_path: PathBuf,
    pub url: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to create script executor: {0}")]
    ExecutorCreation(String),

    #[error("Failed to import engine module `{id}`: {reason}")]
    EngineModule { id: String, reason: String },

    #[error("Script reload failed: {0}")]
    Reload(String),
}

/// Resolves engine-internal module identifiers - allows mocking for tests.
///
/// Used only while loading scripts; the module value is opaque to this crate.
pub trait EngineModuleLoader: Send + Sync {
    fn import_engine_module(&self, id: &str) -> Result<Box<dyn Any + Send + Sync>, LoadError>;
}

/// Runs the compiled script graph and exposes its global namespace.
pub trait ScriptExecutor: Send {
    fn set_plugin_scripts(&mut self, scripts: &[PluginScriptInfo]);

    /// Re-execute the current script graph. Side effects on the global
    /// namespace are tracked by the caller.
    fn reload(&mut self) -> Result<(), LoadError>;

    /// Names of every binding currently present in the executor's global
    /// namespace.
    fn global_bindings(&self) -> Vec<String>;

    fn remove_global(&mut self, name: &str);
}

pub trait ExecutorFactory: Send + Sync {
    fn create_executor(
        &self,
        loader: Arc<dyn EngineModuleLoader>,
    ) -> Result<Box<dyn ScriptExecutor>, LoadError>;
}
