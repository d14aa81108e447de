//! Build-driver contract.
//!
//! The build driver is the external dependency/compilation engine. This crate
//! never compiles scripts itself; it classifies changes, schedules builds and
//! hands the drained change set to a [`BuildDriver`] implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::change::AssetChange;
use crate::config::SharedSettings;

/// Correlation identifier for one scheduled compile request.
///
/// A pending debounced task keeps its id across timer re-arms; the id is
/// consumed when the compile fires and a fresh one is minted for the next
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        TaskId::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("A build is already in progress")]
    Busy,

    #[error("Compilation failed: {message}")]
    Compilation { message: String },

    #[error("Build driver IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a driver factory needs to stand up the build pipeline for one
/// project.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub project_path: PathBuf,
    pub engine_path: PathBuf,
    /// Engine feature set enabled for this project.
    pub features: Vec<String>,
    pub shared_settings: SharedSettings,
}

/// External build engine boundary - allows mocking for tests.
///
/// The driver owns the authoritative module graph and the busy flag that
/// arbitrates between the immediate and debounced compile paths.
pub trait BuildDriver: Send + Sync {
    /// Compile the given change set. Blocks until the build settles and
    /// returns [`BuildError::Busy`] when another build is already running.
    fn build(&self, changes: &[AssetChange], task_id: Option<TaskId>) -> Result<(), BuildError>;

    /// Whether a build is currently in progress.
    fn busy(&self) -> bool;

    /// Task id of the build in progress, if any.
    fn current_task_id(&self) -> Option<TaskId>;

    /// Files imported by the script at `path`.
    fn query_script_dependencies(&self, path: &Path) -> Vec<PathBuf>;

    /// Files that import the script at `path`.
    fn query_script_users(&self, path: &Path) -> Vec<PathBuf>;

    /// Settings shared between the editor process and the build pipeline.
    fn shared_settings(&self) -> SharedSettings;

    /// Drop the driver's persistent build artifacts and rebuild from scratch.
    fn clear_cache(&self) -> Result<(), BuildError>;
}

pub trait BuildDriverFactory: Send + Sync {
    fn create_driver(&self, options: &DriverOptions) -> Result<Arc<dyn BuildDriver>, BuildError>;
}
