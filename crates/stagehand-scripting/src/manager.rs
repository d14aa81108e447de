//! Composition root for one project's script subsystem.
//!
//! A [`ScriptManager`] owns the change tracking state, the compile scheduler
//! and the lazily created script executor for exactly one project. Hosting
//! several projects means several managers; nothing here is global.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::ScriptCacheEntry;
use crate::change::{AssetChange, RawAssetEvent, RawChangeKind};
use crate::classifier::ChangeClassifier;
use crate::config::{ScriptConfig, SharedSettings};
use crate::driver::{BuildDriver, BuildDriverFactory, DriverOptions, TaskId};
use crate::error::{Result, ScriptingError};
use crate::events::{CompileEvent, CompileEvents};
use crate::executor::{
    EngineModuleLoader, ExecutorFactory, LoadError, PluginScriptInfo, ScriptExecutor,
};
use crate::globals::GlobalSnapshot;
use crate::scheduler::CompileScheduler;

/// Everything `initialize` needs to stand up the subsystem for one project.
#[derive(Debug, Clone)]
pub struct InitializeOptions {
    pub project_path: PathBuf,
    pub engine_path: PathBuf,
    /// Engine feature set enabled for this project.
    pub features: Vec<String>,
    pub config: ScriptConfig,
}

struct ProjectRuntime {
    driver: Arc<dyn BuildDriver>,
    scheduler: CompileScheduler,
}

struct LoadContext {
    snapshot: GlobalSnapshot,
    executor: Option<Box<dyn ScriptExecutor>>,
}

/// Facade over change tracking, compile scheduling and script loading for
/// one project.
pub struct ScriptManager {
    tracker: Arc<Mutex<ChangeClassifier>>,
    events: Arc<CompileEvents>,
    driver_factory: Arc<dyn BuildDriverFactory>,
    executor_factory: Arc<dyn ExecutorFactory>,
    module_loader: Arc<dyn EngineModuleLoader>,
    runtime: Mutex<Option<ProjectRuntime>>,
    load: Mutex<LoadContext>,
}

impl ScriptManager {
    pub fn new(
        driver_factory: Arc<dyn BuildDriverFactory>,
        executor_factory: Arc<dyn ExecutorFactory>,
        module_loader: Arc<dyn EngineModuleLoader>,
    ) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(ChangeClassifier::new())),
            events: Arc::new(CompileEvents::new()),
            driver_factory,
            executor_factory,
            module_loader,
            runtime: Mutex::new(None),
            load: Mutex::new(LoadContext {
                snapshot: GlobalSnapshot::new(),
                executor: None,
            }),
        }
    }

    /// Stand up the build driver and the compile scheduler.
    ///
    /// Idempotent: the second and later calls are no-ops.
    pub fn initialize(&self, options: InitializeOptions) -> Result<()> {
        let mut runtime = self.runtime.lock().unwrap();
        if runtime.is_some() {
            debug!("Script manager already initialized");
            return Ok(());
        }

        let shared_settings = options.config.resolve_shared_settings(&options.project_path);
        let driver = self.driver_factory.create_driver(&DriverOptions {
            project_path: options.project_path.clone(),
            engine_path: options.engine_path,
            features: options.features,
            shared_settings,
        })?;
        let scheduler = CompileScheduler::new(
            Arc::clone(&driver),
            Arc::clone(&self.tracker),
            Arc::clone(&self.events),
        )?;

        info!(
            project = %options.project_path.display(),
            "Script manager initialized"
        );
        *runtime = Some(ProjectRuntime { driver, scheduler });
        Ok(())
    }

    /// Classify one raw asset event and queue the resulting change.
    ///
    /// Malformed events are logged, dropped and reported to the caller; the
    /// tracked state is never touched by them.
    pub fn dispatch_asset_change(&self, kind: RawChangeKind, event: RawAssetEvent) -> Result<()> {
        let classified = self.tracker.lock().unwrap().classify(kind, event);
        match classified {
            Ok(Some(change)) => {
                debug!(uuid = %change.uuid, kind = ?change.kind, "Queued asset change");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!("Dropped malformed asset event: {err}");
                Err(err)
            }
        }
    }

    /// Compile immediately.
    ///
    /// With an explicit change list the pending log is left alone; without
    /// one the log is drained and restored if the build fails. Build errors
    /// propagate to the caller, including `Busy` when a compile is already
    /// running.
    pub fn compile_scripts(&self, explicit: Option<Vec<AssetChange>>) -> Result<()> {
        let driver = self.driver()?;
        match explicit {
            Some(changes) => {
                debug!(changes = changes.len(), "Compiling explicit change list");
                self.run_build(&driver, &changes, false)
            }
            None => {
                let drained = self.tracker.lock().unwrap().log_mut().begin_drain();
                let Some(changes) = drained else {
                    return Err(ScriptingError::Build(crate::driver::BuildError::Busy));
                };
                self.run_build(&driver, &changes, true)
            }
        }
    }

    /// Request a debounced compile after `delay` of quiet.
    ///
    /// Returns the pending task id; repeated calls before the timer fires
    /// re-arm it and return the same id.
    pub fn post_compile_scripts(&self, delay: Duration) -> Result<TaskId> {
        let runtime = self.runtime.lock().unwrap();
        let runtime = runtime.as_ref().ok_or(ScriptingError::NotInitialized)?;
        Ok(runtime.scheduler.schedule(delay))
    }

    /// Whether the build driver is currently compiling.
    pub fn is_compiling(&self) -> Result<bool> {
        Ok(self.driver()?.busy())
    }

    /// Task id of the build currently running, if any.
    pub fn current_task_id(&self) -> Result<Option<TaskId>> {
        Ok(self.driver()?.current_task_id())
    }

    /// Task id of the debounced compile waiting to fire, if any.
    pub fn pending_task_id(&self) -> Result<Option<TaskId>> {
        let runtime = self.runtime.lock().unwrap();
        let runtime = runtime.as_ref().ok_or(ScriptingError::NotInitialized)?;
        Ok(runtime.scheduler.pending_task_id())
    }

    /// Files that import the script at `path`.
    pub fn query_script_users(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.driver()?.query_script_users(path))
    }

    /// Files imported by the script at `path`.
    pub fn query_script_dependencies(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.driver()?.query_script_dependencies(path))
    }

    /// Settings shared between the editor process and the build pipeline.
    pub fn query_shared_settings(&self) -> Result<SharedSettings> {
        Ok(self.driver()?.shared_settings())
    }

    /// Reload the compiled script graph inside the executor.
    ///
    /// No-op when `script_uuids` is empty. The executor is created lazily on
    /// first use; every reload runs inside a global-namespace snapshot so the
    /// previous generation's bindings are gone before the new one executes.
    pub fn load_script(
        &self,
        script_uuids: &[String],
        plugin_scripts: &[PluginScriptInfo],
    ) -> Result<()> {
        if script_uuids.is_empty() {
            debug!("No scripts need reloading");
            return Ok(());
        }
        debug!(scripts = script_uuids.len(), "Reloading scripts");

        let mut load = self.load.lock().unwrap();
        if load.executor.is_none() {
            info!("Creating script executor");
            let executor = self
                .executor_factory
                .create_executor(Arc::clone(&self.module_loader))?;
            load.executor = Some(executor);
        }

        let LoadContext { snapshot, executor } = &mut *load;
        let Some(executor) = executor else {
            return Err(LoadError::ExecutorCreation("executor unavailable".to_string()).into());
        };
        snapshot.record(executor.as_mut(), |executor| {
            executor.set_plugin_scripts(plugin_scripts);
            executor.reload()
        })?;
        Ok(())
    }

    /// Drop the driver's persistent build artifacts and rebuild.
    ///
    /// The script metadata cache is left alone; the driver owns the
    /// authoritative module graph and rebuilds it from scratch.
    pub fn clear_cache_and_rebuild(&self) -> Result<()> {
        info!("Clearing build cache and rebuilding");
        Ok(self.driver()?.clear_cache()?)
    }

    /// Bulk-seed the metadata cache, bypassing the classifier. Used during
    /// startup synchronization with the asset database.
    pub fn set_script_info_cache(&self, entries: Vec<ScriptCacheEntry>) {
        debug!(entries = entries.len(), "Seeding script metadata cache");
        self.tracker.lock().unwrap().cache_mut().extend(entries);
    }

    /// Bulk-queue already-classified changes, bypassing the classifier.
    pub fn set_asset_changes(&self, changes: Vec<AssetChange>) {
        debug!(changes = changes.len(), "Seeding change log");
        let mut tracker = self.tracker.lock().unwrap();
        for change in changes {
            tracker.log_mut().push(change);
        }
    }

    /// Swallow the next asset notification for `uuid`. Used for writes the
    /// editor performs itself.
    pub fn suppress_next_change(&self, uuid: impl Into<String>) {
        self.tracker.lock().unwrap().suppress_next(uuid);
    }

    /// Evict every cached script under `prefix` and return the evicted
    /// entries. Called when a whole asset database root is removed.
    pub fn detach_database_root(&self, prefix: &Path) -> Vec<ScriptCacheEntry> {
        let removed = self
            .tracker
            .lock()
            .unwrap()
            .cache_mut()
            .remove_by_path_prefix(prefix);
        info!(
            prefix = %prefix.display(),
            entries = removed.len(),
            "Detached database root"
        );
        removed
    }

    /// Compile lifecycle notifications for this project.
    pub fn events(&self) -> Arc<CompileEvents> {
        Arc::clone(&self.events)
    }

    /// Snapshot of the changes waiting for the next compile.
    pub fn pending_changes(&self) -> Vec<AssetChange> {
        self.tracker.lock().unwrap().log().pending().to_vec()
    }

    /// Cached metadata for the script at `path`, if any.
    pub fn cached_script(&self, path: &Path) -> Option<ScriptCacheEntry> {
        self.tracker.lock().unwrap().cache().get(path).cloned()
    }

    /// Stop the scheduler and drop all tracked state.
    ///
    /// Waits for an in-flight debounced build to settle.
    pub fn shutdown(&self) {
        if let Some(mut runtime) = self.runtime.lock().unwrap().take() {
            runtime.scheduler.shutdown();
        }
        self.tracker.lock().unwrap().clear();
        self.load.lock().unwrap().executor = None;
        info!("Script manager shut down");
    }

    fn driver(&self) -> Result<Arc<dyn BuildDriver>> {
        let runtime = self.runtime.lock().unwrap();
        runtime
            .as_ref()
            .map(|runtime| Arc::clone(&runtime.driver))
            .ok_or(ScriptingError::NotInitialized)
    }

    /// Drive one immediate build, with drain bookkeeping when the change
    /// list came from the log.
    fn run_build(
        &self,
        driver: &Arc<dyn BuildDriver>,
        changes: &[AssetChange],
        drained: bool,
    ) -> Result<()> {
        self.events.emit(&CompileEvent::Started {
            task_id: None,
            change_count: changes.len(),
        });

        let outcome = driver.build(changes, None);

        if drained {
            let mut tracker = self.tracker.lock().unwrap();
            match &outcome {
                Ok(()) => tracker.log_mut().commit_drain(),
                Err(_) => tracker.log_mut().abort_drain(),
            }
        }

        match outcome {
            Ok(()) => {
                debug!("Compile finished");
                self.events.emit(&CompileEvent::Finished {
                    task_id: None,
                    error: None,
                });
                Ok(())
            }
            Err(err) => {
                warn!("Compile failed: {err}");
                self.events.emit(&CompileEvent::Finished {
                    task_id: None,
                    error: Some(err.to_string()),
                });
                Err(err.into())
            }
        }
    }
}
