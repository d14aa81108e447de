//! Mock implementations for testing

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stagehand_scripting::{
    AssetChange, BuildDriver, BuildDriverFactory, BuildError, DriverOptions, EngineModuleLoader,
    ExecutorFactory, LoadError, PluginScriptInfo, ScriptExecutor, SharedSettings, TaskId,
};

/// One `build` call as seen by a [`RecordingBuildDriver`].
#[derive(Debug, Clone)]
pub struct RecordedBuild {
    pub changes: Vec<AssetChange>,
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Default)]
struct DriverState {
    builds: Vec<RecordedBuild>,
    busy: bool,
    current_task_id: Option<TaskId>,
    fail_next_build: Option<String>,
    clear_cache_calls: usize,
    dependencies: HashMap<PathBuf, Vec<PathBuf>>,
    users: HashMap<PathBuf, Vec<PathBuf>>,
    shared_settings: SharedSettings,
}

/// A mock build driver that records every build request.
///
/// Builds succeed immediately unless a failure is queued with
/// [`RecordingBuildDriver::fail_next_build`] or a delay is configured with
/// [`RecordingBuildDriver::with_build_delay`].
#[derive(Debug, Default)]
pub struct RecordingBuildDriver {
    state: Mutex<DriverState>,
    build_delay: Duration,
}

impl RecordingBuildDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A driver whose builds block for `delay` before settling, for tests
    /// that need to observe an in-progress build.
    pub fn with_build_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DriverState::default()),
            build_delay: delay,
        })
    }

    pub fn builds(&self) -> Vec<RecordedBuild> {
        self.state.lock().unwrap().builds.clone()
    }

    pub fn build_count(&self) -> usize {
        self.state.lock().unwrap().builds.len()
    }

    /// Force the busy flag, independent of any running build.
    pub fn set_busy(&self, busy: bool) {
        self.state.lock().unwrap().busy = busy;
    }

    /// Make the next `build` call fail with a compilation error.
    pub fn fail_next_build(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_next_build = Some(message.into());
    }

    pub fn clear_cache_calls(&self) -> usize {
        self.state.lock().unwrap().clear_cache_calls
    }

    pub fn set_dependencies(&self, path: impl Into<PathBuf>, deps: Vec<PathBuf>) {
        self.state.lock().unwrap().dependencies.insert(path.into(), deps);
    }

    pub fn set_users(&self, path: impl Into<PathBuf>, users: Vec<PathBuf>) {
        self.state.lock().unwrap().users.insert(path.into(), users);
    }

    pub fn set_shared_settings(&self, settings: SharedSettings) {
        self.state.lock().unwrap().shared_settings = settings;
    }

    /// Poll until at least `count` builds were recorded or `timeout` elapses.
    /// Returns whether the count was reached.
    pub fn wait_for_builds(&self, count: usize, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.build_count() >= count {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl BuildDriver for RecordingBuildDriver {
    fn build(&self, changes: &[AssetChange], task_id: Option<TaskId>) -> Result<(), BuildError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.busy {
                return Err(BuildError::Busy);
            }
            state.busy = true;
            state.current_task_id = task_id;
        }

        if !self.build_delay.is_zero() {
            std::thread::sleep(self.build_delay);
        }

        let mut state = self.state.lock().unwrap();
        state.busy = false;
        state.current_task_id = None;
        state.builds.push(RecordedBuild {
            changes: changes.to_vec(),
            task_id,
        });
        match state.fail_next_build.take() {
            Some(message) => Err(BuildError::Compilation { message }),
            None => Ok(()),
        }
    }

    fn busy(&self) -> bool {
        self.state.lock().unwrap().busy
    }

    fn current_task_id(&self) -> Option<TaskId> {
        self.state.lock().unwrap().current_task_id
    }

    fn query_script_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .dependencies
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn query_script_users(&self, path: &Path) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn shared_settings(&self) -> SharedSettings {
        self.state.lock().unwrap().shared_settings.clone()
    }

    fn clear_cache(&self) -> Result<(), BuildError> {
        self.state.lock().unwrap().clear_cache_calls += 1;
        Ok(())
    }
}

/// A factory that always hands out the same driver and remembers the
/// options it was created with.
#[derive(Debug)]
pub struct FixedDriverFactory {
    driver: Arc<RecordingBuildDriver>,
    last_options: Mutex<Option<DriverOptions>>,
}

impl FixedDriverFactory {
    pub fn new(driver: Arc<RecordingBuildDriver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            last_options: Mutex::new(None),
        })
    }

    pub fn last_options(&self) -> Option<DriverOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

impl BuildDriverFactory for FixedDriverFactory {
    fn create_driver(&self, options: &DriverOptions) -> Result<Arc<dyn BuildDriver>, BuildError> {
        *self.last_options.lock().unwrap() = Some(options.clone());
        Ok(self.driver.clone())
    }
}

/// Shared observable state of a [`FakeExecutor`].
#[derive(Debug, Default)]
pub struct FakeExecutorState {
    pub globals: BTreeSet<String>,
    /// Bindings the next `reload` call adds to the global namespace.
    pub next_bindings: Vec<String>,
    pub plugin_scripts: Vec<PluginScriptInfo>,
    pub reload_count: usize,
    pub fail_next_reload: Option<String>,
}

/// A mock script executor backed by a plain set of global binding names.
#[derive(Debug)]
pub struct FakeExecutor {
    state: Arc<Mutex<FakeExecutorState>>,
}

impl FakeExecutor {
    pub fn new(state: Arc<Mutex<FakeExecutorState>>) -> Self {
        Self { state }
    }
}

impl ScriptExecutor for FakeExecutor {
    fn set_plugin_scripts(&mut self, scripts: &[PluginScriptInfo]) {
        self.state.lock().unwrap().plugin_scripts = scripts.to_vec();
    }

    fn reload(&mut self) -> Result<(), LoadError> {
        let mut state = self.state.lock().unwrap();
        state.reload_count += 1;
        let bindings = std::mem::take(&mut state.next_bindings);
        state.globals.extend(bindings);
        match state.fail_next_reload.take() {
            Some(message) => Err(LoadError::Reload(message)),
            None => Ok(()),
        }
    }

    fn global_bindings(&self) -> Vec<String> {
        self.state.lock().unwrap().globals.iter().cloned().collect()
    }

    fn remove_global(&mut self, name: &str) {
        self.state.lock().unwrap().globals.remove(name);
    }
}

/// A factory producing [`FakeExecutor`]s that all share one state handle.
///
/// Creation imports the core engine module through the loader, the same
/// preload a real executor performs before running any project script.
#[derive(Debug)]
pub struct FixedExecutorFactory {
    state: Arc<Mutex<FakeExecutorState>>,
    created: AtomicUsize,
    fail_creation: Mutex<Option<String>>,
}

impl FixedExecutorFactory {
    pub fn new(state: Arc<Mutex<FakeExecutorState>>) -> Arc<Self> {
        Arc::new(Self {
            state,
            created: AtomicUsize::new(0),
            fail_creation: Mutex::new(None),
        })
    }

    /// Number of executors handed out so far.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Make the next `create_executor` call fail.
    pub fn fail_creation(&self, message: impl Into<String>) {
        *self.fail_creation.lock().unwrap() = Some(message.into());
    }
}

impl ExecutorFactory for FixedExecutorFactory {
    fn create_executor(
        &self,
        loader: Arc<dyn EngineModuleLoader>,
    ) -> Result<Box<dyn ScriptExecutor>, LoadError> {
        loader.import_engine_module("engine")?;
        if let Some(message) = self.fail_creation.lock().unwrap().take() {
            return Err(LoadError::ExecutorCreation(message));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeExecutor::new(self.state.clone())))
    }
}

/// A module loader that resolves a fixed set of module ids.
#[derive(Debug)]
pub struct StaticModuleLoader {
    known: Vec<String>,
}

impl StaticModuleLoader {
    pub fn new(known: impl IntoIterator<Item = impl Into<String>>) -> Arc<Self> {
        Arc::new(Self {
            known: known.into_iter().map(Into::into).collect(),
        })
    }
}

impl Default for StaticModuleLoader {
    fn default() -> Self {
        Self {
            known: vec!["engine".to_string()],
        }
    }
}

impl EngineModuleLoader for StaticModuleLoader {
    fn import_engine_module(&self, id: &str) -> Result<Box<dyn Any + Send + Sync>, LoadError> {
        if self.known.iter().any(|known| known == id) {
            Ok(Box::new(id.to_string()))
        } else {
            Err(LoadError::EngineModule {
                id: id.to_string(),
                reason: "module is not registered".to_string(),
            })
        }
    }
}
