pub mod cache;
pub mod change;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod executor;
pub mod globals;
pub mod manager;
pub mod paths;
pub mod scheduler;

pub use cache::{ScriptCacheEntry, ScriptMetadataCache};
pub use change::{AssetChange, AssetChangeKind, ChangeLog, RawAssetEvent, RawChangeKind};
pub use classifier::{ChangeClassifier, JAVASCRIPT_IMPORTER, TYPESCRIPT_IMPORTER};
pub use config::{ImportMap, ResolvedImportMap, ScriptConfig, SharedSettings};
pub use driver::{BuildDriver, BuildDriverFactory, BuildError, DriverOptions, TaskId};
pub use error::{Result, ScriptingError};
pub use events::{CompileEvent, CompileEventKind, CompileEvents, SubscriptionId};
pub use executor::{
    EngineModuleLoader, ExecutorFactory, LoadError, PluginScriptInfo, ScriptExecutor,
};
pub use globals::GlobalSnapshot;
pub use manager::{InitializeOptions, ScriptManager};
pub use scheduler::CompileScheduler;
