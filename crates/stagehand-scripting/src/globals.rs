//! Global-namespace hygiene across script reloads.
//!
//! A reload replaces the whole executed script graph, but bindings the
//! previous generation put on the global namespace would survive it.
//! [`GlobalSnapshot`] diffs the namespace around each load and removes the
//! previous generation's bindings before the next one runs.

use std::collections::BTreeSet;
use tracing::debug;

use crate::executor::{LoadError, ScriptExecutor};

/// Tracks the global bindings introduced by the most recent recorded load.
#[derive(Debug, Default)]
pub struct GlobalSnapshot {
    introduced: BTreeSet<String>,
}

impl GlobalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `load` with namespace tracking.
    ///
    /// Bindings introduced by the previous recorded load are removed first.
    /// Whatever the load leaves on the namespace beyond the pre-load snapshot
    /// becomes the new introduced set - also when `load` fails, so the next
    /// call still cleans up after a partial execution. The load's outcome is
    /// returned unchanged.
    pub fn record<F>(
        &mut self,
        executor: &mut dyn ScriptExecutor,
        load: F,
    ) -> Result<(), LoadError>
    where
        F: FnOnce(&mut dyn ScriptExecutor) -> Result<(), LoadError>,
    {
        for name in std::mem::take(&mut self.introduced) {
            executor.remove_global(&name);
        }

        let before: BTreeSet<String> = executor.global_bindings().into_iter().collect();
        let outcome = load(executor);

        self.introduced = executor
            .global_bindings()
            .into_iter()
            .filter(|name| !before.contains(name))
            .collect();
        if !self.introduced.is_empty() {
            debug!("Incremental global bindings: {:?}", self.introduced);
        }

        outcome
    }

    /// Bindings introduced by the most recent recorded load.
    pub fn introduced(&self) -> &BTreeSet<String> {
        &self.introduced
    }
}
