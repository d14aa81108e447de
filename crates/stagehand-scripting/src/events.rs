//! Compile lifecycle notifications.
//!
//! An explicit observer registry instead of a global event emitter: hosts
//! subscribe on the [`crate::manager::ScriptManager`] instance they care
//! about and hold a [`SubscriptionId`] to unsubscribe.

use std::sync::{Arc, Mutex};

use crate::driver::TaskId;

/// Compile lifecycle notification delivered to registered observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileEvent {
    /// A build is about to run. `task_id` is set for debounced builds.
    Started {
        task_id: Option<TaskId>,
        change_count: usize,
    },
    /// The build settled; `error` carries the failure message if it did not
    /// succeed.
    Finished {
        task_id: Option<TaskId>,
        error: Option<String>,
    },
}

impl CompileEvent {
    /// Discriminant of this event, used to scope one-shot subscriptions.
    pub fn kind(&self) -> CompileEventKind {
        match self {
            CompileEvent::Started { .. } => CompileEventKind::Started,
            CompileEvent::Finished { .. } => CompileEventKind::Finished,
        }
    }
}

/// Discriminant for [`CompileEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileEventKind {
    Started,
    Finished,
}

/// Handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CompileEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    listener: Listener,
    once: Option<CompileEventKind>,
}

/// Observer registry for compile lifecycle events.
///
/// Listeners run on the thread that emits the event. The registry lock is
/// not held while they run, so a listener may subscribe or unsubscribe
/// freely.
#[derive(Default)]
pub struct CompileEvents {
    inner: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl CompileEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event.
    pub fn on<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CompileEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener), None)
    }

    /// Register a listener that fires once, on the next event of `kind`.
    /// Events of other kinds pass it by without consuming it.
    pub fn once<F>(&self, kind: CompileEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&CompileEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener), Some(kind))
    }

    /// Unsubscribe. Returns whether the listener was still registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|subscriber| subscriber.id != id);
        inner.subscribers.len() != before
    }

    pub fn emit(&self, event: &CompileEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.lock().unwrap();
            let listeners = inner
                .subscribers
                .iter()
                .filter(|subscriber| subscriber.once.map_or(true, |wanted| wanted == kind))
                .map(|subscriber| Arc::clone(&subscriber.listener))
                .collect();
            inner
                .subscribers
                .retain(|subscriber| subscriber.once != Some(kind));
            listeners
        };
        for listener in listeners {
            listener(event);
        }
    }

    fn register(&self, listener: Listener, once: Option<CompileEventKind>) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.push(Subscriber { id, listener, once });
        id
    }
}
