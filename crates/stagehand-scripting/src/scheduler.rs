//! Debounced compile scheduling.
//!
//! One worker thread owns a single logical timer. Every `schedule` call
//! re-arms it, so bursts of file churn collapse into one build once the quiet
//! window elapses. The worker checks the driver's busy flag before firing and
//! re-arms on contention instead of queueing a second build.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classifier::ChangeClassifier;
use crate::driver::{BuildDriver, TaskId};
use crate::error::Result;
use crate::events::{CompileEvent, CompileEvents};

enum Command {
    Arm { delay: Duration },
    Shutdown,
}

/// Debounces compile requests against one build driver.
pub struct CompileScheduler {
    commands: Sender<Command>,
    pending: Arc<Mutex<Option<TaskId>>>,
    worker: Option<JoinHandle<()>>,
}

impl CompileScheduler {
    pub fn new(
        driver: Arc<dyn BuildDriver>,
        tracker: Arc<Mutex<ChangeClassifier>>,
        events: Arc<CompileEvents>,
    ) -> Result<Self> {
        let (commands, receiver) = unbounded();
        let pending = Arc::new(Mutex::new(None));
        let worker = thread::Builder::new()
            .name("compile-scheduler".to_string())
            .spawn({
                let pending = Arc::clone(&pending);
                move || run_worker(receiver, driver, tracker, events, pending)
            })?;

        Ok(Self {
            commands,
            pending,
            worker: Some(worker),
        })
    }

    /// Request a compile after `delay` of quiet.
    ///
    /// Re-arms the timer when a request is already pending and returns the
    /// pending task id, so every caller in a burst observes the same id.
    pub fn schedule(&self, delay: Duration) -> TaskId {
        let task_id = {
            let mut pending = self.pending.lock().unwrap();
            *pending.get_or_insert_with(TaskId::new)
        };
        if self.commands.send(Command::Arm { delay }).is_err() {
            warn!("Compile scheduler worker is gone; request dropped");
        }
        debug!(task_id = %task_id, delay_ms = delay.as_millis() as u64, "Scheduled compile");
        task_id
    }

    /// Task id of the debounced request currently waiting to fire, if any.
    pub fn pending_task_id(&self) -> Option<TaskId> {
        *self.pending.lock().unwrap()
    }

    /// Stop the worker. Waits for an in-flight build to settle.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Command::Shutdown);
            if worker.join().is_err() {
                warn!("Compile scheduler worker panicked");
            }
        }
    }
}

impl Drop for CompileScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    commands: Receiver<Command>,
    driver: Arc<dyn BuildDriver>,
    tracker: Arc<Mutex<ChangeClassifier>>,
    events: Arc<CompileEvents>,
    pending: Arc<Mutex<Option<TaskId>>>,
) {
    let mut deadline: Option<Instant> = None;
    let mut armed_delay = Duration::ZERO;

    loop {
        let command = match deadline {
            Some(when) => {
                let now = Instant::now();
                if when <= now {
                    Err(RecvTimeoutError::Timeout)
                } else {
                    commands.recv_timeout(when - now)
                }
            }
            None => commands
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(Command::Arm { delay }) => {
                armed_delay = delay;
                deadline = Some(Instant::now() + delay);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                deadline = fire(&driver, &tracker, &events, &pending, armed_delay);
            }
        }
    }
}

/// Run one debounced compile. Returns the next deadline when the attempt has
/// to be retried because the driver or the change log is busy.
fn fire(
    driver: &Arc<dyn BuildDriver>,
    tracker: &Arc<Mutex<ChangeClassifier>>,
    events: &Arc<CompileEvents>,
    pending: &Arc<Mutex<Option<TaskId>>>,
    armed_delay: Duration,
) -> Option<Instant> {
    if pending.lock().unwrap().is_none() {
        debug!("Stale debounce timer; nothing pending");
        return None;
    }
    if driver.busy() {
        debug!("Build driver busy; re-arming debounced compile");
        return Some(Instant::now() + armed_delay);
    }

    let drained = tracker.lock().unwrap().log_mut().begin_drain();
    let Some(changes) = drained else {
        debug!("Change log drain in flight; re-arming debounced compile");
        return Some(Instant::now() + armed_delay);
    };

    let task_id = pending.lock().unwrap().take();
    info!(
        task_id = ?task_id,
        changes = changes.len(),
        "Running debounced compile"
    );
    events.emit(&CompileEvent::Started {
        task_id,
        change_count: changes.len(),
    });

    let outcome = driver.build(&changes, task_id);

    {
        let mut tracker = tracker.lock().unwrap();
        match &outcome {
            Ok(()) => tracker.log_mut().commit_drain(),
            Err(_) => tracker.log_mut().abort_drain(),
        }
    }

    match outcome {
        Ok(()) => {
            debug!(task_id = ?task_id, "Debounced compile finished");
            events.emit(&CompileEvent::Finished {
                task_id,
                error: None,
            });
        }
        Err(err) => {
            warn!(task_id = ?task_id, "Debounced compile failed: {err}");
            events.emit(&CompileEvent::Finished {
                task_id,
                error: Some(err.to_string()),
            });
        }
    }

    None
}
