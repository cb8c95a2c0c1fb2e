//! Owned, replaceable background tasks
//!
//! The renewal timer and the in-flight token exchange each live in a
//! `TaskSlot`. Arming a slot aborts whatever it held, so at most one task per
//! slot is ever live. A task that completes on its own releases the slot by
//! id, which never touches a newer task.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Custom tokens minted for the downstream backend expire after one hour.
/// The renewal delay is measured from when the timer is armed.
pub const DOWNSTREAM_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

pub(crate) struct TaskSlot {
    name: &'static str,
    current: Mutex<Option<(u64, JoinHandle<()>)>>,
    next_id: AtomicU64,
}

impl TaskSlot {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Abort the held task, if any, and install the one returned by `spawn`.
    /// `spawn` receives the id the new task must use for `release`/`is_current`.
    pub(crate) fn replace_with<F>(&self, spawn: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut current = self.lock();
        if let Some((old, handle)) = current.take() {
            handle.abort();
            debug!(slot = self.name, task = old, "aborted superseded task");
        }
        *current = Some((id, spawn(id)));
        id
    }

    /// Abort the held task. Returns whether one was held.
    pub(crate) fn cancel(&self) -> bool {
        match self.lock().take() {
            Some((id, handle)) => {
                handle.abort();
                debug!(slot = self.name, task = id, "cancelled task");
                true
            }
            None => false,
        }
    }

    /// Clear the slot if it still holds task `id`, without aborting it.
    /// Returns false if the task was superseded or cancelled.
    pub(crate) fn release(&self, id: u64) -> bool {
        let mut current = self.lock();
        match current.as_ref() {
            Some((held, _)) if *held == id => {
                current.take();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_current(&self, id: u64) -> bool {
        matches!(self.lock().as_ref(), Some((held, _)) if *held == id)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(u64, JoinHandle<()>)>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
