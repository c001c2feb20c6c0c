//! Cancelable delayed tasks keyed by a generation counter.
//!
//! # Invariants
//! - `cancel` bumps the generation and aborts every pending task.
//! - A task whose generation is stale when its delay elapses does nothing.

use log::debug;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default delay before a viewport requery runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);
/// Default delay before the loading indicator appears.
pub const DEFAULT_INDICATOR_DELAY: Duration = Duration::from_millis(300);

/// Debounces work onto the tokio runtime.
#[derive(Debug, Default)]
pub struct Debouncer {
    generation: Arc<AtomicU64>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Invalidates everything scheduled so far and returns the new generation.
    pub fn cancel(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handles = std::mem::take(&mut *self.pending.lock());
        let aborted = handles.iter().filter(|handle| !handle.is_finished()).count();
        for handle in handles {
            handle.abort();
        }
        if aborted > 0 {
            debug!(
                "event=debounce_cancel module=viewport status=ok generation={} aborted={}",
                generation, aborted
            );
        }
        generation
    }

    /// Runs `task` after `delay` unless `generation` has been superseded.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, generation: u64, delay: Duration, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let current = Arc::clone(&self.generation);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            task().await;
        });

        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Number of scheduled tasks that have not finished.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for handle in self.pending.get_mut().drain(..) {
            handle.abort();
        }
    }
}
