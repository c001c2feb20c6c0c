//! Lazily loaded, shared dataset store.
//!
//! # Invariants
//! - At most one load runs at a time; concurrent callers wait for it.
//! - The load runs in its own task, so a caller dropped mid-load does not
//!   cancel it for the others.
//! - Every caller waiting on a load observes the same outcome.
//! - A failed load leaves the slot empty so a later call retries.

use crate::dataset::{DatasetSource, DatasetStore, InitializationError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::watch;

const MAX_PANIC_MESSAGE_CHARS: usize = 200;

type LoadOutcome = Result<Arc<DatasetStore>, InitializationError>;
type OutcomeSender = Arc<watch::Sender<Option<LoadOutcome>>>;

enum Slot {
    Empty,
    Loading(OutcomeSender),
    Ready(Arc<DatasetStore>),
}

/// Dataset store initialized on first use.
pub struct LazyDatasetStore {
    slot: Arc<Mutex<Slot>>,
}

impl Default for LazyDatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyDatasetStore {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Empty)),
        }
    }

    /// Store already populated with `store`.
    pub fn ready(store: DatasetStore) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Ready(Arc::new(store)))),
        }
    }

    /// Loaded store, if any.
    pub fn get(&self) -> Option<Arc<DatasetStore>> {
        match &*self.slot.lock() {
            Slot::Ready(store) => Some(Arc::clone(store)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    /// Returns the loaded store, starting a load from `source` if none is
    /// loaded or in flight. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `LoadPanicked` when the load this call waited on panicked. A later
    ///   call retries.
    pub async fn get_or_load(&self, source: Arc<dyn DatasetSource>) -> LoadOutcome {
        loop {
            let mut receiver = {
                let mut slot = self.slot.lock();
                match &*slot {
                    Slot::Ready(store) => return Ok(Arc::clone(store)),
                    Slot::Loading(sender) => {
                        debug!("event=dataset_init_wait module=dataset status=pending");
                        sender.subscribe()
                    }
                    Slot::Empty => {
                        let (sender, receiver) = watch::channel(None);
                        let sender = Arc::new(sender);
                        *slot = Slot::Loading(Arc::clone(&sender));
                        spawn_load(Arc::clone(&self.slot), Arc::clone(&source), sender);
                        receiver
                    }
                }
            };

            loop {
                let published = receiver.borrow_and_update().clone();
                match published {
                    Some(Err(InitializationError::Abandoned)) => break,
                    Some(outcome) => return outcome,
                    None => {}
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

fn spawn_load(slot: Arc<Mutex<Slot>>, source: Arc<dyn DatasetSource>, sender: OutcomeSender) {
    let load = tokio::spawn(async move { DatasetStore::load(source.as_ref()).await });
    tokio::spawn(async move {
        let guard = LoadGuard {
            slot,
            sender,
            finished: false,
        };
        let outcome = match load.await {
            Ok(store) => Ok(Arc::new(store)),
            Err(err) if err.is_panic() => Err(InitializationError::LoadPanicked(panic_message(
                err.into_panic().as_ref(),
            ))),
            Err(_) => Err(InitializationError::Abandoned),
        };
        guard.finish(outcome);
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    message
        .replace(['\n', '\r'], " ")
        .chars()
        .take(MAX_PANIC_MESSAGE_CHARS)
        .collect()
}

/// Publishes the load outcome, or `Abandoned` if the load task is dropped.
struct LoadGuard {
    slot: Arc<Mutex<Slot>>,
    sender: OutcomeSender,
    finished: bool,
}

impl LoadGuard {
    fn finish(mut self, outcome: LoadOutcome) {
        self.publish(outcome);
        self.finished = true;
    }

    fn publish(&self, outcome: LoadOutcome) {
        let mut slot = self.slot.lock();
        *slot = match &outcome {
            Ok(store) => Slot::Ready(Arc::clone(store)),
            Err(err) => {
                warn!("event=dataset_init module=dataset status=error error={}", err);
                Slot::Empty
            }
        };
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.publish(Err(InitializationError::Abandoned));
        }
    }
}
