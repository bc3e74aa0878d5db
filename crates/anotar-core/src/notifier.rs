//! Change notification
//!
//! Observers receive the full task snapshot plus the sync flags after every
//! mutation. Delivery is synchronous and ordered: a delivery slot is claimed
//! before the mutation is applied, so notifications go out in the order the
//! mutations happened.
//!
//! Observers may read from the store while being notified, but must not
//! mutate it from inside the callback (spawn a task for that instead).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;

use crate::models::Task;

/// Sync flags sent with every notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// A batch push is running
    pub syncing: bool,
    /// Local changes have not been pushed by a batch yet
    pub pending_mutations: bool,
}

/// Callback invoked with each snapshot
pub type Observer = Arc<dyn Fn(&[Task], SyncStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    observers: Mutex<Vec<(u64, Observer)>>,
}

impl Registry {
    fn observers(&self) -> MutexGuard<'_, Vec<(u64, Observer)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of observers
#[derive(Default)]
pub struct Notifier {
    registry: Arc<Registry>,
    delivery: Mutex<()>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    ///
    /// The observer stays registered until the returned handle is dropped
    /// or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[Task], SyncStatus) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.observers().push((id, Arc::new(observer)));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Claim the next delivery slot
    ///
    /// Hold the returned [`Delivery`] across the mutation it describes, then
    /// call [`Delivery::deliver`].
    pub fn begin(&self) -> Delivery<'_> {
        Delivery {
            _slot: self.delivery.lock().unwrap_or_else(PoisonError::into_inner),
            registry: &self.registry,
        }
    }
}

/// A claimed delivery slot
pub struct Delivery<'a> {
    _slot: MutexGuard<'a, ()>,
    registry: &'a Registry,
}

impl Delivery<'_> {
    /// Invoke every observer, in no particular order
    pub fn deliver(self, tasks: &[Task], status: SyncStatus) {
        let observers: Vec<Observer> = self
            .registry
            .observers()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer(tasks, status);
        }
    }
}

/// Handle that keeps an observer registered
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.observers().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
