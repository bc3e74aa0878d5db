//! Task store
//!
//! The `TaskStore` is the sync engine's entry point. It owns the task
//! collection and coordinates:
//! - the remote store (list, upsert, delete)
//! - the credential provider (token lookup, sign-out)
//! - the notifier (observers of snapshots and sync flags)
//! - the sync timer (periodic batch pushes)
//!
//! ## Write paths
//!
//! Edits are optimistic: the collection changes and observers are notified
//! before any network call. The edited task is then pushed on its own; a
//! failed push is only logged, because the next periodic flush re-pushes
//! every task anyway.
//!
//! Immediate pushes and the periodic flush are independent writers to the
//! same remote records and are not serialized against each other. Remote
//! writes are last-write-wins by id and local state already holds the latest
//! edit, so the remote side converges once the last write lands.
//!
//! ## Usage
//!
//! ```ignore
//! let credentials = Arc::new(TokenFile::from_config(&config));
//! let remote = Arc::new(HttpRemoteClient::new(&endpoint, credentials.clone())?);
//! let store = TaskStore::new(remote, credentials);
//!
//! let _sub = store.subscribe(|tasks, status| render(tasks, status));
//! store.load().await?;
//! store.start_autosave(config.sync_interval());
//!
//! let task = store.add().await;
//! store.set_task(&task.id, TaskField::Name, json!("Buy milk")).await;
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collection::{LookupError, TaskCollection};
use crate::credentials::CredentialProvider;
use crate::models::{Task, TaskField};
use crate::notifier::{Notifier, Subscription, SyncStatus};
use crate::remote::{RemoteResult, RemoteStore};
use crate::sync::SyncScheduler;

/// What happened to a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Removed locally and remotely
    Deleted,
    /// Nothing done: no task has that id
    NotFound,
    /// Nothing done: no session
    Skipped,
    /// Removed locally; the session had expired and was signed out
    SignedOut,
    /// The remote delete failed, so the task list was put back
    RolledBack { reason: String },
}

/// Result of one batch push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlushReport {
    pub pushed: usize,
    pub failed: usize,
}

/// Sync engine handle
///
/// Cheap to clone; clones share the same collection.
#[derive(Clone)]
pub struct TaskStore {
    shared: Arc<Shared>,
}

struct Shared {
    collection: Mutex<TaskCollection>,
    notifier: Notifier,
    scheduler: SyncScheduler,
    remote: Arc<dyn RemoteStore>,
    credentials: Arc<dyn CredentialProvider>,
}

impl TaskStore {
    /// Create an empty store
    pub fn new(remote: Arc<dyn RemoteStore>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            shared: Arc::new(Shared {
                collection: Mutex::new(TaskCollection::new()),
                notifier: Notifier::new(),
                scheduler: SyncScheduler::new(),
                remote,
                credentials,
            }),
        }
    }

    // ==================== Observation ====================

    /// Register an observer for snapshots and sync flags
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&[Task], SyncStatus) + Send + Sync + 'static,
    {
        self.shared.notifier.subscribe(observer)
    }

    /// Copy of the current task list
    pub fn snapshot(&self) -> Vec<Task> {
        self.collection().snapshot()
    }

    /// Current sync flags
    pub fn status(&self) -> SyncStatus {
        self.collection().status()
    }

    /// Find a task by id or unique id prefix
    pub fn find(&self, id_or_prefix: &str) -> Result<Task, LookupError> {
        self.collection().resolve(id_or_prefix).cloned()
    }

    // ==================== Operations ====================

    /// Replace the task list with the remote snapshot
    ///
    /// Without a session this does nothing and returns no tasks. An expired
    /// session is signed out before the error is returned; callers can tell
    /// the two failure kinds apart with [`RemoteError::is_auth_failure`].
    ///
    /// [`RemoteError::is_auth_failure`]: crate::remote::RemoteError::is_auth_failure
    pub async fn load(&self) -> RemoteResult<Vec<Task>> {
        if self.shared.credentials.token().is_none() {
            warn!("Not loading tasks: no session token");
            return Ok(Vec::new());
        }

        let tasks = match self.shared.remote.list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(error = %e, "Session expired while loading tasks, signing out");
                    self.shared.credentials.sign_out();
                } else {
                    warn!(error = %e, "Failed to load tasks");
                }
                return Err(e);
            }
        };

        info!(count = tasks.len(), "Loaded tasks");
        let loaded = self.commit(|collection| {
            collection.replace_all(tasks);
            Some(collection.snapshot())
        });
        Ok(loaded.unwrap_or_default())
    }

    /// Create a blank task at the end of the list and push it
    pub async fn add(&self) -> Task {
        let task = Task::new();
        self.commit(|collection| {
            collection.append(task.clone());
            Some(())
        });
        debug!(task_id = %task.id, "Added task");

        self.push(&task).await;
        task
    }

    /// Write a raw value into one field of a task and push the task
    ///
    /// Returns the updated task, or `None` if no task has that id.
    pub async fn set_task(&self, id: &str, field: TaskField, value: Value) -> Option<Task> {
        let Some(updated) = self.commit(|collection| collection.set_field(id, field, &value))
        else {
            debug!(task_id = %id, %field, "Ignoring edit of unknown task");
            return None;
        };

        self.push(&updated).await;
        Some(updated)
    }

    /// Flip a task between complete and incomplete
    ///
    /// Tasks without a goal toggle progress between 0 and 100; tasks with a
    /// goal toggle between 0 and the goal.
    pub async fn toggle_complete(&self, id: &str) -> Option<Task> {
        let target = self.collection().get(id).map(Task::toggled_progress)?;
        self.set_task(id, TaskField::Progress, Value::from(target))
            .await
    }

    /// Remove a task locally, then remotely
    ///
    /// Unknown ids are ignored without a network call. An expired session is
    /// signed out. Any other failure puts the whole pre-delete list back and
    /// notifies again.
    pub async fn delete_task(&self, id: &str) -> DeleteOutcome {
        if self.shared.credentials.token().is_none() {
            warn!(task_id = %id, "Not deleting task: no session token");
            return DeleteOutcome::Skipped;
        }

        let Some(previous) = self.commit(|collection| {
            collection.get(id).is_some().then(|| collection.remove(id))
        }) else {
            debug!(task_id = %id, "Ignoring delete of unknown task");
            return DeleteOutcome::NotFound;
        };

        match self.shared.remote.remove(id).await {
            Ok(()) => {
                info!(task_id = %id, "Deleted task");
                DeleteOutcome::Deleted
            }
            Err(e) if e.is_auth_failure() => {
                warn!(task_id = %id, error = %e, "Session expired while deleting task, signing out");
                self.shared.credentials.sign_out();
                DeleteOutcome::SignedOut
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Delete failed, restoring task list");
                self.commit(|collection| {
                    collection.restore(previous);
                    Some(())
                });
                DeleteOutcome::RolledBack {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Push every task if changes are pending and no push is running
    ///
    /// Returns `None` when skipped. Tasks are pushed one at a time, in list
    /// order, and the list is re-read before each push so edits, additions
    /// and deletions made in the meantime are honored. Every task still in
    /// the list is pushed exactly once per batch. Individual failures are
    /// logged and do not stop the batch; pending mutations are cleared
    /// either way.
    pub async fn flush(&self) -> Option<FlushReport> {
        self.commit(|collection| collection.begin_push().then_some(()))?;
        debug!("Flushing all tasks");

        // Visited ids rather than a position: deletes and rollbacks during
        // the batch reshuffle the list
        let mut visited: HashSet<String> = HashSet::new();
        let mut report = FlushReport::default();
        loop {
            let next = self.collection().first_not_in(&visited).cloned();
            let Some(task) = next else {
                break;
            };
            visited.insert(task.id.clone());

            match self.shared.remote.upsert(&task).await {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Failed to push task during flush");
                    report.failed += 1;
                }
            }
        }

        self.commit(|collection| {
            collection.finish_push();
            Some(())
        });

        if report.failed > 0 {
            warn!(
                pushed = report.pushed,
                failed = report.failed,
                "Flush finished with failures"
            );
        } else {
            info!(pushed = report.pushed, "Flush complete");
        }
        Some(report)
    }

    // ==================== Autosave ====================

    /// Start flushing every `period`
    ///
    /// Returns `false` if autosave is already running. Must be called from
    /// within a Tokio runtime.
    pub fn start_autosave(&self, period: Duration) -> bool {
        let store = Arc::downgrade(&self.shared);
        self.shared.scheduler.start(period, move || {
            let store = store.clone();
            async move {
                if let Some(shared) = store.upgrade() {
                    TaskStore { shared }.flush().await;
                }
            }
        })
    }

    /// Stop the autosave timer
    pub fn stop_autosave(&self) {
        self.shared.scheduler.stop();
    }

    /// Whether the autosave timer is running
    pub fn is_autosaving(&self) -> bool {
        self.shared.scheduler.is_running()
    }

    // ==================== Internals ====================

    fn collection(&self) -> MutexGuard<'_, TaskCollection> {
        self.shared
            .collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a mutation and notify observers if it reports a change
    ///
    /// The delivery slot is claimed before the collection is locked, so
    /// notifications go out in mutation order and observers can read the
    /// store while being notified.
    fn commit<R>(&self, mutate: impl FnOnce(&mut TaskCollection) -> Option<R>) -> Option<R> {
        let delivery = self.shared.notifier.begin();
        let (result, tasks, status) = {
            let mut collection = self.collection();
            let result = mutate(&mut collection)?;
            (result, collection.snapshot(), collection.status())
        };
        delivery.deliver(&tasks, status);
        Some(result)
    }

    /// Push a single task, logging failures
    async fn push(&self, task: &Task) {
        if let Err(e) = self.shared.remote.upsert(task).await {
            warn!(task_id = %task.id, error = %e, "Failed to push task, next flush will retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::models::Priority;
    use crate::remote::RemoteError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Semaphore;

    fn remote_error(status: u16, message: &str) -> RemoteError {
        RemoteError::Remote {
            status,
            message: message.to_string(),
        }
    }

    /// In-process stand-in for the remote store
    #[derive(Default)]
    struct FakeRemote {
        listing: Mutex<Vec<Task>>,
        list_error: Mutex<Option<(u16, String)>>,
        upserts: Mutex<Vec<Task>>,
        fail_upserts: AtomicBool,
        removes: Mutex<Vec<String>>,
        remove_error: Mutex<Option<(u16, String)>>,
        gate: Mutex<Option<Arc<Semaphore>>>,
    }

    impl FakeRemote {
        fn with_listing(tasks: Vec<Task>) -> Arc<Self> {
            let remote = Self::default();
            *remote.listing.lock().unwrap() = tasks;
            Arc::new(remote)
        }

        fn upserts(&self) -> Vec<Task> {
            self.upserts.lock().unwrap().clone()
        }

        fn upsert_count(&self) -> usize {
            self.upserts.lock().unwrap().len()
        }

        fn removes(&self) -> Vec<String> {
            self.removes.lock().unwrap().clone()
        }

        /// Make upserts block until permits are added
        fn close_gate(&self) -> Arc<Semaphore> {
            let gate = Arc::new(Semaphore::new(0));
            *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn list(&self) -> RemoteResult<Vec<Task>> {
            if let Some((status, message)) = self.list_error.lock().unwrap().clone() {
                return Err(remote_error(status, &message));
            }
            Ok(self.listing.lock().unwrap().clone())
        }

        async fn upsert(&self, task: &Task) -> RemoteResult<()> {
            self.upserts.lock().unwrap().push(task.clone());
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await;
            }
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(remote_error(500, "boom"));
            }
            Ok(())
        }

        async fn remove(&self, id: &str) -> RemoteResult<()> {
            self.removes.lock().unwrap().push(id.to_string());
            match self.remove_error.lock().unwrap().clone() {
                Some((status, message)) => Err(remote_error(status, &message)),
                None => Ok(()),
            }
        }
    }

    fn task(id: &str, progress: u64, goal: u64) -> Task {
        let mut task = Task::with_id(id);
        task.progress = progress;
        task.goal = goal;
        task
    }

    fn store(remote: &Arc<FakeRemote>) -> (TaskStore, Arc<StaticCredentials>) {
        let credentials = Arc::new(StaticCredentials::new("tok"));
        let store = TaskStore::new(remote.clone(), credentials.clone());
        (store, credentials)
    }

    fn record_statuses(store: &TaskStore) -> (Arc<Mutex<Vec<SyncStatus>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |_, status| sink.lock().unwrap().push(status));
        (seen, sub)
    }

    async fn wait_for_upserts(remote: &FakeRemote, count: usize) {
        while remote.upsert_count() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_load_replaces_collection() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        let (store, _) = store(&remote);
        let (seen, _sub) = record_statuses(&store);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.snapshot(), loaded);
        assert!(!store.status().pending_mutations);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_without_token_is_noop() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let store = TaskStore::new(remote.clone(), Arc::new(StaticCredentials::anonymous()));

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_load_auth_failure_signs_out() {
        let remote = FakeRemote::with_listing(vec![]);
        *remote.list_error.lock().unwrap() = Some((401, "Unauthorized".to_string()));
        let (store, credentials) = store(&remote);

        let err = store.load().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(credentials.token().is_none());
    }

    #[tokio::test]
    async fn test_load_other_failure_keeps_session() {
        let remote = FakeRemote::with_listing(vec![]);
        *remote.list_error.lock().unwrap() = Some((500, "Internal error".to_string()));
        let (store, credentials) = store(&remote);

        let err = store.load().await.unwrap_err();
        assert!(!err.is_auth_failure());
        assert_eq!(err.status(), Some(500));
        assert!(credentials.token().is_some());
    }

    #[tokio::test]
    async fn test_add_appends_blank_task_and_pushes() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();

        let added = store.add().await;
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].id, added.id, "new tasks go at the end");

        assert_eq!(added.progress, 0);
        assert_eq!(added.goal, 0);
        assert!(added.due_date.is_none());
        assert_eq!(added.priority, Priority::Medium);

        assert_eq!(remote.upserts(), vec![added]);
        assert!(store.status().pending_mutations);
    }

    #[tokio::test]
    async fn test_failed_immediate_push_is_swallowed() {
        let remote = FakeRemote::with_listing(vec![]);
        remote.fail_upserts.store(true, Ordering::SeqCst);
        let (store, _) = store(&remote);

        let added = store.add().await;
        assert_eq!(store.snapshot(), vec![added]);
        assert!(store.status().pending_mutations);
    }

    #[tokio::test]
    async fn test_set_task_is_visible_before_push_completes() {
        let remote = FakeRemote::with_listing(vec![task("A", 5, 10), task("B", 100, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        let b_before = store.find("B").unwrap();
        let gate = remote.close_gate();

        let edit = tokio::spawn({
            let store = store.clone();
            async move { store.set_task("A", TaskField::Progress, json!("7")).await }
        });
        wait_for_upserts(&remote, 1).await;

        // The push is still blocked, the local state already reflects the edit
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].progress, 7);
        assert_eq!(snapshot[1], b_before);

        gate.add_permits(1);
        let updated = edit.await.unwrap().unwrap();
        assert_eq!(updated.progress, 7);
        assert_eq!(remote.upserts()[0].progress, 7);
    }

    #[tokio::test]
    async fn test_set_task_coercions() {
        let remote = FakeRemote::with_listing(vec![task("A", 5, 10)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();

        store.set_task("A", TaskField::Goal, Value::Null).await;
        assert_eq!(store.find("A").unwrap().goal, 0);

        store.set_task("A", TaskField::Progress, json!("abc")).await;
        assert_eq!(store.find("A").unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_set_unknown_task_is_noop() {
        let remote = FakeRemote::with_listing(vec![task("A", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        let (seen, _sub) = record_statuses(&store);

        assert!(store
            .set_task("missing", TaskField::Name, json!("x"))
            .await
            .is_none());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(remote.upsert_count(), 0);
        assert!(!store.status().pending_mutations);
    }

    #[tokio::test]
    async fn test_toggle_complete() {
        let remote = FakeRemote::with_listing(vec![task("plain", 0, 0), task("goal", 3, 8)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();

        assert_eq!(store.toggle_complete("plain").await.unwrap().progress, 100);
        assert_eq!(store.toggle_complete("plain").await.unwrap().progress, 0);
        assert_eq!(store.toggle_complete("goal").await.unwrap().progress, 8);
        assert!(store.toggle_complete("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_success() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();

        assert_eq!(store.delete_task("a").await, DeleteOutcome::Deleted);
        assert!(store.snapshot().iter().all(|t| t.id != "a"));
        assert_eq!(remote.removes(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_delete_failure_rolls_back() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        *remote.remove_error.lock().unwrap() = Some((500, "Internal error".to_string()));
        let (store, credentials) = store(&remote);
        store.load().await.unwrap();
        let before = store.snapshot();
        let (seen, _sub) = record_statuses(&store);

        let outcome = store.delete_task("a").await;
        assert!(matches!(outcome, DeleteOutcome::RolledBack { .. }));
        assert_eq!(store.snapshot(), before);
        assert_eq!(seen.lock().unwrap().len(), 2, "removal and restore both notify");
        assert!(credentials.token().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_session_signs_out() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        *remote.remove_error.lock().unwrap() = Some((403, "Token expired".to_string()));
        let (store, credentials) = store(&remote);
        store.load().await.unwrap();

        assert_eq!(store.delete_task("a").await, DeleteOutcome::SignedOut);
        assert!(credentials.token().is_none());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_token_is_skipped() {
        let remote = FakeRemote::with_listing(vec![]);
        let store = TaskStore::new(remote.clone(), Arc::new(StaticCredentials::anonymous()));

        assert_eq!(store.delete_task("a").await, DeleteOutcome::Skipped);
        assert!(remote.removes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_task() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        let (seen, _sub) = record_statuses(&store);

        assert_eq!(store.delete_task("zzz").await, DeleteOutcome::NotFound);
        assert!(remote.removes().is_empty());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_skips_when_nothing_pending() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();

        assert!(store.flush().await.is_none());
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_pushes_everything_in_order() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        let added = store.add().await;
        let (seen, _sub) = record_statuses(&store);

        let report = store.flush().await.unwrap();
        assert_eq!(report, FlushReport { pushed: 3, failed: 0 });

        let pushed: Vec<_> = remote.upserts().into_iter().skip(1).map(|t| t.id).collect();
        assert_eq!(pushed, vec!["a".to_string(), "b".to_string(), added.id]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SyncStatus {
                    syncing: true,
                    pending_mutations: true
                },
                SyncStatus::default(),
            ]
        );
    }

    #[tokio::test]
    async fn test_flush_clears_pending_despite_failures() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.set_task("a", TaskField::Name, json!("x")).await;
        remote.fail_upserts.store(true, Ordering::SeqCst);

        let report = store.flush().await.unwrap();
        assert_eq!(report, FlushReport { pushed: 0, failed: 2 });
        assert_eq!(store.status(), SyncStatus::default());
    }

    #[tokio::test]
    async fn test_flush_never_overlaps() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.add().await;
        assert_eq!(remote.upsert_count(), 1);

        let gate = remote.close_gate();
        let first = tokio::spawn({
            let store = store.clone();
            async move { store.flush().await }
        });
        wait_for_upserts(&remote, 2).await;
        assert!(store.status().syncing);

        // A second flush while the first is in flight makes no calls
        assert!(store.flush().await.is_none());
        assert_eq!(remote.upsert_count(), 2);

        gate.add_permits(10);
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.pushed, 3);
        assert_eq!(remote.upsert_count(), 4);
        assert!(!store.status().syncing);
    }

    #[tokio::test]
    async fn test_flush_sees_tasks_added_mid_push() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.set_task("a", TaskField::Name, json!("x")).await;

        let gate = remote.close_gate();
        let flush = tokio::spawn({
            let store = store.clone();
            async move { store.flush().await }
        });
        wait_for_upserts(&remote, 2).await;

        let late = store.add();
        gate.add_permits(10);
        let late = late.await;

        let report = flush.await.unwrap().unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(remote.upserts().last().unwrap().id, late.id);
    }

    #[tokio::test]
    async fn test_delete_during_flush_skips_no_task() {
        let remote =
            FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0), task("c", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.set_task("b", TaskField::Name, json!("edited")).await;
        assert_eq!(remote.upsert_count(), 1);

        let gate = remote.close_gate();
        let flush = tokio::spawn({
            let store = store.clone();
            async move { store.flush().await }
        });
        // Flush is blocked pushing "a"
        wait_for_upserts(&remote, 2).await;
        assert_eq!(remote.upserts()[1].id, "a");

        assert_eq!(store.delete_task("a").await, DeleteOutcome::Deleted);
        gate.add_permits(10);

        let report = flush.await.unwrap().unwrap();
        assert_eq!(report, FlushReport { pushed: 3, failed: 0 });
        let flushed: Vec<_> = remote.upserts().into_iter().skip(1).map(|t| t.id).collect();
        assert_eq!(flushed, vec!["a", "b", "c"]);
        assert_eq!(remote.upserts()[2].name, "edited");
        assert!(!store.status().pending_mutations);
    }

    #[tokio::test]
    async fn test_rollback_during_flush_pushes_each_task_once() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0), task("b", 0, 0)]);
        *remote.remove_error.lock().unwrap() = Some((500, "Internal error".to_string()));
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.add().await;

        let gate = remote.close_gate();
        let flush = tokio::spawn({
            let store = store.clone();
            async move { store.flush().await }
        });
        wait_for_upserts(&remote, 2).await;

        // Delete and restore "b" while "a" is in flight
        let outcome = store.delete_task("b").await;
        assert!(matches!(outcome, DeleteOutcome::RolledBack { .. }));
        gate.add_permits(10);

        let report = flush.await.unwrap().unwrap();
        assert_eq!(report.pushed, 3);
        let mut flushed: Vec<_> = remote.upserts().into_iter().skip(1).map(|t| t.id).collect();
        flushed.sort();
        flushed.dedup();
        assert_eq!(flushed.len(), 3);
    }

    #[tokio::test]
    async fn test_observer_can_read_store() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);

        let reader = store.clone();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        let _sub = store.subscribe(move |tasks, _| {
            assert_eq!(reader.snapshot().len(), tasks.len());
            sink.lock().unwrap().push(tasks.len());
        });

        store.load().await.unwrap();
        store.add().await;
        assert_eq!(*counts.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_flushes_pending_changes() {
        let remote = FakeRemote::with_listing(vec![task("a", 0, 0)]);
        let (store, _) = store(&remote);
        store.load().await.unwrap();
        store.add().await;
        assert_eq!(remote.upsert_count(), 1);

        assert!(store.start_autosave(Duration::from_secs(5)));
        assert!(!store.start_autosave(Duration::from_secs(5)));
        assert!(store.is_autosaving());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(remote.upsert_count(), 3);
        assert!(!store.status().pending_mutations);

        // Nothing pending: later ticks do no work
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.upsert_count(), 3);

        store.stop_autosave();
        assert!(!store.is_autosaving());
    }
}
