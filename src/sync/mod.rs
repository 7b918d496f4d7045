//! Sync module - reconciles the local store with a remote backend
//!
//! A sync pass pushes unsynced sets, pushes the sessions that own them
//! (plus zero-set sessions), then pulls remote exercises the local store is
//! missing. Remote writes are upserts keyed by local entity ids, so the
//! whole pass is idempotent and safe to repeat at any time.

pub mod http;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::error::SyncError;
use crate::models::{Exercise, Session, SetEntry};

/// Remote backend boundary; every operation may fail independently
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn upsert_set(&self, entry: &SetEntry) -> Result<(), SyncError>;
    async fn upsert_session(&self, session: &Session) -> Result<(), SyncError>;
    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<Exercise>, SyncError>;
}

/// Stand-in remote for offline use; every pass fails with a network error
/// until a real backend is configured
pub struct OfflineRemote;

#[async_trait]
impl RemoteApi for OfflineRemote {
    async fn upsert_set(&self, _entry: &SetEntry) -> Result<(), SyncError> {
        Err(SyncError::Network("remote backend not configured".into()))
    }

    async fn upsert_session(&self, _session: &Session) -> Result<(), SyncError> {
        Err(SyncError::Network("remote backend not configured".into()))
    }

    async fn fetch_exercises(&self, _owner_id: &str) -> Result<Vec<Exercise>, SyncError> {
        Err(SyncError::Network("remote backend not configured".into()))
    }
}

/// Summary of one sync pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// True when the trigger was dropped because a pass was already running
    pub dropped: bool,
    pub pushed_sets: usize,
    pub failed_sets: usize,
    pub pushed_sessions: usize,
    pub pulled_exercises: usize,
}

impl SyncReport {
    fn dropped() -> Self {
        Self {
            dropped: true,
            ..Self::default()
        }
    }
}

pub struct SyncCoordinator {
    store: Arc<Mutex<Store>>,
    remote: Arc<dyn RemoteApi>,
    /// Process-wide in-flight guard; a second trigger is dropped, not queued
    in_flight: AtomicBool,
    last_error: Mutex<Option<String>>,
    /// Observer-facing exercise cache, reloaded at the end of each pass
    exercises: Mutex<Vec<Exercise>>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<Mutex<Store>>, remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            store,
            remote,
            in_flight: AtomicBool::new(false),
            last_error: Mutex::new(None),
            exercises: Mutex::new(Vec::new()),
        }
    }

    /// Run one reconciliation pass. Returns a dropped report if a pass is
    /// already in flight; the caller re-triggers after its next mutation.
    pub async fn sync_now(&self, owner_id: &str) -> Result<SyncReport, SyncError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("sync already in flight, dropping trigger");
            return Ok(SyncReport::dropped());
        }
        let result = self.run_pass(owner_id).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match &result {
            Ok(report) => {
                *self.last_error.lock().await = None;
                info!(
                    pushed_sets = report.pushed_sets,
                    failed_sets = report.failed_sets,
                    pushed_sessions = report.pushed_sessions,
                    pulled_exercises = report.pulled_exercises,
                    "sync pass finished"
                );
            }
            Err(e) => {
                *self.last_error.lock().await = Some(e.to_string());
                warn!("sync pass failed: {e}");
            }
        }
        result
    }

    /// Trigger a pass in the background, discarding the result. Failures
    /// only surface through `last_error`.
    pub fn spawn_sync(self: &Arc<Self>, owner_id: &str) {
        let coordinator = Arc::clone(self);
        let owner = owner_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = coordinator.sync_now(&owner).await {
                debug!("background sync failed: {e}");
            }
        });
    }

    async fn run_pass(&self, owner_id: &str) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        // Snapshot the unsynced set list; the session-push predicate is
        // derived from it, not from a stored flag.
        let unsynced = self.store.lock().await.list_unsynced_sets()?;

        let mut session_ids: Vec<String> = Vec::new();
        for set in &unsynced {
            if !session_ids.contains(&set.session_id) {
                session_ids.push(set.session_id.clone());
            }
        }

        for set in &unsynced {
            match self.remote.upsert_set(set).await {
                Ok(()) => {
                    self.store.lock().await.mark_set_synced(&set.id, Utc::now())?;
                    report.pushed_sets += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Per-item rejection: leave unsynced, retried next pass
                    warn!(set_id = %set.id, "remote rejected set: {e}");
                    report.failed_sets += 1;
                }
            }
        }

        // Sessions owning a set that was unsynced at the start of the pass,
        // plus sessions with no sets the remote cannot have learned about
        // through a set push.
        let mut sessions: Vec<Session> = Vec::new();
        {
            let store = self.store.lock().await;
            for id in &session_ids {
                if let Some(session) = store.get_session(id)? {
                    sessions.push(session);
                }
            }
            sessions.extend(store.list_empty_sessions(owner_id)?);
        }
        for session in &sessions {
            match self.remote.upsert_session(session).await {
                Ok(()) => report.pushed_sessions += 1,
                Err(e) => warn!(session_id = %session.id, "session push failed: {e}"),
            }
        }

        // One-way exercise pull; local-only exercises are never deleted
        let remote_exercises = self.remote.fetch_exercises(owner_id).await?;
        {
            let store = self.store.lock().await;
            for exercise in remote_exercises {
                if store.get_exercise(&exercise.id)?.is_none() {
                    store.insert_exercise(&exercise)?;
                    report.pulled_exercises += 1;
                }
            }
            *self.exercises.lock().await = store.list_exercises(owner_id)?;
        }

        Ok(report)
    }

    /// Last pass-level failure text, cleared by the next successful pass
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    pub async fn cached_exercises(&self) -> Vec<Exercise> {
        self.exercises.lock().await.clone()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::testing::MockRemote;
    use super::*;
    use crate::models::MuscleGroup;

    fn shared_store() -> Arc<Mutex<Store>> {
        Arc::new(Mutex::new(Store::open_in_memory().unwrap()))
    }

    async fn seed_session_with_sets(
        store: &Arc<Mutex<Store>>,
        owner: &str,
        count: usize,
    ) -> (Session, Vec<SetEntry>) {
        let store = store.lock().await;
        let session = Session::start(owner);
        store.insert_session(&session).unwrap();
        let mut sets = Vec::new();
        for i in 0..count {
            let set = SetEntry::new(&session.id, "e1", 100.0, 5 + i as i32, None, false);
            store.insert_set(&set).unwrap();
            sets.push(set);
        }
        (session, sets)
    }

    #[tokio::test]
    async fn test_pass_pushes_sets_and_sessions() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());
        let (session, _) = seed_session_with_sets(&store, "u1", 3).await;

        let report = coordinator.sync_now("u1").await.unwrap();
        assert!(!report.dropped);
        assert_eq!(report.pushed_sets, 3);
        assert_eq!(report.pushed_sessions, 1);

        assert_eq!(remote.sets.lock().await.len(), 3);
        assert_eq!(remote.sessions.lock().await[0].id, session.id);
        assert!(store.lock().await.list_unsynced_sets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_pass_is_idempotent() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());
        seed_session_with_sets(&store, "u1", 2).await;

        coordinator.sync_now("u1").await.unwrap();
        let after_first = remote.set_upserts.load(Ordering::SeqCst);

        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pushed_sets, 0);
        assert_eq!(remote.set_upserts.load(Ordering::SeqCst), after_first);
        assert_eq!(remote.sets.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_retries_only_failed_set() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());
        let (_, sets) = seed_session_with_sets(&store, "u1", 3).await;

        remote
            .reject_set_ids
            .lock()
            .await
            .insert(sets[1].id.clone());

        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pushed_sets, 2);
        assert_eq!(report.failed_sets, 1);

        let unsynced = store.lock().await.list_unsynced_sets().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, sets[1].id);

        // Next pass retries only the one that failed
        remote.reject_set_ids.lock().await.clear();
        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pushed_sets, 1);
        assert!(store.lock().await.list_unsynced_sets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_aborts_pass_and_sets_last_error() {
        let store = shared_store();
        let remote = MockRemote::offline();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());
        seed_session_with_sets(&store, "u1", 1).await;

        let err = coordinator.sync_now("u1").await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert!(coordinator.last_error().await.is_some());
        assert_eq!(store.lock().await.list_unsynced_sets().unwrap().len(), 1);

        // Recovery clears the error
        remote.offline.store(false, Ordering::SeqCst);
        coordinator.sync_now("u1").await.unwrap();
        assert!(coordinator.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_exercise_pull_is_one_way() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());

        let local_only = Exercise::new("u1", "front squat", MuscleGroup::Legs);
        store.lock().await.insert_exercise(&local_only).unwrap();

        let remote_exercise = Exercise::new("u1", "bench press", MuscleGroup::Chest);
        remote.exercises.lock().await.push(remote_exercise.clone());

        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pulled_exercises, 1);

        let local = store.lock().await.list_exercises("u1").unwrap();
        assert_eq!(local.len(), 2);

        // Cache reloaded, local-only exercise survives a second pass
        let cached = coordinator.cached_exercises().await;
        assert_eq!(cached.len(), 2);
        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pulled_exercises, 0);
        assert_eq!(store.lock().await.list_exercises("u1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_dropped() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = Arc::new(SyncCoordinator::new(Arc::clone(&store), remote.clone()));
        seed_session_with_sets(&store, "u1", 1).await;

        let gate = Arc::new(Notify::new());
        *remote.hold.lock().await = Some(Arc::clone(&gate));

        let running = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.sync_now("u1").await })
        };
        // Let the first pass reach the blocked upsert
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = coordinator.sync_now("u1").await.unwrap();
        assert!(report.dropped);

        gate.notify_one();
        let report = running.await.unwrap().unwrap();
        assert!(!report.dropped);
        assert_eq!(report.pushed_sets, 1);
    }

    #[tokio::test]
    async fn test_empty_session_is_pushed() {
        let store = shared_store();
        let remote = MockRemote::new();
        let coordinator = SyncCoordinator::new(Arc::clone(&store), remote.clone());

        let session = Session::start("u1");
        store.lock().await.insert_session(&session).unwrap();

        let report = coordinator.sync_now("u1").await.unwrap();
        assert_eq!(report.pushed_sets, 0);
        assert_eq!(report.pushed_sessions, 1);
        assert_eq!(remote.sessions.lock().await[0].id, session.id);
    }
}
