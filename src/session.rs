//! Session module - the active-workout state machine
//!
//! Two states: no active session, or one active session with its ordered
//! set list mirrored in memory. Every local write completes before any sync
//! is attempted, and sync failures never roll a local write back.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::Store;
use crate::error::{DomainError, EngineError};
use crate::models::{Exercise, Profile, Session, SetEntry};
use crate::pr;
use crate::sync::SyncCoordinator;

enum SessionState {
    Idle,
    Active {
        session: Session,
        /// Sets logged this session, oldest first
        sets: Vec<SetEntry>,
    },
}

pub struct SessionTracker {
    owner_id: String,
    store: Arc<Mutex<Store>>,
    sync: Arc<SyncCoordinator>,
    state: SessionState,
}

impl SessionTracker {
    /// Build a tracker for one owner, recovering an active session left
    /// behind by a previous process (crash/restart recovery). Also creates
    /// the owner's profile on first launch.
    pub async fn resume(
        owner_id: impl Into<String>,
        store: Arc<Mutex<Store>>,
        sync: Arc<SyncCoordinator>,
    ) -> Result<Self, EngineError> {
        let owner_id = owner_id.into();
        let state = {
            let store = store.lock().await;
            store.ensure_profile(&owner_id)?;
            match store.get_active_session(&owner_id)? {
                Some(session) => {
                    let sets = store.list_sets_for_session(&session.id)?;
                    info!(session_id = %session.id, sets = sets.len(), "resumed active session");
                    SessionState::Active { session, sets }
                }
                None => SessionState::Idle,
            }
        };
        Ok(Self {
            owner_id,
            store,
            sync,
            state,
        })
    }

    /// Start a workout. Idempotent: an already-active session is returned
    /// unchanged. The store lock is held across the check and the insert so
    /// two near-simultaneous calls cannot both create a session.
    pub async fn start_session(&mut self) -> Result<Session, EngineError> {
        if let SessionState::Active { session, .. } = &self.state {
            return Ok(session.clone());
        }

        let store = self.store.lock().await;
        if let Some(existing) = store.get_active_session(&self.owner_id)? {
            let sets = store.list_sets_for_session(&existing.id)?;
            drop(store);
            self.state = SessionState::Active {
                session: existing.clone(),
                sets,
            };
            return Ok(existing);
        }

        let session = Session::start(&self.owner_id);
        store.insert_session(&session)?;
        drop(store);

        info!(session_id = %session.id, "session started");
        self.state = SessionState::Active {
            session: session.clone(),
            sets: Vec::new(),
        };
        Ok(session)
    }

    /// Log one set against the active session. PR status is computed from
    /// the full prior history of the exercise before the set is persisted;
    /// the background sync trigger never blocks or fails the caller.
    pub async fn log_set(
        &mut self,
        exercise_id: &str,
        weight_kg: f64,
        reps: i32,
        rpe: Option<f64>,
    ) -> Result<SetEntry, EngineError> {
        let SessionState::Active { session, sets } = &mut self.state else {
            return Err(DomainError::NoActiveSession.into());
        };
        if weight_kg < 0.0 {
            return Err(DomainError::InvalidSet("weight must be >= 0".into()).into());
        }
        if reps < 1 {
            return Err(DomainError::InvalidSet("reps must be >= 1".into()).into());
        }
        if let Some(rpe) = rpe {
            if !(1.0..=10.0).contains(&rpe) {
                return Err(DomainError::InvalidSet("rpe must be in [1, 10]".into()).into());
            }
        }

        let entry = {
            let store = self.store.lock().await;
            let history = store.list_sets_for_exercise(exercise_id, None)?;
            let is_pr = pr::is_personal_record(
                weight_kg,
                reps,
                history.iter().map(|s| (s.weight_kg, s.reps)),
            );
            let entry = SetEntry::new(&session.id, exercise_id, weight_kg, reps, rpe, is_pr);
            store.insert_set(&entry)?;
            entry
        };
        sets.push(entry.clone());

        self.sync.spawn_sync(&self.owner_id);
        Ok(entry)
    }

    /// Remove the most recently logged set of the active session
    pub async fn undo_last_set(&mut self) -> Result<SetEntry, EngineError> {
        let SessionState::Active { sets, .. } = &mut self.state else {
            return Err(DomainError::NoActiveSession.into());
        };
        let Some(last) = sets.last().cloned() else {
            return Err(DomainError::EmptySession.into());
        };

        self.store.lock().await.delete_set(&last.id)?;
        sets.pop();
        Ok(last)
    }

    /// End the active session. A synchronous sync pass is attempted before
    /// the transition; its failure does not block finishing.
    pub async fn finish_session(&mut self, notes: Option<String>) -> Result<Session, EngineError> {
        let SessionState::Active { session, .. } = &mut self.state else {
            return Err(DomainError::NoActiveSession.into());
        };

        let ended_at = Utc::now();
        self.store
            .lock()
            .await
            .update_session(&session.id, Some(ended_at), notes.as_deref())?;
        session.ended_at = Some(ended_at);
        if notes.is_some() {
            session.notes = notes;
        }
        let finished = session.clone();

        if let Err(e) = self.sync.sync_now(&self.owner_id).await {
            warn!(session_id = %finished.id, "post-finish sync failed: {e}");
        }

        info!(session_id = %finished.id, "session finished");
        self.state = SessionState::Idle;
        Ok(finished)
    }

    // --- read accessors for the UI layer ---

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    pub fn active_session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Active { session, .. } => Some(session),
            SessionState::Idle => None,
        }
    }

    pub fn current_sets(&self) -> &[SetEntry] {
        match &self.state {
            SessionState::Active { sets, .. } => sets,
            SessionState::Idle => &[],
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub async fn profile(&self) -> Result<Profile, EngineError> {
        Ok(self.store.lock().await.ensure_profile(&self.owner_id)?)
    }

    pub async fn exercises(&self) -> Result<Vec<Exercise>, EngineError> {
        Ok(self.store.lock().await.list_exercises(&self.owner_id)?)
    }
}
