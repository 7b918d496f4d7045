//! Database module - SQLite storage for workout data
//!
//! All timestamps are stored as RFC3339 TEXT. Weights are stored in
//! kilograms. Session exclusivity (one null-ended session per owner) is
//! backed by a partial unique index in addition to the caller's locking.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StorageError;
use crate::models::{Exercise, MuscleGroup, Profile, Session, SetEntry, WeightUnit};

type Result<T> = std::result::Result<T, StorageError>;

/// Database wrapper with an explicit open/close lifecycle
pub struct Store {
    conn: Option<Connection>,
}

fn parse_ts(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

impl Store {
    /// Open or create a database file
    pub fn open(path: &str) -> Result<Self> {
        Self::from_conn(Connection::open(path)?)
    }

    /// Open a private in-memory database (one per test)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self> {
        let store = Self { conn: Some(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Close the store; all further operations fail with `NotInitialized`
    pub fn close(&mut self) {
        self.conn = None;
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StorageError::NotInitialized)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                display_name TEXT,
                weight_unit TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                muscle_group TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exercises_owner ON exercises(owner_id);
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                notes TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
                ON sessions(owner_id) WHERE ended_at IS NULL;
            CREATE TABLE IF NOT EXISTS sets (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                exercise_id TEXT NOT NULL,
                performed_at TEXT NOT NULL,
                weight_kg REAL NOT NULL,
                reps INTEGER NOT NULL,
                rpe REAL,
                is_pr INTEGER NOT NULL,
                synced_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sets_session ON sets(session_id);
            CREATE INDEX IF NOT EXISTS idx_sets_exercise ON sets(exercise_id);",
        )?;
        Ok(())
    }

    // --- profiles ---

    pub fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn()?
            .query_row(
                "SELECT id, display_name, weight_unit, created_at FROM profiles WHERE id = ?1",
                params![owner_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Idempotent overwrite by id
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO profiles (id, display_name, weight_unit, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                weight_unit = excluded.weight_unit",
            params![
                profile.id,
                profile.display_name,
                profile.weight_unit.as_str(),
                profile.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch the owner's profile, creating a default one on first use
    pub fn ensure_profile(&self, owner_id: &str) -> Result<Profile> {
        if let Some(profile) = self.get_profile(owner_id)? {
            return Ok(profile);
        }
        let profile = Profile::new(owner_id);
        self.upsert_profile(&profile)?;
        Ok(profile)
    }

    // --- exercises ---

    pub fn list_exercises(&self, owner_id: &str) -> Result<Vec<Exercise>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, muscle_group, created_at
             FROM exercises WHERE owner_id = ?1 ORDER BY name",
        )?;
        let exercises = stmt
            .query_map(params![owner_id], row_to_exercise)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(exercises)
    }

    pub fn get_exercise(&self, id: &str) -> Result<Option<Exercise>> {
        let exercise = self
            .conn()?
            .query_row(
                "SELECT id, owner_id, name, muscle_group, created_at FROM exercises WHERE id = ?1",
                params![id],
                row_to_exercise,
            )
            .optional()?;
        Ok(exercise)
    }

    /// Duplicate names are allowed; only a duplicate id fails
    pub fn insert_exercise(&self, exercise: &Exercise) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO exercises (id, owner_id, name, muscle_group, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                exercise.id,
                exercise.owner_id,
                exercise.name,
                exercise.muscle_group.as_str(),
                exercise.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // --- sessions ---

    /// The unique null-ended session for this owner, most recent start wins
    /// if more than one somehow exists
    pub fn get_active_session(&self, owner_id: &str) -> Result<Option<Session>> {
        let session = self
            .conn()?
            .query_row(
                "SELECT id, owner_id, started_at, ended_at, notes FROM sessions
                 WHERE owner_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at DESC LIMIT 1",
                params![owner_id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    pub fn insert_session(&self, session: &Session) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sessions (id, owner_id, started_at, ended_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.owner_id,
                session.started_at.to_rfc3339(),
                session.ended_at.map(|t| t.to_rfc3339()),
                session.notes,
            ],
        )?;
        Ok(())
    }

    /// Apply only the fields that are present; `started_at` is immutable
    pub fn update_session(
        &self,
        id: &str,
        ended_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<()> {
        self.conn()?.execute(
            "UPDATE sessions SET
                ended_at = COALESCE(?2, ended_at),
                notes = COALESCE(?3, notes)
             WHERE id = ?1",
            params![id, ended_at.map(|t| t.to_rfc3339()), notes],
        )?;
        Ok(())
    }

    /// Sessions for this owner with no sets at all (candidates for a
    /// remote push even though no set references them)
    pub fn list_empty_sessions(&self, owner_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, started_at, ended_at, notes FROM sessions
             WHERE owner_id = ?1
               AND id NOT IN (SELECT session_id FROM sets)
             ORDER BY started_at",
        )?;
        let sessions = stmt
            .query_map(params![owner_id], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let session = self
            .conn()?
            .query_row(
                "SELECT id, owner_id, started_at, ended_at, notes FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    // --- sets ---

    pub fn list_sets_for_session(&self, session_id: &str) -> Result<Vec<SetEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, exercise_id, performed_at, weight_kg, reps, rpe, is_pr, synced_at
             FROM sets WHERE session_id = ?1 ORDER BY performed_at ASC",
        )?;
        let sets = stmt
            .query_map(params![session_id], row_to_set)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sets)
    }

    pub fn list_sets_for_exercise(
        &self,
        exercise_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SetEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, exercise_id, performed_at, weight_kg, reps, rpe, is_pr, synced_at
             FROM sets WHERE exercise_id = ?1 ORDER BY performed_at DESC LIMIT ?2",
        )?;
        let sets = stmt
            .query_map(
                params![exercise_id, limit.map(i64::from).unwrap_or(-1)],
                row_to_set,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sets)
    }

    pub fn insert_set(&self, entry: &SetEntry) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sets (id, session_id, exercise_id, performed_at, weight_kg, reps, rpe, is_pr, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id,
                entry.session_id,
                entry.exercise_id,
                entry.performed_at.to_rfc3339(),
                entry.weight_kg,
                entry.reps,
                entry.rpe,
                entry.is_pr,
                entry.synced_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn delete_set(&self, id: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM sets WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn list_unsynced_sets(&self) -> Result<Vec<SetEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, exercise_id, performed_at, weight_kg, reps, rpe, is_pr, synced_at
             FROM sets WHERE synced_at IS NULL ORDER BY performed_at ASC",
        )?;
        let sets = stmt
            .query_map([], row_to_set)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sets)
    }

    /// Transition synced_at from absent to present; never cleared afterwards
    pub fn mark_set_synced(&self, id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        self.conn()?.execute(
            "UPDATE sets SET synced_at = ?2 WHERE id = ?1 AND synced_at IS NULL",
            params![id, timestamp.to_rfc3339()],
        )?;
        Ok(())
    }
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let unit: String = row.get(2)?;
    let created: String = row.get(3)?;
    Ok(Profile {
        id: row.get(0)?,
        display_name: row.get(1)?,
        weight_unit: WeightUnit::parse(&unit).unwrap_or(WeightUnit::Kg),
        created_at: parse_ts(3, &created)?,
    })
}

fn row_to_exercise(row: &Row<'_>) -> rusqlite::Result<Exercise> {
    let group: String = row.get(3)?;
    let created: String = row.get(4)?;
    Ok(Exercise {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        muscle_group: MuscleGroup::parse(&group).unwrap_or(MuscleGroup::Other),
        created_at: parse_ts(4, &created)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let started: String = row.get(2)?;
    let ended: Option<String> = row.get(3)?;
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        started_at: parse_ts(2, &started)?,
        ended_at: ended.as_deref().map(|s| parse_ts(3, s)).transpose()?,
        notes: row.get(4)?,
    })
}

fn row_to_set(row: &Row<'_>) -> rusqlite::Result<SetEntry> {
    let performed: String = row.get(3)?;
    let synced: Option<String> = row.get(8)?;
    Ok(SetEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        exercise_id: row.get(2)?,
        performed_at: parse_ts(3, &performed)?,
        weight_kg: row.get(4)?,
        reps: row.get(5)?,
        rpe: row.get(6)?,
        is_pr: row.get(7)?,
        synced_at: synced.as_deref().map(|s| parse_ts(8, s)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_profile_round_trip() {
        let store = store();
        assert!(store.get_profile("u1").unwrap().is_none());

        let mut profile = Profile::new("u1");
        store.upsert_profile(&profile).unwrap();

        profile.display_name = Some("Alex".into());
        profile.weight_unit = WeightUnit::Lb;
        store.upsert_profile(&profile).unwrap();

        let loaded = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("Alex"));
        assert_eq!(loaded.weight_unit, WeightUnit::Lb);
    }

    #[test]
    fn test_ensure_profile_creates_once() {
        let store = store();
        let first = store.ensure_profile("u1").unwrap();
        let second = store.ensure_profile("u1").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_exercises_ordered_by_name() {
        let store = store();
        store
            .insert_exercise(&Exercise::new("u1", "squat", MuscleGroup::Legs))
            .unwrap();
        store
            .insert_exercise(&Exercise::new("u1", "bench press", MuscleGroup::Chest))
            .unwrap();
        store
            .insert_exercise(&Exercise::new("u1", "deadlift", MuscleGroup::Back))
            .unwrap();

        let names: Vec<_> = store
            .list_exercises("u1")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["bench press", "deadlift", "squat"]);
    }

    #[test]
    fn test_duplicate_exercise_names_allowed() {
        let store = store();
        store
            .insert_exercise(&Exercise::new("u1", "row", MuscleGroup::Back))
            .unwrap();
        store
            .insert_exercise(&Exercise::new("u1", "row", MuscleGroup::Back))
            .unwrap();
        assert_eq!(store.list_exercises("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_second_active_session_violates_constraint() {
        let store = store();
        store.insert_session(&Session::start("u1")).unwrap();
        let err = store.insert_session(&Session::start("u1")).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[test]
    fn test_active_session_excludes_finished() {
        let store = store();
        let mut session = Session::start("u1");
        store.insert_session(&session).unwrap();
        assert!(store.get_active_session("u1").unwrap().is_some());

        session.ended_at = Some(Utc::now());
        store
            .update_session(&session.id, session.ended_at, None)
            .unwrap();
        assert!(store.get_active_session("u1").unwrap().is_none());

        // Owners are independent
        assert!(store.get_active_session("u2").unwrap().is_none());
    }

    #[test]
    fn test_update_session_partial() {
        let store = store();
        let session = Session::start("u1");
        store.insert_session(&session).unwrap();

        store
            .update_session(&session.id, None, Some("leg day"))
            .unwrap();
        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert!(loaded.ended_at.is_none());
        assert_eq!(loaded.notes.as_deref(), Some("leg day"));

        store
            .update_session(&session.id, Some(Utc::now()), None)
            .unwrap();
        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert!(loaded.ended_at.is_some());
        assert_eq!(loaded.notes.as_deref(), Some("leg day"));
    }

    #[test]
    fn test_set_ordering_per_session_and_exercise() {
        let store = store();
        let session = Session::start("u1");
        store.insert_session(&session).unwrap();

        let mut first = SetEntry::new(&session.id, "e1", 100.0, 5, None, true);
        first.performed_at = Utc::now() - chrono::Duration::minutes(2);
        let second = SetEntry::new(&session.id, "e1", 102.5, 3, Some(8.5), false);
        store.insert_set(&second).unwrap();
        store.insert_set(&first).unwrap();

        let by_session = store.list_sets_for_session(&session.id).unwrap();
        assert_eq!(by_session[0].id, first.id);
        assert_eq!(by_session[1].id, second.id);

        let by_exercise = store.list_sets_for_exercise("e1", None).unwrap();
        assert_eq!(by_exercise[0].id, second.id);

        let capped = store.list_sets_for_exercise("e1", Some(1)).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_unsynced_and_mark_synced() {
        let store = store();
        let session = Session::start("u1");
        store.insert_session(&session).unwrap();

        let set = SetEntry::new(&session.id, "e1", 60.0, 8, None, false);
        store.insert_set(&set).unwrap();
        assert_eq!(store.list_unsynced_sets().unwrap().len(), 1);

        store.mark_set_synced(&set.id, Utc::now()).unwrap();
        assert!(store.list_unsynced_sets().unwrap().is_empty());

        let loaded = &store.list_sets_for_session(&session.id).unwrap()[0];
        assert!(loaded.is_synced());
    }

    #[test]
    fn test_delete_set() {
        let store = store();
        let session = Session::start("u1");
        store.insert_session(&session).unwrap();
        let set = SetEntry::new(&session.id, "e1", 60.0, 8, None, false);
        store.insert_set(&set).unwrap();

        store.delete_set(&set.id).unwrap();
        assert!(store.list_sets_for_session(&session.id).unwrap().is_empty());
    }

    #[test]
    fn test_empty_sessions_listing() {
        let store = store();
        let with_sets = Session::start("u1");
        store.insert_session(&with_sets).unwrap();
        store
            .insert_set(&SetEntry::new(&with_sets.id, "e1", 50.0, 5, None, false))
            .unwrap();

        let mut empty = Session::start("u2");
        empty.ended_at = Some(Utc::now());
        store.insert_session(&empty).unwrap();

        let listed = store.list_empty_sessions("u2").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, empty.id);
        assert!(store.list_empty_sessions("u1").unwrap().is_empty());
    }

    #[test]
    fn test_closed_store_reports_not_initialized() {
        let mut store = store();
        store.close();
        let err = store.get_profile("u1").unwrap_err();
        assert!(matches!(err, StorageError::NotInitialized));
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liftlog.db");
        let path = path.to_str().unwrap();

        {
            let store = Store::open(path).unwrap();
            store.insert_session(&Session::start("u1")).unwrap();
        }
        let store = Store::open(path).unwrap();
        assert!(store.get_active_session("u1").unwrap().is_some());
    }
}
