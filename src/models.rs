//! Core entities - profiles, exercises, sessions, and logged sets
//!
//! All identifiers are opaque UUID strings. Weights are stored in kilograms;
//! unit conversion is a display concern and never happens here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display unit preference, stored per profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lb,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lb => "lb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(WeightUnit::Kg),
            "lb" => Some(WeightUnit::Lb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Chest,
    Back,
    Legs,
    Shoulders,
    Arms,
    Core,
    Other,
}

impl MuscleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Arms => "arms",
            MuscleGroup::Core => "core",
            MuscleGroup::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chest" => Some(MuscleGroup::Chest),
            "back" => Some(MuscleGroup::Back),
            "legs" => Some(MuscleGroup::Legs),
            "shoulders" => Some(MuscleGroup::Shoulders),
            "arms" => Some(MuscleGroup::Arms),
            "core" => Some(MuscleGroup::Core),
            "other" => Some(MuscleGroup::Other),
            _ => None,
        }
    }
}

/// Local user context, one per device owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub weight_unit: WeightUnit,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            weight_unit: WeightUnit::Kg,
            created_at: Utc::now(),
        }
    }
}

/// An exercise definition owned by one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub muscle_group: MuscleGroup,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, muscle_group: MuscleGroup) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            muscle_group,
            created_at: Utc::now(),
        }
    }
}

/// One continuous workout; active while `ended_at` is None
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Session {
    pub fn start(owner_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// One logged performance of an exercise within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEntry {
    pub id: String,
    pub session_id: String,
    pub exercise_id: String,
    pub performed_at: DateTime<Utc>,
    /// Always kilograms, regardless of the profile's display unit
    pub weight_kg: f64,
    pub reps: i32,
    pub rpe: Option<f64>,
    pub is_pr: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SetEntry {
    pub fn new(
        session_id: impl Into<String>,
        exercise_id: impl Into<String>,
        weight_kg: f64,
        reps: i32,
        rpe: Option<f64>,
        is_pr: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            exercise_id: exercise_id.into(),
            performed_at: Utc::now(),
            weight_kg,
            reps,
            rpe,
            is_pr,
            synced_at: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }
}
