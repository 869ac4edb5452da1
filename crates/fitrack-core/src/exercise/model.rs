//! Exercise domain models.
//!
//! A catalog entry (`Exercise`) becomes a `RunningExercise` when a training
//! session starts, and a `FinishedExercise` once the session is completed or
//! cancelled.

use crate::error::{FitrackError, Result};
use crate::store::{DocumentSnapshot, Fields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A selectable exercise from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Document id assigned by the store
    pub id: String,
    /// Display name
    pub name: String,
    /// Length of a full session in seconds
    pub duration: f64,
    /// Calories burned by a full session
    pub calories: f64,
}

impl Exercise {
    /// Builds an exercise from a live document snapshot.
    ///
    /// The id comes from the document identity, everything else from the
    /// document fields. Extra fields (e.g. `lastSelected`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `name`, `duration` or `calories` is
    /// missing or has the wrong type.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self> {
        let field_error = |field: &str| FitrackError::Serialization {
            format: "document".to_string(),
            message: format!(
                "document '{}' has no valid '{}' field",
                snapshot.id, field
            ),
        };

        let name = snapshot
            .data
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| field_error("name"))?;
        let duration = snapshot
            .data
            .get("duration")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| field_error("duration"))?;
        let calories = snapshot
            .data
            .get("calories")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| field_error("calories"))?;

        Ok(Self {
            id: snapshot.id.clone(),
            name: name.to_string(),
            duration,
            calories,
        })
    }
}

/// How a training session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    Completed,
    Cancelled,
}

impl std::fmt::Display for ExerciseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExerciseState::Completed => write!(f, "completed"),
            ExerciseState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The exercise currently being trained.
///
/// Holds a detached copy of the catalog entry taken at start time, so later
/// catalog updates never change a session in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningExercise {
    pub exercise: Exercise,
    pub started_at: DateTime<Utc>,
}

impl RunningExercise {
    pub fn start(exercise: Exercise, started_at: DateTime<Utc>) -> Self {
        Self {
            exercise,
            started_at,
        }
    }

    /// Freezes the session as completed at `date`.
    pub fn complete(&self, date: DateTime<Utc>) -> FinishedExercise {
        FinishedExercise {
            id: self.exercise.id.clone(),
            name: self.exercise.name.clone(),
            duration: self.exercise.duration,
            calories: self.exercise.calories,
            date,
            state: ExerciseState::Completed,
        }
    }

    /// Freezes the session as cancelled at `date`.
    ///
    /// `duration` and `calories` are scaled once from the values captured at
    /// start by `progress_percent / 100`. Progress is clamped to `[0, 100]`.
    pub fn cancel(&self, progress_percent: f64, date: DateTime<Utc>) -> FinishedExercise {
        let fraction = completion_fraction(progress_percent);
        FinishedExercise {
            id: self.exercise.id.clone(),
            name: self.exercise.name.clone(),
            duration: self.exercise.duration * fraction,
            calories: self.exercise.calories * fraction,
            date,
            state: ExerciseState::Cancelled,
        }
    }
}

/// Converts a progress percentage into a fraction in `[0.0, 1.0]`.
///
/// NaN counts as no progress.
pub fn completion_fraction(progress_percent: f64) -> f64 {
    if progress_percent.is_nan() {
        return 0.0;
    }
    progress_percent.clamp(0.0, 100.0) / 100.0
}

/// An immutable history record written once to the finished collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedExercise {
    /// Id of the catalog entry the session was started from
    pub id: String,
    pub name: String,
    /// Seconds actually trained
    pub duration: f64,
    pub calories: f64,
    /// When the session ended
    pub date: DateTime<Utc>,
    pub state: ExerciseState,
}

impl FinishedExercise {
    /// Serializes the record into a document field map.
    pub fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(FitrackError::internal(format!(
                "finished exercise serialized to a non-object value: {}",
                other
            ))),
        }
    }

    /// Parses a record from a plain document value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
