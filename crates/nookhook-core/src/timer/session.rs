//! Timer session state machine.
//!
//! A session is a wall-clock-based state machine. It does not use internal
//! threads and there is no scheduled callback - expiry is detected lazily
//! whenever the caller asks for a status or completes the session.
//!
//! ## State Transitions
//!
//! ```text
//! Running -> (Paused <-> Running) -> (Completed | Cancelled)
//! ```
//!
//! Completed and Cancelled are terminal; a new `start` creates a fresh
//! session entity. Elapsed time only advances while Running, computed as the
//! wall-clock delta since `last_resumed_at` plus previously accumulated time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Task name length cap.
pub const MAX_TASK_NAME_LEN: usize = 200;
/// Shortest allowed session: one minute.
pub const MIN_DURATION_SECS: u32 = 60;
/// Longest allowed session: two hours.
pub const MAX_DURATION_SECS: u32 = 7200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl SessionState {
    /// Running or Paused; the states that block a new `start`.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCategory {
    Work,
    Break,
    Custom,
}

impl Default for SessionCategory {
    fn default() -> Self {
        SessionCategory::Work
    }
}

impl SessionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionCategory::Work => "work",
            SessionCategory::Break => "break",
            SessionCategory::Custom => "custom",
        }
    }
}

/// Optional task priority; adds a small flat bonus at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn bonus_points(self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

/// Parameters for starting a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub task_name: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub category: SessionCategory,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// One timer session, exclusively owned by one user.
///
/// Persisted as a single row keyed by user id so it survives restarts and
/// works across stateless workers. The `version` field backs the per-user
/// optimistic concurrency check in the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSession {
    pub id: Uuid,
    pub user_id: String,
    pub task_name: String,
    pub duration_seconds: u32,
    /// Elapsed seconds accumulated over past Running intervals. The live
    /// value while Running is `elapsed_at(now)`.
    pub elapsed_seconds: u32,
    pub state: SessionState,
    pub category: SessionCategory,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub started_at: DateTime<Utc>,
    /// Set while Running; cleared on pause.
    pub last_resumed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by the storage layer on every
    /// persisted mutation.
    #[serde(default)]
    pub version: i64,
}

/// Read-only projection of a session at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub task_name: String,
    pub state: SessionState,
    pub category: SessionCategory,
    pub duration_seconds: u32,
    pub elapsed_seconds: u32,
    pub remaining_seconds: u32,
    /// True once remaining hits zero while the session is still active.
    /// The caller must treat an expired session as implicitly completed;
    /// there is no background timer firing on its behalf.
    pub expired: bool,
    pub at: DateTime<Utc>,
}

impl TimerSession {
    /// Validate inputs and create a session in the Running state.
    ///
    /// # Errors
    /// Returns `Validation` if the task name is empty or too long, or the
    /// duration is out of bounds.
    pub fn start(user_id: &str, req: StartRequest, now: DateTime<Utc>) -> Result<Self> {
        let task_name = req.task_name.trim().to_string();
        if task_name.is_empty() {
            return Err(CoreError::validation("task_name", "must not be empty"));
        }
        if task_name.chars().count() > MAX_TASK_NAME_LEN {
            return Err(CoreError::validation(
                "task_name",
                format!("must be at most {MAX_TASK_NAME_LEN} characters"),
            ));
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&req.duration_seconds) {
            return Err(CoreError::validation(
                "duration_seconds",
                format!("must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS}"),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            task_name,
            duration_seconds: req.duration_seconds,
            elapsed_seconds: 0,
            state: SessionState::Running,
            category: req.category,
            priority: req.priority,
            started_at: now,
            last_resumed_at: Some(now),
            version: 0,
        })
    }

    /// Elapsed seconds as of `now`, clamped to the session duration.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u32 {
        let live = match (self.state, self.last_resumed_at) {
            (SessionState::Running, Some(resumed)) => {
                let delta = (now - resumed).num_seconds().max(0);
                self.elapsed_seconds as i64 + delta
            }
            _ => self.elapsed_seconds as i64,
        };
        (live.min(self.duration_seconds as i64)) as u32
    }

    /// Remaining seconds as of `now`, clamped to zero.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u32 {
        self.duration_seconds - self.elapsed_at(now)
    }

    /// Freeze elapsed time and move to Paused.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is Running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.state != SessionState::Running {
            return Err(self.invalid_state("pause"));
        }
        self.elapsed_seconds = self.elapsed_at(now);
        self.state = SessionState::Paused;
        self.last_resumed_at = None;
        Ok(())
    }

    /// Continue a paused session.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is Paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.state != SessionState::Paused {
            return Err(self.invalid_state("resume"));
        }
        self.state = SessionState::Running;
        self.last_resumed_at = Some(now);
        Ok(())
    }

    /// Discard the session. No settlement, no points.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is Running or Paused.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.state.is_active() {
            return Err(self.invalid_state("cancel"));
        }
        self.elapsed_seconds = self.elapsed_at(now);
        self.state = SessionState::Cancelled;
        self.last_resumed_at = None;
        Ok(())
    }

    /// Finalize elapsed time and move to Completed.
    ///
    /// Early completion is allowed; settlement is pro-rata on actual elapsed
    /// time, not the nominal duration.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is Running or Paused.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.state.is_active() {
            return Err(self.invalid_state("complete"));
        }
        self.elapsed_seconds = self.elapsed_at(now);
        self.state = SessionState::Completed;
        self.last_resumed_at = None;
        Ok(())
    }

    /// Snapshot the session as of `now`. Pure query, never mutates.
    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        let elapsed = self.elapsed_at(now);
        let remaining = self.duration_seconds - elapsed;
        SessionStatus {
            session_id: self.id,
            task_name: self.task_name.clone(),
            state: self.state,
            category: self.category,
            duration_seconds: self.duration_seconds,
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            expired: remaining == 0 && self.state.is_active(),
            at: now,
        }
    }

    fn invalid_state(&self, operation: &'static str) -> CoreError {
        CoreError::InvalidState {
            operation,
            state: self.state.as_str().to_string(),
        }
    }
}
