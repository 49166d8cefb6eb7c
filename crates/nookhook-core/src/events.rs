use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rewards::PointSource;
use crate::timer::{SessionCategory, SessionState};

/// Every state change in the core produces an Event.
/// The CLI prints them; an outer web layer would render or push them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        user_id: String,
        task_name: String,
        duration_seconds: u32,
        category: SessionCategory,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: Uuid,
        user_id: String,
        elapsed_seconds: u32,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: Uuid,
        user_id: String,
        remaining_seconds: u32,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_id: Uuid,
        user_id: String,
        elapsed_seconds: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: Uuid,
        user_id: String,
        task_name: String,
        elapsed_seconds: u32,
        points_awarded: i64,
        at: DateTime<Utc>,
    },
    PointsAwarded {
        user_id: String,
        amount: i64,
        source: PointSource,
        reason: String,
        at: DateTime<Utc>,
    },
    BadgeEarned {
        user_id: String,
        badge_id: String,
        at: DateTime<Utc>,
    },
    LevelUp {
        user_id: String,
        level: u32,
        at: DateTime<Utc>,
    },
    QuoteSubmitted {
        submission_id: i64,
        user_id: String,
        book_id: String,
        at: DateTime<Utc>,
    },
    QuoteReviewed {
        submission_id: i64,
        user_id: String,
        reviewer_id: String,
        verified: bool,
        at: DateTime<Utc>,
    },
    /// Full state snapshot of the active session, if any.
    StateSnapshot {
        user_id: String,
        state: SessionState,
        task_name: String,
        elapsed_seconds: u32,
        remaining_seconds: u32,
        expired: bool,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::BadgeEarned {
            user_id: "alice".into(),
            badge_id: "first_task".into(),
            at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"badge_earned\""));
        assert!(json.contains("first_task"));
    }
}
