use chrono::{DateTime, Utc};
use tracing::info;

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::rewards::{SettlementEngine, SettlementOutcome};
use crate::storage::{Config, Database};
use crate::timer::session::{StartRequest, TimerSession};

/// Completion result: the now-terminal session plus everything the
/// settlement credited for it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompleteOutcome {
    pub session: TimerSession,
    pub settlement: SettlementOutcome,
    pub event: Event,
}

/// Drives the per-user session lifecycle against storage.
///
/// A user has at most one active session; concurrent writers are resolved
/// optimistically via the session's version column, surfacing as `Conflict`.
pub struct TimerService<'a> {
    db: &'a Database,
    config: &'a Config,
    clock: &'a dyn Clock,
}

impl<'a> TimerService<'a> {
    pub fn new(db: &'a Database, config: &'a Config, clock: &'a dyn Clock) -> Self {
        Self { db, config, clock }
    }

    /// Start a new session for `user_id`.
    ///
    /// # Errors
    /// `Validation` for bad input, `Conflict` if the user already has an
    /// active session.
    pub fn start(&self, user_id: &str, req: StartRequest) -> Result<(TimerSession, Event)> {
        let now = self.clock.now();
        let session = TimerSession::start(user_id, req, now)?;
        if !self.db.insert_active_session(&session)? {
            return Err(CoreError::Conflict(
                "an active session already exists for this user".into(),
            ));
        }
        info!(
            user_id,
            session_id = %session.id,
            duration_seconds = session.duration_seconds,
            "session started"
        );
        let event = Event::SessionStarted {
            session_id: session.id,
            user_id: user_id.to_string(),
            task_name: session.task_name.clone(),
            duration_seconds: session.duration_seconds,
            category: session.category,
            at: now,
        };
        Ok((session, event))
    }

    /// Pause the user's running session.
    pub fn pause(&self, user_id: &str) -> Result<(TimerSession, Event)> {
        let now = self.clock.now();
        let mut session = self.load(user_id)?;
        session.pause(now)?;
        self.persist(&mut session)?;
        let event = Event::SessionPaused {
            session_id: session.id,
            user_id: user_id.to_string(),
            elapsed_seconds: session.elapsed_seconds,
            at: now,
        };
        Ok((session, event))
    }

    /// Resume the user's paused session.
    pub fn resume(&self, user_id: &str) -> Result<(TimerSession, Event)> {
        let now = self.clock.now();
        let mut session = self.load(user_id)?;
        session.resume(now)?;
        self.persist(&mut session)?;
        let event = Event::SessionResumed {
            session_id: session.id,
            user_id: user_id.to_string(),
            remaining_seconds: session.remaining_at(now),
            at: now,
        };
        Ok((session, event))
    }

    /// Abandon the active session. Nothing is settled or credited.
    pub fn cancel(&self, user_id: &str) -> Result<(TimerSession, Event)> {
        let now = self.clock.now();
        let mut session = self.load(user_id)?;
        let expected_version = session.version;
        session.cancel(now)?;
        if !self.db.delete_active_session(user_id, expected_version)? {
            return Err(CoreError::Conflict(
                "session was modified by another writer".into(),
            ));
        }
        info!(user_id, session_id = %session.id, "session cancelled");
        let event = Event::SessionCancelled {
            session_id: session.id,
            user_id: user_id.to_string(),
            elapsed_seconds: session.elapsed_seconds,
            at: now,
        };
        Ok((session, event))
    }

    /// Snapshot the active session as of now. Pure read; an expired session
    /// stays in storage until the caller completes or cancels it.
    pub fn status(&self, user_id: &str) -> Result<Event> {
        let now = self.clock.now();
        let session = self.load(user_id)?;
        let status = session.status(now);
        Ok(Event::StateSnapshot {
            user_id: user_id.to_string(),
            state: status.state,
            task_name: status.task_name,
            elapsed_seconds: status.elapsed_seconds,
            remaining_seconds: status.remaining_seconds,
            expired: status.expired,
            at: now,
        })
    }

    /// Complete the active session and settle its rewards.
    ///
    /// The session removal and every reward write commit in one
    /// transaction; a crash mid-way leaves no partial credit behind.
    pub fn complete(&self, user_id: &str, mood: Option<&str>) -> Result<CompleteOutcome> {
        let now = self.clock.now();
        let mut session = self.load(user_id)?;
        let expected_version = session.version;
        session.complete(now)?;

        let engine = SettlementEngine::new(self.db, &self.config.rewards, &self.config.badges);
        let settlement = self.db.with_transaction(|db| {
            if !db.delete_active_session(user_id, expected_version)? {
                return Err(CoreError::Conflict(
                    "session was modified by another writer".into(),
                ));
            }
            engine.settle_session(&session, mood, now)
        })?;

        info!(
            user_id,
            session_id = %session.id,
            points = settlement.points_awarded,
            level = settlement.level_after,
            "session completed"
        );
        let event = completed_event(&session, settlement.points_awarded, now);
        Ok(CompleteOutcome {
            session,
            settlement,
            event,
        })
    }

    fn load(&self, user_id: &str) -> Result<TimerSession> {
        self.db
            .active_session(user_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "active session",
                id: user_id.to_string(),
            })
    }

    fn persist(&self, session: &mut TimerSession) -> Result<()> {
        if !self.db.update_active_session(session)? {
            return Err(CoreError::Conflict(
                "session was modified by another writer".into(),
            ));
        }
        Ok(())
    }
}

fn completed_event(session: &TimerSession, points: i64, at: DateTime<Utc>) -> Event {
    Event::SessionCompleted {
        session_id: session.id,
        user_id: session.user_id.clone(),
        task_name: session.task_name.clone(),
        elapsed_seconds: session.elapsed_seconds,
        points_awarded: points,
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::session::SessionState;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn fixture() -> (Database, Config, ManualClock) {
        (
            Database::open_memory().unwrap(),
            Config::default(),
            ManualClock::new(t0()),
        )
    }

    fn work(duration: u32) -> StartRequest {
        StartRequest {
            task_name: "write report".into(),
            duration_seconds: duration,
            category: Default::default(),
            priority: None,
        }
    }

    #[test]
    fn start_then_status_round_trips_through_storage() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();

        clock.advance(Duration::seconds(90));
        match service.status("alice").unwrap() {
            Event::StateSnapshot {
                elapsed_seconds,
                remaining_seconds,
                expired,
                ..
            } => {
                assert_eq!(elapsed_seconds, 90);
                assert_eq!(remaining_seconds, 1410);
                assert!(!expired);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn second_start_conflicts() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();
        assert!(matches!(
            service.start("alice", work(600)).unwrap_err(),
            CoreError::Conflict(_)
        ));
        // Different users are independent.
        service.start("bob", work(600)).unwrap();
    }

    #[test]
    fn pause_resume_persists_elapsed() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();

        clock.advance(Duration::seconds(120));
        let (paused, _) = service.pause("alice").unwrap();
        assert_eq!(paused.elapsed_seconds, 120);

        // Time during pause doesn't count.
        clock.advance(Duration::seconds(600));
        service.resume("alice").unwrap();
        clock.advance(Duration::seconds(30));
        match service.status("alice").unwrap() {
            Event::StateSnapshot {
                elapsed_seconds, ..
            } => assert_eq!(elapsed_seconds, 150),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn pause_while_paused_is_invalid_state() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();
        service.pause("alice").unwrap();
        assert!(matches!(
            service.pause("alice").unwrap_err(),
            CoreError::InvalidState { .. }
        ));
    }

    #[test]
    fn cancel_removes_session_without_credit() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();
        clock.advance(Duration::seconds(900));

        let (session, _) = service.cancel("alice").unwrap();
        assert_eq!(session.state, SessionState::Cancelled);
        assert!(db.active_session("alice").unwrap().is_none());
        assert_eq!(db.total_points("alice").unwrap(), 0);
        assert!(matches!(
            service.status("alice").unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn complete_settles_and_clears_the_slot() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(1500)).unwrap();
        clock.advance(Duration::seconds(1500));

        let outcome = service.complete("alice", Some("great")).unwrap();
        assert_eq!(outcome.session.state, SessionState::Completed);
        assert_eq!(outcome.settlement.base_points, 5);
        assert_eq!(outcome.settlement.mood_bonus, 5);
        assert!(db.active_session("alice").unwrap().is_none());
        assert!(db.total_points("alice").unwrap() > 0);
        // A fresh session can start right away.
        service.start("alice", work(600)).unwrap();
    }

    #[test]
    fn expired_session_can_still_be_completed() {
        let (db, config, clock) = fixture();
        let service = TimerService::new(&db, &config, &clock);
        service.start("alice", work(600)).unwrap();

        // Way past the nominal duration; elapsed clamps to it.
        clock.advance(Duration::seconds(4000));
        match service.status("alice").unwrap() {
            Event::StateSnapshot {
                expired,
                elapsed_seconds,
                ..
            } => {
                assert!(expired);
                assert_eq!(elapsed_seconds, 600);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let outcome = service.complete("alice", None).unwrap();
        assert_eq!(outcome.session.elapsed_seconds, 600);
        assert_eq!(outcome.settlement.base_points, 2);
    }
}
