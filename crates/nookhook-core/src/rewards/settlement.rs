//! Settlement: converting a completed session (or reading progress) into
//! persisted points, badges, and a historical record.
//!
//! The engine performs plain writes and expects the caller to bracket them
//! with [`Database::with_transaction`]; the service layer does so for every
//! completion, which is what makes a settlement all-or-nothing.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::rewards::badges::{BadgeCatalog, UserCounters};
use crate::rewards::ledger::{level_for, PointSource};
use crate::storage::database::{CompletedTask, CounterRow};
use crate::storage::{Database, RewardsConfig};
use crate::timer::{SessionState, TimerSession};

/// What one settlement produced.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SettlementOutcome {
    /// Id of the completed-task record (sessions only).
    pub task_id: Option<String>,
    pub base_points: i64,
    pub mood_bonus: i64,
    pub priority_bonus: i64,
    pub streak_bonus: i64,
    pub daily_goal_bonus: i64,
    /// Amount of the primary ledger entry (base + bonuses above, minus the
    /// daily goals which land as their own entries).
    pub points_awarded: i64,
    pub level_before: u32,
    pub level_after: u32,
    pub streak_days: u64,
    pub new_badges: Vec<String>,
    pub events: Vec<Event>,
}

/// Orchestrates the multi-step settlement writes.
pub struct SettlementEngine<'a> {
    db: &'a Database,
    rewards: &'a RewardsConfig,
    badges: &'a BadgeCatalog,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(db: &'a Database, rewards: &'a RewardsConfig, badges: &'a BadgeCatalog) -> Self {
        Self {
            db,
            rewards,
            badges,
        }
    }

    /// Settle a completed timer session.
    ///
    /// Pro-rata on actual elapsed time: one base point per 300 seconds of
    /// focus, plus mood/priority bonuses and, on the first completion of the
    /// day, the streak tier bonus. Caller must run this inside a
    /// transaction.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is Completed.
    pub fn settle_session(
        &self,
        session: &TimerSession,
        mood: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome> {
        if session.state != SessionState::Completed {
            return Err(CoreError::InvalidState {
                operation: "settle",
                state: session.state.as_str().to_string(),
            });
        }

        let user_id = session.user_id.as_str();
        let today = now.date_naive();
        let mut outcome = SettlementOutcome::default();

        outcome.base_points = i64::from(session.elapsed_seconds / 300);
        outcome.mood_bonus = mood.map(|m| self.rewards.mood_bonus(m)).unwrap_or(0);
        outcome.priority_bonus = session.priority.map(|p| p.bonus_points()).unwrap_or(0);

        let mut counters = self.db.counters(user_id)?;
        let first_of_day = counters.last_completed_day != Some(today);
        if first_of_day {
            let yesterday = today.pred_opt();
            counters.current_streak = if counters.last_completed_day == yesterday {
                counters.current_streak + 1
            } else {
                1
            };
            counters.last_completed_day = Some(today);
            outcome.streak_bonus = self.rewards.streak_bonus(counters.current_streak);
        }
        outcome.streak_days = counters.current_streak;

        let total_before = self.db.total_points(user_id)?;
        outcome.level_before = level_for(total_before);

        outcome.points_awarded = outcome.base_points
            + outcome.mood_bonus
            + outcome.priority_bonus
            + outcome.streak_bonus;

        let task_id = Uuid::new_v4().to_string();
        self.db.append_ledger(
            user_id,
            outcome.points_awarded,
            PointSource::Hook,
            Some(&task_id),
            &format!("Completed task: {}", session.task_name),
            now,
        )?;
        outcome.events.push(Event::PointsAwarded {
            user_id: user_id.to_string(),
            amount: outcome.points_awarded,
            source: PointSource::Hook,
            reason: format!("Completed task: {}", session.task_name),
            at: now,
        });

        self.db.insert_completed_task(&CompletedTask {
            id: task_id.clone(),
            user_id: user_id.to_string(),
            task_name: session.task_name.clone(),
            category: session.category,
            priority: session.priority,
            duration_seconds: session.duration_seconds,
            elapsed_seconds: session.elapsed_seconds,
            mood: mood.map(str::to_string),
            points_awarded: outcome.points_awarded,
            completed_at: now,
        })?;
        outcome.task_id = Some(task_id);

        // Daily goal bonuses fire when the day's count reaches the threshold
        // exactly, and at most once per day each.
        let today_count = self.db.tasks_completed_on(user_id, today)?;
        for goal in &self.rewards.daily_goals {
            if today_count == goal.tasks {
                let reason = format!("Daily goal: {} tasks", goal.tasks);
                if !self.db.has_reason_on_day(user_id, &reason, today)? {
                    self.db.append_ledger(
                        user_id,
                        goal.bonus,
                        PointSource::Hook,
                        None,
                        &reason,
                        now,
                    )?;
                    outcome.daily_goal_bonus += goal.bonus;
                    outcome.events.push(Event::PointsAwarded {
                        user_id: user_id.to_string(),
                        amount: goal.bonus,
                        source: PointSource::Hook,
                        reason,
                        at: now,
                    });
                }
            }
        }

        counters.tasks_completed += 1;
        self.db.save_counters(&counters)?;

        self.finish_award(user_id, &counters, &mut outcome, now)?;
        debug!(
            user_id,
            points = outcome.points_awarded,
            streak = outcome.streak_days,
            badges = outcome.new_badges.len(),
            "session settled"
        );
        Ok(outcome)
    }

    /// Settle reading progress: points per pages read, book-finish bonus,
    /// reading streak upkeep. Caller must run this inside a transaction.
    ///
    /// # Errors
    /// `Validation` for zero pages; `NotFound` for an unregistered book.
    pub fn settle_reading(
        &self,
        user_id: &str,
        book_id: &str,
        pages_read: u32,
        finished: bool,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome> {
        if pages_read == 0 {
            return Err(CoreError::validation("pages_read", "must be at least 1"));
        }
        let book = self
            .db
            .book(user_id, book_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "book",
                id: book_id.to_string(),
            })?;
        let newly_finished = finished && !book.finished;

        let today = now.date_naive();
        let mut outcome = SettlementOutcome::default();

        let mut counters = self.db.counters(user_id)?;
        if counters.last_reading_day != Some(today) {
            let yesterday = today.pred_opt();
            counters.reading_streak = if counters.last_reading_day == yesterday {
                counters.reading_streak + 1
            } else {
                1
            };
            counters.last_reading_day = Some(today);
        }

        let total_before = self.db.total_points(user_id)?;
        outcome.level_before = level_for(total_before);

        let session_id = self
            .db
            .record_reading(user_id, book_id, pages_read, finished, now)?;

        outcome.base_points =
            i64::from((pages_read / self.rewards.pages_per_point.max(1)).max(1));
        outcome.points_awarded = outcome.base_points;
        let reason = format!("Reading: {pages_read} pages");
        self.db.append_ledger(
            user_id,
            outcome.points_awarded,
            PointSource::Nook,
            Some(&session_id.to_string()),
            &reason,
            now,
        )?;
        outcome.events.push(Event::PointsAwarded {
            user_id: user_id.to_string(),
            amount: outcome.points_awarded,
            source: PointSource::Nook,
            reason,
            at: now,
        });

        if newly_finished {
            counters.books_finished += 1;
            let reason = format!("Finished book: {}", book.title);
            self.db.append_ledger(
                user_id,
                self.rewards.book_finish_bonus,
                PointSource::Nook,
                Some(book_id),
                &reason,
                now,
            )?;
            outcome.events.push(Event::PointsAwarded {
                user_id: user_id.to_string(),
                amount: self.rewards.book_finish_bonus,
                source: PointSource::Nook,
                reason,
                at: now,
            });
        }

        outcome.streak_days = counters.reading_streak;
        self.db.save_counters(&counters)?;

        self.finish_award(user_id, &counters, &mut outcome, now)?;
        debug!(
            user_id,
            book_id,
            pages_read,
            finished = newly_finished,
            "reading settled"
        );
        Ok(outcome)
    }

    /// Award a verified-quote reward and bump the quote counter. Shared by
    /// the quote queue; caller must run this inside a transaction.
    pub(crate) fn settle_quote(
        &self,
        user_id: &str,
        submission_id: i64,
        reward_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome> {
        let mut outcome = SettlementOutcome::default();
        let mut counters = self.db.counters(user_id)?;

        let total_before = self.db.total_points(user_id)?;
        outcome.level_before = level_for(total_before);

        let reason = "Quote verified".to_string();
        self.db.append_ledger(
            user_id,
            reward_amount,
            PointSource::Quote,
            Some(&submission_id.to_string()),
            &reason,
            now,
        )?;
        outcome.points_awarded = reward_amount;
        outcome.base_points = reward_amount;
        outcome.events.push(Event::PointsAwarded {
            user_id: user_id.to_string(),
            amount: reward_amount,
            source: PointSource::Quote,
            reason,
            at: now,
        });

        counters.quotes_verified += 1;
        self.db.save_counters(&counters)?;

        self.finish_award(user_id, &counters, &mut outcome, now)?;
        Ok(outcome)
    }

    /// Level recompute and badge evaluation, shared by every settlement
    /// path. Runs after the primary ledger entries are in.
    fn finish_award(
        &self,
        user_id: &str,
        counters: &CounterRow,
        outcome: &mut SettlementOutcome,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let total = self.db.total_points(user_id)?;
        outcome.level_after = level_for(total);
        if outcome.level_after > outcome.level_before {
            let bonus = self.rewards.level_up_multiplier * i64::from(outcome.level_after);
            self.db.append_ledger(
                user_id,
                bonus,
                PointSource::System,
                None,
                &format!("Reached level {}", outcome.level_after),
                now,
            )?;
            outcome.events.push(Event::LevelUp {
                user_id: user_id.to_string(),
                level: outcome.level_after,
                at: now,
            });
        }

        let eval_counters = UserCounters {
            books_finished: counters.books_finished,
            tasks_completed: counters.tasks_completed,
            streak_days: counters.current_streak.max(counters.reading_streak),
            total_points: self.db.total_points(user_id)?,
            quotes_verified: counters.quotes_verified,
        };
        for badge_id in self.badges.evaluate(&eval_counters) {
            // Insert is idempotent; only a genuinely new badge pays out.
            if self.db.insert_user_badge(user_id, &badge_id, now)? {
                self.db.append_ledger(
                    user_id,
                    self.rewards.badge_bonus,
                    PointSource::System,
                    Some(&badge_id),
                    &format!("Earned badge: {badge_id}"),
                    now,
                )?;
                outcome.events.push(Event::BadgeEarned {
                    user_id: user_id.to_string(),
                    badge_id: badge_id.clone(),
                    at: now,
                });
                outcome.new_badges.push(badge_id);
            }
        }
        Ok(())
    }
}
