//! SQLite-backed storage for sessions, rewards, books, and quotes.
//!
//! Each user's active session is a single row keyed by user id with a
//! `version` column; mutations are `UPDATE ... WHERE version = ?` so two
//! racing requests from the same user cannot both win. Everything written by
//! a settlement goes through [`Database::with_transaction`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::migrations;
use crate::error::{CoreError, DatabaseError, Result};
use crate::quotes::{QuoteStatus, QuoteSubmission};
use crate::rewards::{LedgerEntry, PointSource};
use crate::timer::{Priority, SessionCategory, TimerSession};

const DAY_FMT: &str = "%Y-%m-%d";

/// Immutable record of a settled timer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTask {
    pub id: String,
    pub user_id: String,
    pub task_name: String,
    pub category: SessionCategory,
    pub priority: Option<Priority>,
    pub duration_seconds: u32,
    pub elapsed_seconds: u32,
    pub mood: Option<String>,
    pub points_awarded: i64,
    pub completed_at: DateTime<Utc>,
}

/// Per-user aggregate counters.
///
/// The streak fields are the operational copy; the task and reading tables
/// remain the audit trail they can be re-derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterRow {
    pub user_id: String,
    pub tasks_completed: u64,
    pub books_finished: u64,
    pub quotes_verified: u64,
    pub current_streak: u64,
    pub last_completed_day: Option<NaiveDate>,
    pub reading_streak: u64,
    pub last_reading_day: Option<NaiveDate>,
}

/// One book in a user's library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    pub user_id: String,
    pub book_id: String,
    pub title: String,
    pub total_pages: Option<u32>,
    pub pages_read: u32,
    pub finished: bool,
}

/// Aggregate view for the stats surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub tasks_completed: u64,
    pub tasks_today: u64,
    pub focus_seconds_total: u64,
    pub focus_seconds_today: u64,
    pub current_streak: u64,
    pub reading_streak: u64,
    pub books_finished: u64,
    pub quotes_verified: u64,
    pub total_points: i64,
    /// Balance contribution per ledger source ("nook", "hook", ...).
    pub points_by_source: HashMap<String, i64>,
    pub level: u32,
    pub badges_earned: u64,
}

/// SQLite database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/nookhook.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = super::data_dir()?.join("nookhook.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        migrations::migrate(&db.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        migrations::migrate(&db.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Run `f` inside a single `BEGIN IMMEDIATE` transaction.
    ///
    /// Everything the closure writes commits or rolls back as a unit; a
    /// failure mid-settlement cannot leave points without the matching task
    /// record or vice versa.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE TRANSACTION;")
            .map_err(DatabaseError::from)?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT;")
                    .map_err(DatabaseError::from)?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Active sessions ===

    /// Load the user's active session, if any.
    pub fn active_session(&self, user_id: &str) -> Result<Option<TimerSession>> {
        let row: Option<(i64, String)> = self
            .conn
            .prepare("SELECT version, data FROM active_sessions WHERE user_id = ?1")
            .map_err(DatabaseError::from)?
            .query_row(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(DatabaseError::from)?;
        match row {
            Some((version, data)) => {
                let mut session: TimerSession = serde_json::from_str(&data)?;
                session.version = version;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Insert a fresh active session. Returns false if the user already has
    /// one (primary-key conflict), which the caller surfaces as a conflict.
    pub fn insert_active_session(&self, session: &TimerSession) -> Result<bool> {
        let data = serde_json::to_string(session)?;
        let result = self.conn.execute(
            "INSERT INTO active_sessions (user_id, version, data) VALUES (?1, ?2, ?3)",
            params![session.user_id, session.version, data],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(DatabaseError::from(e).into()),
        }
    }

    /// Persist a mutated session with an optimistic version check.
    ///
    /// Returns false (and leaves `session` untouched) when another request
    /// won the race; true after bumping `session.version`.
    pub fn update_active_session(&self, session: &mut TimerSession) -> Result<bool> {
        let expected = session.version;
        session.version = expected + 1;
        let data = serde_json::to_string(session)?;
        let changed = self
            .conn
            .execute(
                "UPDATE active_sessions SET version = ?1, data = ?2
                 WHERE user_id = ?3 AND version = ?4",
                params![session.version, data, session.user_id, expected],
            )
            .map_err(DatabaseError::from)?;
        if changed == 0 {
            session.version = expected;
            return Ok(false);
        }
        Ok(true)
    }

    /// Remove the active session row, again under the version check.
    pub fn delete_active_session(&self, user_id: &str, expected_version: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM active_sessions WHERE user_id = ?1 AND version = ?2",
                params![user_id, expected_version],
            )
            .map_err(DatabaseError::from)?;
        Ok(changed == 1)
    }

    // === Ledger ===

    /// Append one immutable ledger entry; returns its rowid.
    pub fn append_ledger(
        &self,
        user_id: &str,
        amount: i64,
        source: PointSource,
        reference_id: Option<&str>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO ledger (user_id, amount, source, reference_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    amount,
                    source.as_str(),
                    reference_id,
                    reason,
                    at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Sum of all entries for the user. The source of truth for balance.
    pub fn total_points(&self, user_id: &str) -> Result<i64> {
        let total = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .map_err(DatabaseError::from)?;
        Ok(total)
    }

    /// Most recent entries first.
    pub fn ledger_entries(&self, user_id: &str, limit: u32) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, amount, source, reference_id, reason, created_at
                 FROM ledger WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(DatabaseError::from)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, user_id, amount, source, reference_id, reason, created_at) =
                row.map_err(DatabaseError::from)?;
            entries.push(LedgerEntry {
                id,
                user_id,
                amount,
                source: PointSource::parse(&source).ok_or_else(|| {
                    DatabaseError::QueryFailed(format!("unknown ledger source '{source}'"))
                })?,
                reference_id,
                reason,
                created_at: parse_rfc3339(&created_at)?,
            });
        }
        Ok(entries)
    }

    /// True if the user already has an entry with this reason on the given
    /// calendar day. Used to award daily goal bonuses at most once.
    pub fn has_reason_on_day(&self, user_id: &str, reason: &str, day: NaiveDate) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM ledger
                 WHERE user_id = ?1 AND reason = ?2
                   AND created_at >= ?3 AND created_at < ?4
                 LIMIT 1",
                params![user_id, reason, day_start(day), day_start(next_day(day))],
                |_| Ok(()),
            )
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(found.is_some())
    }

    // === Completed tasks ===

    pub fn insert_completed_task(&self, task: &CompletedTask) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO completed_tasks
                 (id, user_id, task_name, category, priority, duration_seconds,
                  elapsed_seconds, mood, points_awarded, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id,
                    task.user_id,
                    task.task_name,
                    task.category.as_str(),
                    task.priority.map(priority_str),
                    task.duration_seconds,
                    task.elapsed_seconds,
                    task.mood,
                    task.points_awarded,
                    task.completed_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    /// Most recent first.
    pub fn completed_tasks(&self, user_id: &str, limit: u32) -> Result<Vec<CompletedTask>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, task_name, category, priority, duration_seconds,
                        elapsed_seconds, mood, points_awarded, completed_at
                 FROM completed_tasks WHERE user_id = ?1
                 ORDER BY completed_at DESC LIMIT ?2",
            )
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })
            .map_err(DatabaseError::from)?;

        let mut tasks = Vec::new();
        for row in rows {
            let (
                id,
                user_id,
                task_name,
                category,
                priority,
                duration_seconds,
                elapsed_seconds,
                mood,
                points_awarded,
                completed_at,
            ) = row.map_err(DatabaseError::from)?;
            tasks.push(CompletedTask {
                id,
                user_id,
                task_name,
                category: parse_category(&category)?,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                duration_seconds,
                elapsed_seconds,
                mood,
                points_awarded,
                completed_at: parse_rfc3339(&completed_at)?,
            });
        }
        Ok(tasks)
    }

    /// Count of tasks completed on a calendar day.
    pub fn tasks_completed_on(&self, user_id: &str, day: NaiveDate) -> Result<u64> {
        let count = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM completed_tasks
                 WHERE user_id = ?1 AND completed_at >= ?2 AND completed_at < ?3",
                params![user_id, day_start(day), day_start(next_day(day))],
                |row| row.get::<_, u64>(0),
            )
            .map_err(DatabaseError::from)?;
        Ok(count)
    }

    // === Badges ===

    /// Insert a user badge; duplicate awards are silent no-ops.
    /// Returns true when the badge was newly earned.
    pub fn insert_user_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO user_badges (user_id, badge_id, earned_at)
                 VALUES (?1, ?2, ?3)",
                params![user_id, badge_id, at.to_rfc3339()],
            )
            .map_err(DatabaseError::from)?;
        Ok(changed == 1)
    }

    /// All badge ids earned by the user, newest first.
    pub fn user_badges(&self, user_id: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT badge_id, earned_at FROM user_badges
                 WHERE user_id = ?1 ORDER BY earned_at DESC",
            )
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(DatabaseError::from)?;
        let mut badges = Vec::new();
        for row in rows {
            let (badge_id, earned_at) = row.map_err(DatabaseError::from)?;
            badges.push((badge_id, parse_rfc3339(&earned_at)?));
        }
        Ok(badges)
    }

    // === Counters ===

    /// Load the user's counter row, defaulting to zeros for a new user.
    pub fn counters(&self, user_id: &str) -> Result<CounterRow> {
        let row = self
            .conn
            .prepare(
                "SELECT tasks_completed, books_finished, quotes_verified, current_streak,
                        last_completed_day, reading_streak, last_reading_day
                 FROM user_counters WHERE user_id = ?1",
            )
            .map_err(DatabaseError::from)?
            .query_row(params![user_id], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, u64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .optional()
            .map_err(DatabaseError::from)?;
        match row {
            Some((
                tasks_completed,
                books_finished,
                quotes_verified,
                current_streak,
                last_completed_day,
                reading_streak,
                last_reading_day,
            )) => Ok(CounterRow {
                user_id: user_id.to_string(),
                tasks_completed,
                books_finished,
                quotes_verified,
                current_streak,
                last_completed_day: last_completed_day.as_deref().map(parse_day).transpose()?,
                reading_streak,
                last_reading_day: last_reading_day.as_deref().map(parse_day).transpose()?,
            }),
            None => Ok(CounterRow {
                user_id: user_id.to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn save_counters(&self, counters: &CounterRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO user_counters
                 (user_id, tasks_completed, books_finished, quotes_verified, current_streak,
                  last_completed_day, reading_streak, last_reading_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    counters.user_id,
                    counters.tasks_completed,
                    counters.books_finished,
                    counters.quotes_verified,
                    counters.current_streak,
                    counters.last_completed_day.map(|d| d.format(DAY_FMT).to_string()),
                    counters.reading_streak,
                    counters.last_reading_day.map(|d| d.format(DAY_FMT).to_string()),
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    // === Books & reading ===

    /// Register or refresh a book in the user's library.
    pub fn upsert_book(
        &self,
        user_id: &str,
        book_id: &str,
        title: &str,
        total_pages: Option<u32>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO books (user_id, book_id, title, total_pages)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, book_id)
                 DO UPDATE SET title = excluded.title, total_pages = excluded.total_pages",
                params![user_id, book_id, title, total_pages],
            )
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    pub fn book(&self, user_id: &str, book_id: &str) -> Result<Option<BookRecord>> {
        let row = self
            .conn
            .prepare(
                "SELECT title, total_pages, pages_read, finished
                 FROM books WHERE user_id = ?1 AND book_id = ?2",
            )
            .map_err(DatabaseError::from)?
            .query_row(params![user_id, book_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<u32>>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            })
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(row.map(|(title, total_pages, pages_read, finished)| BookRecord {
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            title,
            total_pages,
            pages_read,
            finished,
        }))
    }

    /// Record a reading session and advance the book's progress.
    pub fn record_reading(
        &self,
        user_id: &str,
        book_id: &str,
        pages_read: u32,
        finished: bool,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO reading_sessions (user_id, book_id, pages_read, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, book_id, pages_read, at.to_rfc3339()],
            )
            .map_err(DatabaseError::from)?;
        let session_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "UPDATE books SET pages_read = pages_read + ?1,
                        finished = finished OR ?2
                 WHERE user_id = ?3 AND book_id = ?4",
                params![pages_read, finished, user_id, book_id],
            )
            .map_err(DatabaseError::from)?;
        Ok(session_id)
    }

    // === Quotes ===

    pub fn insert_quote(&self, quote: &QuoteSubmission) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO quotes
                 (user_id, book_id, quote_text, page_number, status, reward_amount, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    quote.user_id,
                    quote.book_id,
                    quote.quote_text,
                    quote.page_number,
                    quote.status.as_str(),
                    quote.reward_amount,
                    quote.submitted_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn quote(&self, id: i64) -> Result<Option<QuoteSubmission>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, book_id, quote_text, page_number, status, reward_amount,
                        submitted_at, reviewed_at, reviewed_by, rejection_reason
                 FROM quotes WHERE id = ?1",
            )
            .map_err(DatabaseError::from)?;
        let row = stmt
            .query_row(params![id], map_quote_row)
            .optional()
            .map_err(DatabaseError::from)?;
        row.map(finish_quote_row).transpose()
    }

    /// An identical (user, book, text) submission already pending or
    /// verified. Rejected quotes may be resubmitted.
    pub fn duplicate_quote_exists(
        &self,
        user_id: &str,
        book_id: &str,
        quote_text: &str,
    ) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM quotes
                 WHERE user_id = ?1 AND book_id = ?2 AND quote_text = ?3
                   AND status IN ('pending', 'verified')
                 LIMIT 1",
                params![user_id, book_id, quote_text],
                |_| Ok(()),
            )
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(found.is_some())
    }

    /// Pending submissions, oldest first for fair processing.
    pub fn pending_quotes(&self, limit: u32) -> Result<Vec<QuoteSubmission>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, book_id, quote_text, page_number, status, reward_amount,
                        submitted_at, reviewed_at, reviewed_by, rejection_reason
                 FROM quotes WHERE status = 'pending'
                 ORDER BY submitted_at ASC LIMIT ?1",
            )
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map(params![limit], map_quote_row)
            .map_err(DatabaseError::from)?;
        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(finish_quote_row(row.map_err(DatabaseError::from)?)?);
        }
        Ok(quotes)
    }

    /// Apply a review decision. Only touches rows still pending, so the
    /// returned flag doubles as the no-re-review guard.
    pub fn update_quote_review(
        &self,
        id: i64,
        status: QuoteStatus,
        reviewer_id: &str,
        rejection_reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE quotes
                 SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, rejection_reason = ?4
                 WHERE id = ?5 AND status = 'pending'",
                params![
                    status.as_str(),
                    reviewer_id,
                    at.to_rfc3339(),
                    rejection_reason,
                    id,
                ],
            )
            .map_err(DatabaseError::from)?;
        Ok(changed == 1)
    }

    // === Stats ===

    /// Aggregate view across tasks, ledger, badges, and counters.
    pub fn stats(&self, user_id: &str, today: NaiveDate) -> Result<Stats> {
        let (tasks_completed, focus_seconds_total) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(elapsed_seconds), 0)
                 FROM completed_tasks WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
            )
            .map_err(DatabaseError::from)?;
        let (tasks_today, focus_seconds_today) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(elapsed_seconds), 0)
                 FROM completed_tasks
                 WHERE user_id = ?1 AND completed_at >= ?2 AND completed_at < ?3",
                params![user_id, day_start(today), day_start(next_day(today))],
                |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
            )
            .map_err(DatabaseError::from)?;
        let badges_earned = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM user_badges WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, u64>(0),
            )
            .map_err(DatabaseError::from)?;
        let counters = self.counters(user_id)?;
        let total_points = self.total_points(user_id)?;

        let mut points_by_source = HashMap::new();
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source, COALESCE(SUM(amount), 0) FROM ledger
                 WHERE user_id = ?1 GROUP BY source",
            )
            .map_err(DatabaseError::from)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(DatabaseError::from)?;
        for row in rows {
            let (source, amount) = row.map_err(DatabaseError::from)?;
            points_by_source.insert(source, amount);
        }

        Ok(Stats {
            tasks_completed,
            tasks_today,
            focus_seconds_total,
            focus_seconds_today,
            current_streak: counters.current_streak,
            reading_streak: counters.reading_streak,
            books_finished: counters.books_finished,
            quotes_verified: counters.quotes_verified,
            total_points,
            points_by_source,
            level: crate::rewards::level_for(total_points),
            badges_earned,
        })
    }
}

type QuoteRow = (
    i64,
    String,
    String,
    String,
    u32,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn map_quote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuoteRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn finish_quote_row(row: QuoteRow) -> Result<QuoteSubmission> {
    let (
        id,
        user_id,
        book_id,
        quote_text,
        page_number,
        status,
        reward_amount,
        submitted_at,
        reviewed_at,
        reviewed_by,
        rejection_reason,
    ) = row;
    Ok(QuoteSubmission {
        id,
        user_id,
        book_id,
        quote_text,
        page_number,
        status: QuoteStatus::parse(&status).ok_or_else(|| {
            CoreError::from(DatabaseError::QueryFailed(format!(
                "unknown quote status '{status}'"
            )))
        })?,
        reward_amount,
        submitted_at: parse_rfc3339(&submitted_at)?,
        reviewed_at: reviewed_at.as_deref().map(parse_rfc3339).transpose()?,
        reviewed_by,
        rejection_reason,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{s}': {e}")).into())
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DAY_FMT)
        .map_err(|e| DatabaseError::QueryFailed(format!("bad date '{s}': {e}")).into())
}

fn parse_category(s: &str) -> Result<SessionCategory> {
    match s {
        "work" => Ok(SessionCategory::Work),
        "break" => Ok(SessionCategory::Break),
        "custom" => Ok(SessionCategory::Custom),
        other => Err(DatabaseError::QueryFailed(format!("unknown category '{other}'")).into()),
    }
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn parse_priority(s: &str) -> Result<Priority> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(DatabaseError::QueryFailed(format!("unknown priority '{other}'")).into()),
    }
}

fn day_start(day: NaiveDate) -> String {
    format!("{}T00:00:00+00:00", day.format(DAY_FMT))
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::StartRequest;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn session(user: &str) -> TimerSession {
        TimerSession::start(
            user,
            StartRequest {
                task_name: "review notes".into(),
                duration_seconds: 1500,
                category: SessionCategory::Work,
                priority: None,
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn active_session_roundtrip() {
        let db = Database::open_memory().unwrap();
        let s = session("alice");
        assert!(db.insert_active_session(&s).unwrap());
        let loaded = db.active_session("alice").unwrap().unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.task_name, "review notes");
        assert!(db.active_session("bob").unwrap().is_none());
    }

    #[test]
    fn second_insert_for_same_user_conflicts() {
        let db = Database::open_memory().unwrap();
        assert!(db.insert_active_session(&session("alice")).unwrap());
        assert!(!db.insert_active_session(&session("alice")).unwrap());
    }

    #[test]
    fn stale_version_update_is_rejected() {
        let db = Database::open_memory().unwrap();
        let s = session("alice");
        db.insert_active_session(&s).unwrap();

        let mut first = db.active_session("alice").unwrap().unwrap();
        let mut second = db.active_session("alice").unwrap().unwrap();

        assert!(db.update_active_session(&mut first).unwrap());
        // Second copy still carries the old version and must lose.
        assert!(!db.update_active_session(&mut second).unwrap());
    }

    #[test]
    fn delete_respects_version() {
        let db = Database::open_memory().unwrap();
        let s = session("alice");
        db.insert_active_session(&s).unwrap();
        assert!(!db.delete_active_session("alice", 99).unwrap());
        assert!(db.delete_active_session("alice", s.version).unwrap());
        assert!(db.active_session("alice").unwrap().is_none());
    }

    #[test]
    fn ledger_total_is_sum_of_entries() {
        let db = Database::open_memory().unwrap();
        db.append_ledger("alice", 5, PointSource::Hook, None, "task", now())
            .unwrap();
        db.append_ledger("alice", 10, PointSource::Quote, Some("q1"), "quote", now())
            .unwrap();
        db.append_ledger("alice", -3, PointSource::Admin, None, "adjust", now())
            .unwrap();
        db.append_ledger("bob", 50, PointSource::Nook, None, "pages", now())
            .unwrap();
        assert_eq!(db.total_points("alice").unwrap(), 12);
        assert_eq!(db.total_points("bob").unwrap(), 50);
        assert_eq!(db.total_points("nobody").unwrap(), 0);
    }

    #[test]
    fn badge_insert_is_idempotent() {
        let db = Database::open_memory().unwrap();
        assert!(db.insert_user_badge("alice", "first_task", now()).unwrap());
        assert!(!db.insert_user_badge("alice", "first_task", now()).unwrap());
        assert_eq!(db.user_badges("alice").unwrap().len(), 1);
    }

    #[test]
    fn counters_default_for_new_user() {
        let db = Database::open_memory().unwrap();
        let c = db.counters("alice").unwrap();
        assert_eq!(c.tasks_completed, 0);
        assert!(c.last_completed_day.is_none());
    }

    #[test]
    fn counters_roundtrip() {
        let db = Database::open_memory().unwrap();
        let mut c = db.counters("alice").unwrap();
        c.tasks_completed = 3;
        c.current_streak = 2;
        c.last_completed_day = NaiveDate::from_ymd_opt(2025, 3, 10);
        db.save_counters(&c).unwrap();
        let loaded = db.counters("alice").unwrap();
        assert_eq!(loaded.tasks_completed, 3);
        assert_eq!(loaded.current_streak, 2);
        assert_eq!(loaded.last_completed_day, NaiveDate::from_ymd_opt(2025, 3, 10));
    }

    #[test]
    fn reading_progress_accumulates() {
        let db = Database::open_memory().unwrap();
        db.upsert_book("alice", "b1", "Dune", Some(412)).unwrap();
        db.record_reading("alice", "b1", 30, false, now()).unwrap();
        db.record_reading("alice", "b1", 20, false, now()).unwrap();
        let book = db.book("alice", "b1").unwrap().unwrap();
        assert_eq!(book.pages_read, 50);
        assert!(!book.finished);

        db.record_reading("alice", "b1", 362, true, now()).unwrap();
        assert!(db.book("alice", "b1").unwrap().unwrap().finished);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::open_memory().unwrap();
        let result: Result<()> = db.with_transaction(|db| {
            db.append_ledger("alice", 5, PointSource::Hook, None, "task", now())?;
            Err(CoreError::Conflict("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.total_points("alice").unwrap(), 0);
    }

    #[test]
    fn stats_aggregate_tasks_and_ledger() {
        let db = Database::open_memory().unwrap();
        let task = CompletedTask {
            id: "t1".into(),
            user_id: "alice".into(),
            task_name: "focus".into(),
            category: SessionCategory::Work,
            priority: Some(Priority::High),
            duration_seconds: 1500,
            elapsed_seconds: 1500,
            mood: Some("great".into()),
            points_awarded: 10,
            completed_at: now(),
        };
        db.insert_completed_task(&task).unwrap();
        db.append_ledger("alice", 10, PointSource::Hook, Some("t1"), "task", now())
            .unwrap();
        let stats = db.stats("alice", now().date_naive()).unwrap();
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.tasks_today, 1);
        assert_eq!(stats.focus_seconds_total, 1500);
        assert_eq!(stats.total_points, 10);
        assert_eq!(stats.points_by_source.get("hook"), Some(&10));
        assert_eq!(stats.level, 1);

        // Different day: not today anymore.
        let stats = db
            .stats("alice", NaiveDate::from_ymd_opt(2025, 3, 11).unwrap())
            .unwrap();
        assert_eq!(stats.tasks_today, 0);
        assert_eq!(stats.tasks_completed, 1);
    }
}
