//! Database schema migrations for nookhook.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;
    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// v1: full schema.
///
/// The active-session row carries a `version` column for the per-user
/// optimistic concurrency check; the session body itself is a JSON blob.
/// `user_badges` enforces the (user_id, badge_id) uniqueness invariant at
/// the schema level so duplicate awards are structurally impossible.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS active_sessions (
            user_id   TEXT PRIMARY KEY,
            version   INTEGER NOT NULL,
            data      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ledger (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            amount       INTEGER NOT NULL,
            source       TEXT NOT NULL,
            reference_id TEXT,
            reason       TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger(user_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_user_created ON ledger(user_id, created_at);

        CREATE TABLE IF NOT EXISTS completed_tasks (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            task_name        TEXT NOT NULL,
            category         TEXT NOT NULL,
            priority         TEXT,
            duration_seconds INTEGER NOT NULL,
            elapsed_seconds  INTEGER NOT NULL,
            mood             TEXT,
            points_awarded   INTEGER NOT NULL,
            completed_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_user_completed
            ON completed_tasks(user_id, completed_at);

        CREATE TABLE IF NOT EXISTS user_badges (
            user_id   TEXT NOT NULL,
            badge_id  TEXT NOT NULL,
            earned_at TEXT NOT NULL,
            PRIMARY KEY (user_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS user_counters (
            user_id            TEXT PRIMARY KEY,
            tasks_completed    INTEGER NOT NULL DEFAULT 0,
            books_finished     INTEGER NOT NULL DEFAULT 0,
            quotes_verified    INTEGER NOT NULL DEFAULT 0,
            current_streak     INTEGER NOT NULL DEFAULT 0,
            last_completed_day TEXT,
            reading_streak     INTEGER NOT NULL DEFAULT 0,
            last_reading_day   TEXT
        );

        CREATE TABLE IF NOT EXISTS books (
            user_id     TEXT NOT NULL,
            book_id     TEXT NOT NULL,
            title       TEXT NOT NULL DEFAULT '',
            total_pages INTEGER,
            pages_read  INTEGER NOT NULL DEFAULT 0,
            finished    INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, book_id)
        );

        CREATE TABLE IF NOT EXISTS reading_sessions (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    TEXT NOT NULL,
            book_id    TEXT NOT NULL,
            pages_read INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reading_user_created
            ON reading_sessions(user_id, created_at);

        CREATE TABLE IF NOT EXISTS quotes (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id          TEXT NOT NULL,
            book_id          TEXT NOT NULL,
            quote_text       TEXT NOT NULL,
            page_number      INTEGER NOT NULL,
            status           TEXT NOT NULL,
            reward_amount    INTEGER NOT NULL,
            submitted_at     TEXT NOT NULL,
            reviewed_at      TEXT,
            reviewed_by      TEXT,
            rejection_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_quotes_status ON quotes(status, submitted_at);
        CREATE INDEX IF NOT EXISTS idx_quotes_user ON quotes(user_id);",
    )?;
    set_schema_version(conn, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);
    }

    #[test]
    fn user_badges_uniqueness_is_schema_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO user_badges (user_id, badge_id, earned_at) VALUES ('u', 'b', 't')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO user_badges (user_id, badge_id, earned_at) VALUES ('u', 'b', 't')",
            [],
        );
        assert!(dup.is_err());
    }
}
