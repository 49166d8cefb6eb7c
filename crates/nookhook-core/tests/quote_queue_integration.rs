//! Integration tests for the quote verification workflow.
//!
//! Covers the submission funnel, admin review transitions, and the reward
//! side effects of verification against the in-memory database.

use chrono::{DateTime, TimeZone, Utc};
use nookhook_core::{
    Config, CoreError, Database, PointSource, QuoteQueue, QuoteStatus, ReviewDecision,
};

const QUOTE: &str = "It was a bright cold day in April, and the clocks were striking thirteen.";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

fn setup() -> (Database, Config) {
    let db = Database::open_memory().unwrap();
    db.upsert_book("alice", "1984", "Nineteen Eighty-Four", Some(328))
        .unwrap();
    (db, Config::default())
}

#[test]
fn submit_review_verify_credits_once() {
    let (db, config) = setup();
    let queue = QuoteQueue::new(&db, &config);

    let submission = queue.submit("alice", "1984", QUOTE, 1).unwrap();
    assert_eq!(submission.status, QuoteStatus::Pending);

    let outcome = queue
        .review(submission.id, "admin", ReviewDecision::Verify, None, t0())
        .unwrap();
    assert_eq!(outcome.submission.status, QuoteStatus::Verified);
    assert_eq!(outcome.submission.reviewed_by.as_deref(), Some("admin"));

    let quote_entries: Vec<_> = db
        .ledger_entries("alice", 50)
        .unwrap()
        .into_iter()
        .filter(|e| e.source == PointSource::Quote)
        .collect();
    assert_eq!(quote_entries.len(), 1);
    assert_eq!(quote_entries[0].amount, 10);

    // The slot is spent: a second review of any kind fails.
    for decision in [ReviewDecision::Verify, ReviewDecision::Reject] {
        let err = queue
            .review(submission.id, "admin", decision, Some("late"), t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }
    // And the ledger still holds exactly one quote reward.
    let count = db
        .ledger_entries("alice", 50)
        .unwrap()
        .into_iter()
        .filter(|e| e.source == PointSource::Quote)
        .count();
    assert_eq!(count, 1);
}

#[test]
fn duplicate_detection_spans_pending_and_verified() {
    let (db, config) = setup();
    let queue = QuoteQueue::new(&db, &config);

    let s = queue.submit("alice", "1984", QUOTE, 1).unwrap();
    assert!(matches!(
        queue.submit("alice", "1984", QUOTE, 1).unwrap_err(),
        CoreError::Conflict(_)
    ));

    // Still a duplicate after verification.
    queue
        .review(s.id, "admin", ReviewDecision::Verify, None, t0())
        .unwrap();
    assert!(matches!(
        queue.submit("alice", "1984", QUOTE, 1).unwrap_err(),
        CoreError::Conflict(_)
    ));

    // A different user quoting the same passage is fine.
    db.upsert_book("bob", "1984", "Nineteen Eighty-Four", Some(328))
        .unwrap();
    queue.submit("bob", "1984", QUOTE, 1).unwrap();
}

#[test]
fn rejection_stores_reason_and_pays_nothing() {
    let (db, config) = setup();
    let queue = QuoteQueue::new(&db, &config);

    let s = queue.submit("alice", "1984", QUOTE, 1).unwrap();
    let outcome = queue
        .review(
            s.id,
            "admin",
            ReviewDecision::Reject,
            Some("not on that page"),
            t0(),
        )
        .unwrap();
    assert_eq!(outcome.submission.status, QuoteStatus::Rejected);
    assert_eq!(
        outcome.submission.rejection_reason.as_deref(),
        Some("not on that page")
    );
    assert!(outcome.settlement.is_none());
    assert_eq!(db.total_points("alice").unwrap(), 0);
}

#[test]
fn pending_queue_is_oldest_first() {
    let (db, config) = setup();
    let queue = QuoteQueue::new(&db, &config);

    let first = queue.submit("alice", "1984", QUOTE, 1).unwrap();
    let second = queue
        .submit("alice", "1984", "War is peace. Freedom is slavery.", 4)
        .unwrap();

    let pending = queue.pending(10).unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, first.id);
    assert_eq!(pending[1].id, second.id);

    // Reviewed submissions leave the queue.
    queue
        .review(first.id, "admin", ReviewDecision::Verify, None, t0())
        .unwrap();
    let pending = queue.pending(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[test]
fn verified_quotes_feed_badges_and_stats() {
    let (db, config) = setup();
    let queue = QuoteQueue::new(&db, &config);

    let s = queue.submit("alice", "1984", QUOTE, 1).unwrap();
    let outcome = queue
        .review(s.id, "admin", ReviewDecision::Verify, None, t0())
        .unwrap();
    let settlement = outcome.settlement.unwrap();
    assert!(settlement.new_badges.contains(&"first_quote".to_string()));

    let stats = db.stats("alice", t0().date_naive()).unwrap();
    assert_eq!(stats.quotes_verified, 1);
    // 10 reward + 25 badge bonus.
    assert_eq!(stats.total_points, 35);
}
