//! Quote submission and admin verification queue.
//!
//! Users submit quotes from their books; an admin actor reviews each one
//! exactly once, moving it Pending -> Verified or Pending -> Rejected. A
//! verified quote atomically credits the fixed reward to the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::rewards::{BadgeCatalog, SettlementEngine, SettlementOutcome};
use crate::storage::{Config, Database, RewardsConfig};

/// Quote text bounds, in characters.
pub const MIN_QUOTE_LEN: usize = 10;
pub const MAX_QUOTE_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Pending,
    Verified,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Verified => "verified",
            QuoteStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QuoteStatus::Pending),
            "verified" => Some(QuoteStatus::Verified),
            "rejected" => Some(QuoteStatus::Rejected),
            _ => None,
        }
    }
}

/// Admin decision on a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Verify,
    Reject,
}

/// One quote submission. Transitions exactly once out of Pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSubmission {
    pub id: i64,
    pub user_id: String,
    pub book_id: String,
    pub quote_text: String,
    pub page_number: u32,
    pub status: QuoteStatus,
    /// Fixed at submission time so later config changes don't reprice
    /// already-queued quotes.
    pub reward_amount: i64,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Result of an admin review.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewOutcome {
    pub submission: QuoteSubmission,
    /// Present only for a Verified decision.
    pub settlement: Option<SettlementOutcome>,
    pub event: Event,
}

/// The admin-facing verification worklist.
pub struct QuoteQueue<'a> {
    db: &'a Database,
    rewards: &'a RewardsConfig,
    badges: &'a BadgeCatalog,
}

impl<'a> QuoteQueue<'a> {
    pub fn new(db: &'a Database, config: &'a Config) -> Self {
        Self {
            db,
            rewards: &config.rewards,
            badges: &config.badges,
        }
    }

    /// Submit a new quote for verification.
    ///
    /// # Errors
    /// `Validation` for text outside 10-1000 characters or a page number
    /// that is zero or beyond the book's known page count; `Conflict` when
    /// the same (user, book, text) is already pending or verified;
    /// `NotFound` for an unregistered book.
    pub fn submit(
        &self,
        user_id: &str,
        book_id: &str,
        quote_text: &str,
        page_number: u32,
    ) -> Result<QuoteSubmission> {
        let quote_text = quote_text.trim();
        let len = quote_text.chars().count();
        if len < MIN_QUOTE_LEN {
            return Err(CoreError::validation(
                "quote_text",
                format!("must be at least {MIN_QUOTE_LEN} characters"),
            ));
        }
        if len > MAX_QUOTE_LEN {
            return Err(CoreError::validation(
                "quote_text",
                format!("must be at most {MAX_QUOTE_LEN} characters"),
            ));
        }
        if page_number == 0 {
            return Err(CoreError::validation("page_number", "must be positive"));
        }

        let book = self
            .db
            .book(user_id, book_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "book",
                id: book_id.to_string(),
            })?;
        if let Some(total) = book.total_pages {
            if page_number > total {
                return Err(CoreError::validation(
                    "page_number",
                    format!("page {page_number} exceeds the book's {total} pages"),
                ));
            }
        }

        if self.db.duplicate_quote_exists(user_id, book_id, quote_text)? {
            return Err(CoreError::Conflict(
                "this quote has already been submitted".into(),
            ));
        }

        let mut submission = QuoteSubmission {
            id: 0,
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            quote_text: quote_text.to_string(),
            page_number,
            status: QuoteStatus::Pending,
            reward_amount: self.rewards.quote_reward,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
        };
        submission.id = self.db.insert_quote(&submission)?;
        Ok(submission)
    }

    /// Pending submissions, oldest first.
    pub fn pending(&self, limit: u32) -> Result<Vec<QuoteSubmission>> {
        self.db.pending_quotes(limit)
    }

    /// Apply an admin decision to a pending submission.
    ///
    /// A Verified decision appends the fixed quote reward to the ledger in
    /// the same transaction as the status flip; a Rejected decision stores
    /// the mandatory reason and touches no balances.
    ///
    /// # Errors
    /// `NotFound` for an unknown id; `InvalidState` if the submission is no
    /// longer Pending; `Validation` for a rejection without a reason.
    pub fn review(
        &self,
        submission_id: i64,
        reviewer_id: &str,
        decision: ReviewDecision,
        rejection_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let submission = self
            .db
            .quote(submission_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "quote submission",
                id: submission_id.to_string(),
            })?;
        if submission.status != QuoteStatus::Pending {
            return Err(CoreError::InvalidState {
                operation: "review",
                state: submission.status.as_str().to_string(),
            });
        }

        let reason = match decision {
            ReviewDecision::Verify => None,
            ReviewDecision::Reject => {
                let reason = rejection_reason.map(str::trim).unwrap_or("");
                if reason.is_empty() {
                    return Err(CoreError::validation(
                        "rejection_reason",
                        "required when rejecting",
                    ));
                }
                Some(reason.to_string())
            }
        };
        let status = match decision {
            ReviewDecision::Verify => QuoteStatus::Verified,
            ReviewDecision::Reject => QuoteStatus::Rejected,
        };

        let engine = SettlementEngine::new(self.db, self.rewards, self.badges);
        let settlement = self.db.with_transaction(|db| {
            // The WHERE status = 'pending' guard makes a racing second
            // review lose here even after the read above.
            if !db.update_quote_review(
                submission_id,
                status,
                reviewer_id,
                reason.as_deref(),
                now,
            )? {
                return Err(CoreError::InvalidState {
                    operation: "review",
                    state: "already reviewed".to_string(),
                });
            }
            match decision {
                ReviewDecision::Verify => Ok(Some(engine.settle_quote(
                    &submission.user_id,
                    submission_id,
                    submission.reward_amount,
                    now,
                )?)),
                ReviewDecision::Reject => Ok(None),
            }
        })?;

        info!(
            submission_id,
            reviewer_id,
            verified = matches!(decision, ReviewDecision::Verify),
            "quote reviewed"
        );

        let submission = self
            .db
            .quote(submission_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "quote submission",
                id: submission_id.to_string(),
            })?;
        let event = Event::QuoteReviewed {
            submission_id,
            user_id: submission.user_id.clone(),
            reviewer_id: reviewer_id.to_string(),
            verified: matches!(decision, ReviewDecision::Verify),
            at: now,
        };
        Ok(ReviewOutcome {
            submission,
            settlement,
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const QUOTE: &str = "Fear is the mind-killer.";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn setup() -> (Database, Config) {
        let db = Database::open_memory().unwrap();
        db.upsert_book("alice", "b1", "Dune", Some(412)).unwrap();
        (db, Config::default())
    }

    #[test]
    fn submit_creates_pending_with_fixed_reward() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let s = queue.submit("alice", "b1", QUOTE, 12).unwrap();
        assert_eq!(s.status, QuoteStatus::Pending);
        assert_eq!(s.reward_amount, 10);
        assert_eq!(queue.pending(10).unwrap().len(), 1);
    }

    #[test]
    fn submit_validates_bounds() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        assert!(matches!(
            queue.submit("alice", "b1", "too short", 1).unwrap_err(),
            CoreError::Validation { .. }
        ));
        assert!(matches!(
            queue
                .submit("alice", "b1", &"x".repeat(1001), 1)
                .unwrap_err(),
            CoreError::Validation { .. }
        ));
        assert!(matches!(
            queue.submit("alice", "b1", QUOTE, 0).unwrap_err(),
            CoreError::Validation { .. }
        ));
        // Page beyond the book's known page count.
        assert!(matches!(
            queue.submit("alice", "b1", QUOTE, 413).unwrap_err(),
            CoreError::Validation { .. }
        ));
    }

    #[test]
    fn duplicate_submission_conflicts_while_pending() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        queue.submit("alice", "b1", QUOTE, 12).unwrap();
        assert!(matches!(
            queue.submit("alice", "b1", QUOTE, 12).unwrap_err(),
            CoreError::Conflict(_)
        ));
    }

    #[test]
    fn rejected_quote_can_be_resubmitted() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let s = queue.submit("alice", "b1", QUOTE, 12).unwrap();
        queue
            .review(s.id, "admin", ReviewDecision::Reject, Some("page mismatch"), t0())
            .unwrap();
        assert!(queue.submit("alice", "b1", QUOTE, 12).is_ok());
    }

    #[test]
    fn verify_credits_exactly_one_ledger_entry() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let s = queue.submit("alice", "b1", QUOTE, 12).unwrap();
        let outcome = queue
            .review(s.id, "admin", ReviewDecision::Verify, None, t0())
            .unwrap();
        assert_eq!(outcome.submission.status, QuoteStatus::Verified);
        assert_eq!(outcome.submission.reviewed_by.as_deref(), Some("admin"));

        let entries = db.ledger_entries("alice", 50).unwrap();
        let quote_entries: Vec<_> = entries
            .iter()
            .filter(|e| e.source == crate::rewards::PointSource::Quote)
            .collect();
        assert_eq!(quote_entries.len(), 1);
        assert_eq!(quote_entries[0].amount, 10);
        // First verified quote also earns the first_quote badge.
        let settlement = outcome.settlement.unwrap();
        assert!(settlement.new_badges.contains(&"first_quote".to_string()));
    }

    #[test]
    fn reject_requires_reason_and_creates_no_entry() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let s = queue.submit("alice", "b1", QUOTE, 12).unwrap();

        assert!(matches!(
            queue
                .review(s.id, "admin", ReviewDecision::Reject, None, t0())
                .unwrap_err(),
            CoreError::Validation { .. }
        ));

        let outcome = queue
            .review(
                s.id,
                "admin",
                ReviewDecision::Reject,
                Some("page number mismatch"),
                t0(),
            )
            .unwrap();
        assert_eq!(outcome.submission.status, QuoteStatus::Rejected);
        assert_eq!(
            outcome.submission.rejection_reason.as_deref(),
            Some("page number mismatch")
        );
        assert!(outcome.settlement.is_none());
        assert_eq!(db.total_points("alice").unwrap(), 0);
    }

    #[test]
    fn no_re_review() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let s = queue.submit("alice", "b1", QUOTE, 12).unwrap();
        queue
            .review(s.id, "admin", ReviewDecision::Verify, None, t0())
            .unwrap();
        let err = queue
            .review(s.id, "admin", ReviewDecision::Verify, None, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        // Still exactly one reward.
        assert_eq!(db.total_points("alice").unwrap(), 10 + 25);
    }

    #[test]
    fn unknown_submission_is_not_found() {
        let (db, config) = setup();
        let queue = QuoteQueue::new(&db, &config);
        let err = queue
            .review(999, "admin", ReviewDecision::Verify, None, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
