//! Append-only points ledger.
//!
//! The ledger is the source of truth for a user's balance: total points is
//! always the sum of entries, and level is derived from that total. Neither
//! is ever stored independently, so nothing can drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a ledger entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointSource {
    /// Reading side: book progress, finished books.
    Nook,
    /// Productivity side: completed timer sessions.
    Hook,
    /// Level-up and badge bonuses.
    System,
    /// Manual adjustment by an admin actor.
    Admin,
    /// Verified quote submissions.
    Quote,
}

impl PointSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PointSource::Nook => "nook",
            PointSource::Hook => "hook",
            PointSource::System => "system",
            PointSource::Admin => "admin",
            PointSource::Quote => "quote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nook" => Some(PointSource::Nook),
            "hook" => Some(PointSource::Hook),
            "system" => Some(PointSource::System),
            "admin" => Some(PointSource::Admin),
            "quote" => Some(PointSource::Quote),
            _ => None,
        }
    }
}

/// One immutable ledger entry. Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    /// Signed; deductions are negative entries, not edits.
    pub amount: i64,
    pub source: PointSource,
    /// Optional link to the triggering record (task, quote, book).
    pub reference_id: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Level for a point total: `floor(sqrt(points / 100)) + 1`.
///
/// Level 1 covers 0-99 points, level 2 covers 100-399, level 3 covers
/// 400-899, and so on. Monotonic non-decreasing; defined for any total
/// (negative totals clamp to level 1).
pub fn level_for(total_points: i64) -> u32 {
    if total_points <= 0 {
        return 1;
    }
    ((total_points / 100) as f64).sqrt().floor() as u32 + 1
}

/// Points still needed to reach the next level threshold.
pub fn points_to_next_level(total_points: i64) -> i64 {
    let current = level_for(total_points) as i64;
    current * current * 100 - total_points.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
        assert_eq!(level_for(399), 2);
        assert_eq!(level_for(400), 3);
        assert_eq!(level_for(899), 3);
        assert_eq!(level_for(900), 4);
    }

    #[test]
    fn negative_totals_clamp_to_level_one() {
        assert_eq!(level_for(-50), 1);
    }

    #[test]
    fn next_level_distance() {
        assert_eq!(points_to_next_level(0), 100);
        assert_eq!(points_to_next_level(100), 300); // level 2 ends at 400
        assert_eq!(points_to_next_level(399), 1);
    }

    #[test]
    fn source_roundtrip() {
        for source in [
            PointSource::Nook,
            PointSource::Hook,
            PointSource::System,
            PointSource::Admin,
            PointSource::Quote,
        ] {
            assert_eq!(PointSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(PointSource::parse("shop"), None);
    }

    proptest! {
        #[test]
        fn level_is_monotonic(a in 0i64..5_000_000, b in 0i64..5_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for(lo) <= level_for(hi));
        }

        #[test]
        fn next_level_is_positive_and_reaches(total in 0i64..5_000_000) {
            let needed = points_to_next_level(total);
            prop_assert!(needed > 0);
            prop_assert!(level_for(total + needed) > level_for(total));
        }
    }
}
