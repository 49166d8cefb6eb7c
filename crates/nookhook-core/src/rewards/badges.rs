//! Static badge catalog and the stateless evaluator over it.
//!
//! Badge rules are configuration data, not code: each rule maps an aggregate
//! counter to a threshold. `evaluate` is pure and deterministic; the caller
//! diffs the result against already-earned badges and persists only the
//! delta. Re-inserting an earned badge is a no-op at the storage layer.

use serde::{Deserialize, Serialize};

/// Aggregate counter a badge rule is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeMetric {
    BooksFinished,
    TasksCompleted,
    StreakDays,
    TotalPoints,
    QuotesVerified,
}

/// One immutable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeRule {
    pub badge_id: String,
    pub metric: BadgeMetric,
    pub threshold: u64,
}

impl BadgeRule {
    fn new(badge_id: &str, metric: BadgeMetric, threshold: u64) -> Self {
        Self {
            badge_id: badge_id.to_string(),
            metric,
            threshold,
        }
    }
}

/// A user's aggregate counters at evaluation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserCounters {
    pub books_finished: u64,
    pub tasks_completed: u64,
    pub streak_days: u64,
    pub total_points: i64,
    pub quotes_verified: u64,
}

impl UserCounters {
    fn value_for(&self, metric: BadgeMetric) -> u64 {
        match metric {
            BadgeMetric::BooksFinished => self.books_finished,
            BadgeMetric::TasksCompleted => self.tasks_completed,
            BadgeMetric::StreakDays => self.streak_days,
            BadgeMetric::TotalPoints => self.total_points.max(0) as u64,
            BadgeMetric::QuotesVerified => self.quotes_verified,
        }
    }
}

/// The full badge catalog. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeCatalog {
    pub rules: Vec<BadgeRule>,
}

impl BadgeCatalog {
    /// Every badge whose threshold is met by `counters`, in catalog order.
    ///
    /// Pure and side-effect-free; evaluating twice with the same counters
    /// yields the same set.
    pub fn evaluate(&self, counters: &UserCounters) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| counters.value_for(rule.metric) >= rule.threshold)
            .map(|rule| rule.badge_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for BadgeCatalog {
    /// The tiered catalog: bronze/silver/gold/platinum per metric, plus
    /// first-time and point-milestone badges.
    fn default() -> Self {
        use BadgeMetric::*;
        let mut rules = vec![
            BadgeRule::new("first_task", TasksCompleted, 1),
            BadgeRule::new("first_book", BooksFinished, 1),
            BadgeRule::new("first_quote", QuotesVerified, 1),
        ];
        for (threshold, tier) in [(50, "bronze"), (250, "silver"), (1000, "gold"), (5000, "platinum")] {
            rules.push(BadgeRule::new(
                &format!("tasks_completed_{threshold}_{tier}"),
                TasksCompleted,
                threshold,
            ));
        }
        for (threshold, tier) in [(5, "bronze"), (25, "silver"), (100, "gold"), (500, "platinum")] {
            rules.push(BadgeRule::new(
                &format!("books_finished_{threshold}_{tier}"),
                BooksFinished,
                threshold,
            ));
        }
        for (threshold, tier) in [(7, "bronze"), (30, "silver"), (100, "gold"), (365, "platinum")] {
            rules.push(BadgeRule::new(
                &format!("streak_{threshold}_{tier}"),
                StreakDays,
                threshold,
            ));
        }
        for (threshold, tier) in [(10, "bronze"), (50, "silver"), (200, "gold"), (1000, "platinum")] {
            rules.push(BadgeRule::new(
                &format!("quotes_verified_{threshold}_{tier}"),
                QuotesVerified,
                threshold,
            ));
        }
        for threshold in [100, 500, 1000, 5000, 10000] {
            rules.push(BadgeRule::new(
                &format!("points_{threshold}"),
                TotalPoints,
                threshold,
            ));
        }
        Self { rules }
    }
}
