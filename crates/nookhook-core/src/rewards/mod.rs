mod badges;
mod ledger;
mod settlement;

pub use badges::{BadgeCatalog, BadgeMetric, BadgeRule, UserCounters};
pub use ledger::{level_for, points_to_next_level, LedgerEntry, PointSource};
pub use settlement::{SettlementEngine, SettlementOutcome};
