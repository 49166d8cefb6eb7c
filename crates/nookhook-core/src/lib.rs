//! # Nook & Hook Core Library
//!
//! Core business logic for Nook & Hook, a reading tracker ("Nook") fused with
//! a focus-timer productivity tool ("Hook") that settles both into one
//! gamified reward economy. All operations are exposed through a standalone
//! CLI binary; any outer surface (web, desktop) is a thin layer over this
//! library.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-based session state machine with no background
//!   threads; callers query status and drive transitions
//! - **Rewards**: Append-only points ledger, derived levels, settlement
//!   engine, and a threshold-based badge catalog
//! - **Quotes**: Submission queue with single-shot admin verification
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerService`]: Per-user session lifecycle against storage
//! - [`SettlementEngine`]: Atomic reward settlement for sessions and reading
//! - [`QuoteQueue`]: Quote verification worklist
//! - [`Database`]: SQLite persistence layer
//! - [`Config`]: Reward tuning and badge catalog configuration

pub mod clock;
pub mod error;
pub mod events;
pub mod quotes;
pub mod rewards;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result};
pub use events::Event;
pub use quotes::{QuoteQueue, QuoteStatus, QuoteSubmission, ReviewDecision, ReviewOutcome};
pub use rewards::{
    level_for, points_to_next_level, BadgeCatalog, BadgeMetric, BadgeRule, LedgerEntry,
    PointSource, SettlementEngine, SettlementOutcome, UserCounters,
};
pub use storage::{BookRecord, CompletedTask, Config, Database, RewardsConfig, Stats};
pub use timer::{
    CompleteOutcome, Priority, SessionCategory, SessionState, SessionStatus, StartRequest,
    TimerService, TimerSession,
};
