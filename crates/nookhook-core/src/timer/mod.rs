//! Timer sessions and their caller-driven lifecycle.
//!
//! There is no background thread: the session records wall-clock instants
//! and every public operation takes effect relative to the clock's `now`.

mod service;
mod session;

pub use service::{CompleteOutcome, TimerService};
pub use session::{
    Priority, SessionCategory, SessionState, SessionStatus, StartRequest, TimerSession,
    MAX_DURATION_SECS, MAX_TASK_NAME_LEN, MIN_DURATION_SECS,
};
