use clap::Subcommand;
use nookhook_core::storage::{Config, Database};
use nookhook_core::timer::{Priority, SessionCategory, StartRequest, TimerService};
use nookhook_core::SystemClock;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a new session
    Start {
        /// Task name shown on the session
        task: String,
        /// Session length in minutes
        #[arg(long, default_value = "25")]
        minutes: u32,
        /// Session category: work, break, or custom
        #[arg(long, default_value = "work")]
        category: String,
        /// Task priority: low, medium, or high
        #[arg(long)]
        priority: Option<String>,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Abandon the session without settlement
    Cancel,
    /// Print current session state as JSON
    Status,
    /// Complete the session and settle rewards
    Complete {
        /// Mood at completion (great, good, okay, tired, stressed)
        #[arg(long)]
        mood: Option<String>,
    },
}

fn parse_category(s: &str) -> Result<SessionCategory, Box<dyn std::error::Error>> {
    match s {
        "work" => Ok(SessionCategory::Work),
        "break" => Ok(SessionCategory::Break),
        "custom" => Ok(SessionCategory::Custom),
        other => Err(format!("unknown category: {other}").into()),
    }
}

fn parse_priority(s: &str) -> Result<Priority, Box<dyn std::error::Error>> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(format!("unknown priority: {other}").into()),
    }
}

pub fn run(user: &str, action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let clock = SystemClock;
    let service = TimerService::new(&db, &config, &clock);

    match action {
        TimerAction::Start {
            task,
            minutes,
            category,
            priority,
        } => {
            let req = StartRequest {
                task_name: task,
                duration_seconds: minutes.saturating_mul(60),
                category: parse_category(&category)?,
                priority: priority.as_deref().map(parse_priority).transpose()?,
            };
            let (_, event) = service.start(user, req)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Pause => {
            let (_, event) = service.pause(user)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Resume => {
            let (_, event) = service.resume(user)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Cancel => {
            let (_, event) = service.cancel(user)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Status => {
            let snapshot = service.status(user)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        TimerAction::Complete { mood } => {
            let outcome = service.complete(user, mood.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}
