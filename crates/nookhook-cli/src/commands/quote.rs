use chrono::Utc;
use clap::Subcommand;
use nookhook_core::quotes::{QuoteQueue, ReviewDecision};
use nookhook_core::storage::{Config, Database};

#[derive(Subcommand)]
pub enum QuoteAction {
    /// Submit a quote for verification
    Submit {
        /// Book identifier
        book: String,
        /// The quoted text
        text: String,
        /// Page the quote appears on
        #[arg(long)]
        page: u32,
    },
    /// List pending submissions, oldest first
    Pending {
        /// Maximum number to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Verify a pending submission, crediting its reward
    Verify {
        /// Submission id
        id: i64,
    },
    /// Reject a pending submission
    Reject {
        /// Submission id
        id: i64,
        /// Why the quote was rejected
        #[arg(long)]
        reason: String,
    },
}

pub fn run(user: &str, action: QuoteAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let queue = QuoteQueue::new(&db, &config);

    match action {
        QuoteAction::Submit { book, text, page } => {
            let submission = queue.submit(user, &book, &text, page)?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
        QuoteAction::Pending { limit } => {
            let pending = queue.pending(limit)?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        QuoteAction::Verify { id } => {
            let outcome = queue.review(id, user, ReviewDecision::Verify, None, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        QuoteAction::Reject { id, reason } => {
            let outcome =
                queue.review(id, user, ReviewDecision::Reject, Some(&reason), Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}
