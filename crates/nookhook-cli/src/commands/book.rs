use chrono::Utc;
use clap::Subcommand;
use nookhook_core::rewards::SettlementEngine;
use nookhook_core::storage::{Config, Database};

#[derive(Subcommand)]
pub enum BookAction {
    /// Register a book (or update its title/page count)
    Add {
        /// Stable book identifier, e.g. an ISBN or slug
        id: String,
        /// Book title
        title: String,
        /// Total page count, if known
        #[arg(long)]
        pages: Option<u32>,
    },
    /// Log reading progress and settle the reward
    Log {
        /// Book identifier
        id: String,
        /// Pages read in this sitting
        pages: u32,
        /// Mark the book finished
        #[arg(long)]
        finished: bool,
    },
    /// Show a registered book as JSON
    Show {
        /// Book identifier
        id: String,
    },
}

pub fn run(user: &str, action: BookAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();

    match action {
        BookAction::Add { id, title, pages } => {
            db.upsert_book(user, &id, &title, pages)?;
            let book = db.book(user, &id)?;
            println!("{}", serde_json::to_string_pretty(&book)?);
        }
        BookAction::Log { id, pages, finished } => {
            let engine = SettlementEngine::new(&db, &config.rewards, &config.badges);
            let outcome = db.with_transaction(|_| {
                engine.settle_reading(user, &id, pages, finished, Utc::now())
            })?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        BookAction::Show { id } => match db.book(user, &id)? {
            Some(book) => println!("{}", serde_json::to_string_pretty(&book)?),
            None => {
                eprintln!("unknown book: {id}");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
