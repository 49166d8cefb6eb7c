use clap::Subcommand;
use nookhook_core::rewards::{level_for, points_to_next_level};
use nookhook_core::storage::Database;

#[derive(Subcommand)]
pub enum RewardsAction {
    /// Current points balance and level
    Balance,
    /// Recent ledger entries, newest first
    Ledger {
        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Earned badges
    Badges,
}

pub fn run(user: &str, action: RewardsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        RewardsAction::Balance => {
            let total = db.total_points(user)?;
            let level = level_for(total);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "user_id": user,
                    "total_points": total,
                    "level": level,
                    "points_to_next_level": points_to_next_level(total),
                }))?
            );
        }
        RewardsAction::Ledger { limit } => {
            let entries = db.ledger_entries(user, limit)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        RewardsAction::Badges => {
            let badges: Vec<_> = db
                .user_badges(user)?
                .into_iter()
                .map(|(badge_id, earned_at)| {
                    serde_json::json!({ "badge_id": badge_id, "earned_at": earned_at })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&badges)?);
        }
    }
    Ok(())
}
