use chrono::Utc;
use nookhook_core::storage::Database;

pub fn run(user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.stats(user, Utc::now().date_naive())?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
