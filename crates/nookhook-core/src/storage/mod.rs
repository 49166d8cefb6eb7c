mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, RewardsConfig, StreakTier};
pub use database::{BookRecord, CompletedTask, CounterRow, Database, Stats};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/nookhook[-dev]/` based on NOOKHOOK_ENV.
///
/// Set NOOKHOOK_ENV=dev to use a separate development data directory.
///
/// # Errors
/// Returns an error if the config directory cannot be created.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NOOKHOOK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("nookhook-dev")
    } else {
        base_dir.join("nookhook")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
