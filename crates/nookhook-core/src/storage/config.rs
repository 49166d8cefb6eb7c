//! TOML-based application configuration.
//!
//! Holds the reward tuning knobs (mood bonuses, streak tiers, quote reward,
//! daily goals) and the badge catalog. Stored at `<data_dir>/config.toml`;
//! read-only at runtime from the core's perspective.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::rewards::BadgeCatalog;

/// One streak bonus tier: the bonus applies once the streak reaches
/// `min_days`, until a higher tier takes over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreakTier {
    pub min_days: u64,
    pub bonus: i64,
}

/// Reward tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Flat additive bonus per mood tag on session completion.
    #[serde(default = "default_mood_bonuses")]
    pub mood_bonuses: HashMap<String, i64>,
    /// Streak bonus tiers; the highest tier at or below the current streak
    /// applies, once per day on the first completed session.
    #[serde(default = "default_streak_tiers")]
    pub streak_tiers: Vec<StreakTier>,
    /// Level-up bonus is this times the new level.
    #[serde(default = "default_level_up_multiplier")]
    pub level_up_multiplier: i64,
    /// Flat bonus for each newly earned badge.
    #[serde(default = "default_badge_bonus")]
    pub badge_bonus: i64,
    /// Fixed reward for a verified quote.
    #[serde(default = "default_quote_reward")]
    pub quote_reward: i64,
    /// (task count, bonus) pairs awarded when the day's completion count
    /// reaches the threshold exactly.
    #[serde(default = "default_daily_goals")]
    pub daily_goals: Vec<DailyGoal>,
    /// Flat bonus for finishing a book.
    #[serde(default = "default_book_finish_bonus")]
    pub book_finish_bonus: i64,
    /// One reading point per this many pages (minimum one per session).
    #[serde(default = "default_pages_per_point")]
    pub pages_per_point: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyGoal {
    pub tasks: u64,
    pub bonus: i64,
}

impl RewardsConfig {
    /// Bonus for the given mood tag, zero when unknown.
    pub fn mood_bonus(&self, mood: &str) -> i64 {
        self.mood_bonuses.get(mood).copied().unwrap_or(0)
    }

    /// Streak bonus for a streak length: the highest tier reached.
    pub fn streak_bonus(&self, streak_days: u64) -> i64 {
        self.streak_tiers
            .iter()
            .filter(|tier| streak_days >= tier.min_days)
            .map(|tier| tier.bonus)
            .max()
            .unwrap_or(0)
    }
}

fn default_mood_bonuses() -> HashMap<String, i64> {
    HashMap::from([
        ("great".to_string(), 5),
        ("good".to_string(), 3),
        ("okay".to_string(), 1),
        ("tired".to_string(), 0),
        ("stressed".to_string(), 0),
    ])
}

fn default_streak_tiers() -> Vec<StreakTier> {
    vec![
        StreakTier { min_days: 1, bonus: 2 },
        StreakTier { min_days: 7, bonus: 5 },
        StreakTier { min_days: 30, bonus: 10 },
        StreakTier { min_days: 100, bonus: 25 },
    ]
}

fn default_level_up_multiplier() -> i64 {
    10
}
fn default_badge_bonus() -> i64 {
    25
}
fn default_quote_reward() -> i64 {
    10
}
fn default_daily_goals() -> Vec<DailyGoal> {
    vec![DailyGoal { tasks: 5, bonus: 25 }, DailyGoal { tasks: 10, bonus: 50 }]
}
fn default_book_finish_bonus() -> i64 {
    100
}
fn default_pages_per_point() -> u32 {
    10
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            mood_bonuses: default_mood_bonuses(),
            streak_tiers: default_streak_tiers(),
            level_up_multiplier: default_level_up_multiplier(),
            badge_bonus: default_badge_bonus(),
            quote_reward: default_quote_reward(),
            daily_goals: default_daily_goals(),
            book_finish_bonus: default_book_finish_bonus(),
            pages_per_point: default_pages_per_point(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub badges: BadgeCatalog,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        Ok(super::data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path,
                        message: e.to_string(),
                    })?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning the default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.rewards.quote_reward, 10);
        assert_eq!(parsed.rewards.mood_bonus("great"), 5);
        assert_eq!(parsed.badges.len(), cfg.badges.len());
    }

    #[test]
    fn unknown_mood_is_zero() {
        let cfg = RewardsConfig::default();
        assert_eq!(cfg.mood_bonus("confused"), 0);
    }

    #[test]
    fn streak_bonus_picks_highest_reached_tier() {
        let cfg = RewardsConfig::default();
        assert_eq!(cfg.streak_bonus(0), 0);
        assert_eq!(cfg.streak_bonus(1), 2);
        assert_eq!(cfg.streak_bonus(6), 2);
        assert_eq!(cfg.streak_bonus(7), 5);
        assert_eq!(cfg.streak_bonus(30), 10);
        assert_eq!(cfg.streak_bonus(365), 25);
    }

    #[test]
    fn empty_toml_gets_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.rewards.level_up_multiplier, 10);
        assert_eq!(cfg.rewards.daily_goals.len(), 2);
        assert!(!cfg.badges.is_empty());
    }
}
