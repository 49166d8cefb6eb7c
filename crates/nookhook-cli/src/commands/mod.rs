pub mod book;
pub mod config;
pub mod quote;
pub mod rewards;
pub mod stats;
pub mod timer;
