/// Database connection and table management
pub mod database;

/// Application settings loaded from config.toml
pub mod app;

pub use app::{AppConfig, DealerProfile, Defaults, load_config, load_default_config};
