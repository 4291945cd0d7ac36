use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = parse_state_dir(env::var("STATE_DIR").ok());

        Ok(Config { port, state_dir })
    }
}

/// Parse STATE_DIR from an optional string value.
///
/// Missing, empty, or whitespace-only values fall back to the current
/// working directory.
pub fn parse_state_dir(value: Option<String>) -> PathBuf {
    value
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
