//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `RETENTION_DAYS` (optional): days an issued key stays valid, defaults to 7
/// - `KEY_LENGTH` (optional): characters per generated key, defaults to 8
/// - `KEY_ALPHABET` (optional): symbols keys are drawn from, defaults to A-Z0-9
/// - `BATCH_CAP` (optional): max deletions per atomic store batch, defaults to 500
/// - `SWEEP_INTERVAL_SECS` (optional): seconds between scheduled expiry sweeps, defaults to 3600
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_key_length")]
    pub key_length: usize,

    #[serde(default = "default_key_alphabet")]
    pub key_alphabet: String,

    #[serde(default = "default_batch_cap")]
    pub batch_cap: usize,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_retention_days() -> i64 {
    7
}

fn default_key_length() -> usize {
    8
}

fn default_key_alphabet() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
}

/// Firestore-style backends cap mutations per atomic batch; 500 matches the
/// common limit.
fn default_batch_cap() -> usize {
    500
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
