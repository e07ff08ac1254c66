use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// When set, the sqlite-backed store is used; otherwise the seeded
    /// in-memory demo store is served.
    pub database_url: Option<String>,
    /// A missing key never prevents startup; only the AI-backed endpoints
    /// fail until it is provided.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "5000"),
            database_url: var("DATABASE_URL").ok(),
            openai_api_key: var("OPENAI_API_KEY").ok(),
            openai_base_url: try_load("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
