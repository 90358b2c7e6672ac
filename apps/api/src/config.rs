use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a local-development default.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Path of the profile document on disk.
    pub data_path: String,
    /// Base URL of the local model runtime (Ollama).
    pub model_runtime_url: String,
    pub model_name: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            data_path: std::env::var("DATA_PATH")
                .unwrap_or_else(|_| "data/profile.json".to_string()),
            model_runtime_url: std::env::var("MODEL_RUNTIME_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model_name: std::env::var("MODEL_NAME").unwrap_or_else(|_| "llama3.2".to_string()),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
