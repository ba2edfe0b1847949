use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::AppError;

const STAGING_SUBDIR: &str = "pending";
const CATALOG_FILE: &str = "data.json";
const CURSOR_FILE: &str = "last_update.json";
const SESSIONS_FILE: &str = "sessions.json";

/// Storage configuration loaded from environment variables.
/// Shared by every subcommand; none of it is required.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub image_subdir: String,
    pub prompt_subdir: String,
    pub rust_log: String,
}

/// Transport and conversation settings, only needed by the ingestion loop.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub channel_id: i64,
    pub api_url: String,
    pub poll_interval: Duration,
    pub long_poll_secs: u64,
    pub reset_command: String,
}

/// Every file and directory the pipeline touches, resolved under `DATA_DIR`.
#[derive(Debug, Clone)]
pub struct Layout {
    pub staging_dir: PathBuf,
    pub image_dir: PathBuf,
    pub prompt_dir: PathBuf,
    pub image_subdir: String,
    pub prompt_subdir: String,
    pub catalog_file: PathBuf,
    pub cursor_file: PathBuf,
    pub sessions_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            data_dir: PathBuf::from(env_or("DATA_DIR", ".")),
            image_subdir: env_or("IMAGE_DIR", "images"),
            prompt_subdir: env_or("PROMPT_DIR", "prompts"),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::under(&self.data_dir, &self.image_subdir, &self.prompt_subdir)
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        Ok(BotConfig {
            bot_token: require_env("BOT_TOKEN")?,
            channel_id: parse_env("CHANNEL_ID", &require_env("CHANNEL_ID")?)?,
            api_url: env_or("TELEGRAM_API_URL", "https://api.telegram.org"),
            poll_interval: Duration::from_secs(parse_env(
                "POLL_INTERVAL_SECS",
                &env_or("POLL_INTERVAL_SECS", "30"),
            )?),
            long_poll_secs: parse_env("LONG_POLL_SECS", &env_or("LONG_POLL_SECS", "0"))?,
            reset_command: env_or("RESET_COMMAND", "/cancel"),
        })
    }
}

impl Layout {
    pub fn under(root: &Path, image_subdir: &str, prompt_subdir: &str) -> Self {
        Layout {
            staging_dir: root.join(STAGING_SUBDIR),
            image_dir: root.join(image_subdir),
            prompt_dir: root.join(prompt_subdir),
            image_subdir: image_subdir.to_string(),
            prompt_subdir: prompt_subdir.to_string(),
            catalog_file: root.join(CATALOG_FILE),
            cursor_file: root.join(CURSOR_FILE),
            sessions_file: root.join(SESSIONS_FILE),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Configuration(format!(
            "Required environment variable '{key}' is not set"
        ))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse::<T>().map_err(|_| {
        AppError::Configuration(format!("'{key}' has an invalid value: {raw:?}"))
    })
}
