//! Runtime configuration from the environment.
//!
//! The upstream bank token is per-user and lives sealed in the user store —
//! only the bot token, the master key and tuning knobs come from env.

use std::path::PathBuf;

use kopiyka_core::KopiykaError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub telegram_bot_token: String,
    pub master_key: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub cache_dir: PathBuf,
    pub log_level: String,
}

fn required(name: &'static str) -> Result<String, KopiykaError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(KopiykaError::MissingEnv(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self, KopiykaError> {
        Ok(Self {
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            master_key: required("MASTER_KEY")?,
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_model: optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            cache_dir: optional("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".cache")),
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

/// Mask a secret for status output: first 4 chars, the rest starred.
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        None | Some("") => "None".to_string(),
        Some(v) if v.len() <= 4 => "*".repeat(v.len()),
        Some(v) => {
            let head: String = v.chars().take(4).collect();
            format!("{head}{}", "*".repeat(v.chars().count() - 4))
        }
    }
}
