use anyhow::{anyhow, Context, Result};
use std::env;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_LGTM_LABEL: &str = "lgtm";

#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub github_webhook_secret: String,
    pub github_api_url: String,
    /// Login the bot posts as. Looked up via `GET /user` when unset.
    pub bot_login: Option<String>,
    pub lgtm_label: String,
    /// Treat `/approve` as `/lgtm`.
    pub approve_acts_as_lgtm: bool,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;

        let github_webhook_secret = env::var("GITHUB_WEBHOOK_SECRET")
            .context("GITHUB_WEBHOOK_SECRET environment variable is required")?;

        let github_api_url = parse_optional(env::var("GITHUB_API_URL").ok())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let bot_login = parse_optional(env::var("BOT_LOGIN").ok());

        let lgtm_label = parse_optional(env::var("LGTM_LABEL").ok())
            .unwrap_or_else(|| DEFAULT_LGTM_LABEL.to_string());

        let approve_acts_as_lgtm = parse_flag(env::var("LGTM_APPROVE_ACTS_AS_LGTM").ok())
            .context("LGTM_APPROVE_ACTS_AS_LGTM must be true or false")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            github_token,
            github_webhook_secret,
            github_api_url,
            bot_login,
            lgtm_label,
            approve_acts_as_lgtm,
            port,
        })
    }
}

/// Treat a missing, empty or whitespace-only value as unset.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a boolean switch; unset means `false`.
pub fn parse_flag(value: Option<String>) -> Result<bool> {
    match parse_optional(value) {
        None => Ok(false),
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(anyhow!("invalid boolean value: {}", other)),
        },
    }
}
