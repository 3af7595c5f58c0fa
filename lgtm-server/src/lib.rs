pub mod collaborators;
pub mod config;
pub mod github;
pub mod http_log;
pub mod loader;
pub mod publisher;
pub mod resolver;
pub mod router;
pub mod webhook;

use std::sync::Arc;

use lgtm_core::CommandOptions;

pub use collaborators::PullRequestRef;
pub use github::GitHubClient;
pub use router::{EventRouter, RouterSettings};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_bot_version() -> String {
    // Packaged builds pass the hash in; cargo builds read it from .git.
    let git_hash = option_env!("LGTM_GIT_HASH").or(built_info::GIT_COMMIT_HASH);
    match git_hash {
        Some(hash) if hash.len() >= 8 => hash[..8].to_string(),
        Some(hash) => hash.to_string(),
        None => "unknown".to_string(),
    }
}

pub struct AppState {
    pub github_client: Arc<GitHubClient>,
    pub router: EventRouter,
    pub webhook_secret: String,
    pub command_options: CommandOptions,
}
