use anyhow::Result;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use lgtm_core::CommandOptions;
use lgtm_server::config::Config;
use lgtm_server::webhook::webhook_router;
use lgtm_server::{AppState, EventRouter, GitHubClient, RouterSettings};

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "lgtm",
        "version": lgtm_server::get_bot_version()
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting LGTM bot {}", lgtm_server::get_bot_version());

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let github_client = Arc::new(GitHubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
        config.bot_login.clone(),
    ));

    let command_options = CommandOptions {
        approve_acts_as_lgtm: config.approve_acts_as_lgtm,
    };

    info!(
        "Using label {:?} against {}",
        config.lgtm_label, config.github_api_url
    );

    let router = EventRouter::new(
        github_client.clone(),
        RouterSettings {
            label: config.lgtm_label.clone(),
            command_options,
        },
    );

    let app_state = Arc::new(AppState {
        github_client,
        router,
        webhook_secret: config.github_webhook_secret.clone(),
        command_options,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(webhook_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
