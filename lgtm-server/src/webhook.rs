use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

use crate::collaborators::PullRequestRef;
use crate::github::PullRequestResponse;
use crate::http_log::{with_correlation_id, CorrelationId};
use crate::router::{NoteEvent, NoteableType, PullRequestAction, PullRequestEvent};
use crate::AppState;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Deserialize)]
pub struct GitHubWebhookPayload {
    pub action: Option<String>,
    pub pull_request: Option<PullRequest>,
    pub repository: Option<Repository>,
    pub comment: Option<Comment>,
    pub issue: Option<Issue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub html_url: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Issue {
    pub number: u64,
    pub pull_request: Option<PullRequestLink>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestLink {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub head: PullRequestRefPayload,
    pub base: PullRequestRefPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequestRefPayload {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: User,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub login: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

impl WebhookResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

type HmacSha256 = Hmac<Sha256>;

pub fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(signature_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time comparison.
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_github_signature(&state.webhook_secret, &bytes, signature) {
        error!("Invalid webhook signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let mut new_request = Request::from_parts(parts, axum::body::Body::from(bytes));
    new_request.extensions_mut().insert(CorrelationId::generate());

    Ok(next.run(new_request).await)
}

pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WebhookResponse>, StatusCode> {
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(CorrelationId::generate);

    let event_kind = request
        .headers()
        .get(EVENT_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    info!(
        "Received {} webhook (correlation id {})",
        event_kind, correlation_id.0
    );

    if event_kind == "ping" {
        return Ok(WebhookResponse::new("pong"));
    }

    let payload: GitHubWebhookPayload =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    match event_kind.as_str() {
        "pull_request" => {
            let Some(event) = pull_request_event(&payload) else {
                return Ok(WebhookResponse::new("Ignored: incomplete pull_request payload"));
            };
            if let PullRequestAction::Other(action) = &event.action {
                debug!("Ignoring pull_request action {:?}", action);
                return Ok(WebhookResponse::new("Ignored: action not handled"));
            }

            spawn_processing(correlation_id, "pull_request", async move {
                state.router.handle_pull_request(&event).await?;
                Ok::<(), anyhow::Error>(())
            });
            Ok(WebhookResponse::new("Pull request event accepted"))
        }
        "issue_comment" => {
            if payload.action.as_deref() != Some("created") {
                return Ok(WebhookResponse::new("Ignored: comment not created"));
            }
            let Some(target) = comment_target(&payload) else {
                return Ok(WebhookResponse::new("Ignored: incomplete issue_comment payload"));
            };
            if lgtm_core::parse_comment(&target.comment.body, state.command_options).is_none() {
                debug!("No command in comment {}", target.comment.id);
                return Ok(WebhookResponse::new("Ignored: no command"));
            }

            spawn_processing(correlation_id, "issue_comment", async move {
                process_comment(state, target).await
            });
            Ok(WebhookResponse::new("Comment event accepted"))
        }
        other => {
            debug!("Ignoring {:?} webhook", other);
            Ok(WebhookResponse::new("Ignored: event not handled"))
        }
    }
}

/// Run `fut` on its own task, inside a span and with the delivery's
/// correlation id attached to every GitHub request it makes.
fn spawn_processing<F>(correlation_id: CorrelationId, kind: &'static str, fut: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let span = info_span!("webhook", correlation_id = %correlation_id.0, event = kind);
    tokio::spawn(
        with_correlation_id(correlation_id, async move {
            if let Err(e) = fut.await {
                error!("Failed to process {} event: {:#}", kind, e);
            }
        })
        .instrument(span),
    );
}

/// The comment of an `issue_comment` delivery and where it was made.
#[derive(Debug, Clone)]
pub struct CommentTarget {
    pub pr: PullRequestRef,
    pub comment: Comment,
    pub on_pull_request: bool,
}

pub fn comment_target(payload: &GitHubWebhookPayload) -> Option<CommentTarget> {
    let repo = payload.repository.as_ref()?;
    let issue = payload.issue.as_ref()?;
    let comment = payload.comment.clone()?;
    Some(CommentTarget {
        pr: PullRequestRef::new(&repo.owner.login, &repo.name, issue.number),
        comment,
        on_pull_request: issue.pull_request.is_some(),
    })
}

pub fn pull_request_event(payload: &GitHubWebhookPayload) -> Option<PullRequestEvent> {
    let repo = payload.repository.as_ref()?;
    let pr = payload.pull_request.as_ref()?;
    let action = payload.action.as_deref()?;
    Some(PullRequestEvent {
        pr: PullRequestRef::new(&repo.owner.login, &repo.name, pr.number),
        action: PullRequestAction::from_github(action),
        head_sha: pr.head.sha.clone(),
        base_ref: pr.base.ref_name.clone(),
    })
}

/// Combine a comment with the state of the PR it was made on.
pub fn note_event(target: &CommentTarget, pr: Option<&PullRequestResponse>) -> NoteEvent {
    let (noteable_type, pr_author, pr_open, head_sha, base_ref) = match pr {
        Some(pr) => (
            NoteableType::PullRequest,
            pr.user.login.clone(),
            pr.is_open(),
            pr.head.sha.clone(),
            pr.base.ref_name.clone(),
        ),
        None => (
            NoteableType::Issue,
            String::new(),
            false,
            String::new(),
            String::new(),
        ),
    };

    NoteEvent {
        pr: target.pr.clone(),
        comment_body: target.comment.body.clone(),
        comment_url: target.comment.html_url.clone(),
        commenter: target.comment.user.login.clone(),
        noteable_type,
        pr_author,
        pr_open,
        head_sha,
        base_ref,
    }
}

async fn process_comment(state: Arc<AppState>, target: CommentTarget) -> anyhow::Result<()> {
    let event = if target.on_pull_request {
        let pr = state.github_client.get_pull_request(&target.pr).await?;
        note_event(&target, Some(&pr))
    } else {
        note_event(&target, None)
    };

    state.router.handle_note(&event).await?;
    Ok(())
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(github_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_webhook_signature,
        ))
}
