//! Event dispatch.
//!
//! Turns platform-neutral PR and comment events into loader, resolver,
//! engine and publisher calls. Each event is handled sequentially from start
//! to finish; two deliveries for the same PR may race and the later publish
//! wins.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use lgtm_core::consensus::{pull_request_opened, tree_changed};
use lgtm_core::{
    parse_comment, transition, CommandOptions, ConsensusRecord, Login, TransitionContext,
};

use crate::collaborators::{
    has_label, CodeHost, CommentStore, CommitTreeProvider, LabelStore, PullRequestRef,
};
use crate::loader::{LoadedRecord, StateLoader};
use crate::publisher::{ReplyTarget, StatePublisher};
use crate::resolver::OwnershipResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Synchronized,
    Other(String),
}

impl PullRequestAction {
    pub fn from_github(action: &str) -> Self {
        match action {
            "opened" => PullRequestAction::Opened,
            "synchronize" => PullRequestAction::Synchronized,
            other => PullRequestAction::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PullRequestEvent {
    pub pr: PullRequestRef,
    pub action: PullRequestAction,
    pub head_sha: String,
    pub base_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteableType {
    PullRequest,
    Issue,
}

#[derive(Debug, Clone)]
pub struct NoteEvent {
    pub pr: PullRequestRef,
    pub comment_body: String,
    pub comment_url: String,
    pub commenter: String,
    pub noteable_type: NoteableType,
    pub pr_author: String,
    pub pr_open: bool,
    pub head_sha: String,
    pub base_ref: String,
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub label: String,
    pub command_options: CommandOptions,
}

pub struct EventRouter {
    loader: StateLoader,
    resolver: OwnershipResolver,
    publisher: StatePublisher,
    comments: Arc<dyn CommentStore>,
    labels: Arc<dyn LabelStore>,
    trees: Arc<dyn CommitTreeProvider>,
    command_options: CommandOptions,
}

impl EventRouter {
    /// Wire every component to one platform client.
    pub fn new<H: CodeHost + 'static>(host: Arc<H>, settings: RouterSettings) -> Self {
        Self {
            loader: StateLoader::new(host.clone(), host.clone()),
            resolver: OwnershipResolver::new(host.clone(), host.clone()),
            publisher: StatePublisher::new(host.clone(), host.clone(), settings.label),
            comments: host.clone(),
            labels: host.clone(),
            trees: host,
            command_options: settings.command_options,
        }
    }

    /// Handle a pull request event. Returns the published record, or `None`
    /// when nothing was published.
    pub async fn handle_pull_request(
        &self,
        event: &PullRequestEvent,
    ) -> Result<Option<ConsensusRecord>> {
        let pr = &event.pr;

        match &event.action {
            PullRequestAction::Opened => {
                let tree_hash = self.trees.tree_hash(pr, &event.head_sha).await?;
                // A redelivered event finds its own tracking comment.
                let record = match self.loader.load(pr, &tree_hash).await? {
                    LoadedRecord::Reusable(_) => {
                        info!("{} already tracked at tree {}", pr, tree_hash.short());
                        return Ok(None);
                    }
                    LoadedRecord::Rebuilt(record) => record,
                };
                info!("{} opened at tree {}", pr, tree_hash.short());

                let published = self
                    .publisher
                    .execute(pr, pull_request_opened(record), None)
                    .await?;
                Ok(Some(published))
            }
            PullRequestAction::Synchronized => {
                let tree_hash = self.trees.tree_hash(pr, &event.head_sha).await?;
                let record = match self.loader.load(pr, &tree_hash).await? {
                    LoadedRecord::Reusable(_) => {
                        info!("{} synchronized without a tree change", pr);
                        return Ok(None);
                    }
                    LoadedRecord::Rebuilt(record) => record,
                };

                // Unknown label state is treated as present so removal is attempted.
                let label_present = match self.labels.list_labels(pr).await {
                    Ok(labels) => has_label(&labels, self.publisher.label()),
                    Err(e) => {
                        warn!("Failed to list labels on {}: {:#}", pr, e);
                        true
                    }
                };

                let published = self
                    .publisher
                    .execute(pr, tree_changed(record, label_present), None)
                    .await?;
                Ok(Some(published))
            }
            PullRequestAction::Other(action) => {
                debug!("Ignoring pull_request action {:?} on {}", action, pr);
                Ok(None)
            }
        }
    }

    /// Handle a new comment. Returns the record after the command, or `None`
    /// when the comment was not a command for this bot.
    pub async fn handle_note(&self, event: &NoteEvent) -> Result<Option<ConsensusRecord>> {
        let pr = &event.pr;

        if event.noteable_type != NoteableType::PullRequest {
            debug!("Ignoring comment on non-PR {}", pr);
            return Ok(None);
        }
        if !event.pr_open {
            debug!("Ignoring comment on closed {}", pr);
            return Ok(None);
        }
        let Some(command) = parse_comment(&event.comment_body, self.command_options) else {
            debug!("No command in comment on {}", pr);
            return Ok(None);
        };

        let commenter = Login::new(&event.commenter);
        if commenter == self.comments.bot_login().await? {
            debug!("Ignoring own comment on {}", pr);
            return Ok(None);
        }

        info!("{} issued {} on {}", commenter, command, pr);

        let tree_hash = self.trees.tree_hash(pr, &event.head_sha).await?;
        let loaded = self.loader.load(pr, &tree_hash).await?;
        let rebuilt = !loaded.is_reusable();
        let record = loaded.into_record();
        let ownership = self.resolver.resolve(pr, &event.base_ref).await?;
        let labels = self
            .labels
            .list_labels(pr)
            .await
            .with_context(|| format!("Failed to list labels on {}", pr))?;
        let label_present = has_label(&labels, self.publisher.label());

        let pr_author = Login::new(&event.pr_author);
        let result = transition(
            record,
            command,
            TransitionContext {
                actor: &commenter,
                pr_author: &pr_author,
                ownership: &ownership,
                label_present,
                tree_changed: rebuilt,
            },
        );

        let reply_to = ReplyTarget {
            login: event.commenter.clone(),
            body: event.comment_body.clone(),
            url: event.comment_url.clone(),
        };
        let record = self.publisher.execute(pr, result, Some(&reply_to)).await?;
        Ok(Some(record))
    }
}
