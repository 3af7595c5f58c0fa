//! Effect interpreter.
//!
//! Executes the effects of a consensus transition against GitHub, in order.
//! Publishing the tracking comment must succeed; label changes are best
//! effort and only logged when they fail.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use lgtm_core::codec;
use lgtm_core::{format_reply, ConsensusRecord, Effect, LogLevel, TransitionResult};

use crate::collaborators::{CommentStore, LabelStore, PullRequestRef};

/// The comment a reply answers.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    pub login: String,
    pub body: String,
    pub url: String,
}

pub struct StatePublisher {
    comments: Arc<dyn CommentStore>,
    labels: Arc<dyn LabelStore>,
    label: String,
}

impl StatePublisher {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        labels: Arc<dyn LabelStore>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            comments,
            labels,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Execute every effect and return the record as published.
    ///
    /// The first failing effect aborts the rest, unless the effect is best
    /// effort, in which case the failure is logged and execution continues.
    pub async fn execute(
        &self,
        pr: &PullRequestRef,
        result: TransitionResult,
        reply_to: Option<&ReplyTarget>,
    ) -> Result<ConsensusRecord> {
        let TransitionResult {
            mut record,
            effects,
        } = result;

        for effect in effects {
            let best_effort = effect.is_best_effort();
            if let Err(e) = self.apply(pr, &mut record, effect, reply_to).await {
                if !best_effort {
                    return Err(e);
                }
                warn!("{:#}", e);
            }
        }

        Ok(record)
    }

    async fn apply(
        &self,
        pr: &PullRequestRef,
        record: &mut ConsensusRecord,
        effect: Effect,
        reply_to: Option<&ReplyTarget>,
    ) -> Result<()> {
        match effect {
            Effect::Reply { message } => {
                let body = match reply_to {
                    Some(target) => format_reply(&target.login, &message, &target.body, &target.url),
                    None => message,
                };
                self.comments
                    .create_comment(pr, &body)
                    .await
                    .with_context(|| format!("Failed to reply on {}", pr))?;
            }
            Effect::PublishRecord => self.publish(pr, record).await?,
            Effect::AddLabel => self
                .labels
                .add_label(pr, &self.label)
                .await
                .with_context(|| format!("Failed to add label {:?} to {}", self.label, pr))?,
            Effect::RemoveLabel => self
                .labels
                .remove_label(pr, &self.label)
                .await
                .with_context(|| format!("Failed to remove label {:?} from {}", self.label, pr))?,
            Effect::Log { level, message } => match level {
                LogLevel::Debug => debug!("{}", message),
                LogLevel::Info => info!("{}", message),
            },
        }
        Ok(())
    }

    /// Write the record to its tracking comment, creating the comment and
    /// adopting its ID if the record has none.
    pub async fn publish(&self, pr: &PullRequestRef, record: &mut ConsensusRecord) -> Result<()> {
        let body = codec::serialize(record);

        match record.comment_id {
            Some(id) => {
                self.comments
                    .update_comment(pr, id, &body)
                    .await
                    .with_context(|| {
                        format!("Failed to update tracking comment {} on {}", id, pr)
                    })?;
                info!("Updated tracking comment {} on {}", id, pr);
            }
            None => {
                let id = self
                    .comments
                    .create_comment(pr, &body)
                    .await
                    .with_context(|| format!("Failed to create tracking comment on {}", pr))?;
                info!("Created tracking comment {} on {}", id, pr);
                record.comment_id = Some(id);
            }
        }

        Ok(())
    }
}
