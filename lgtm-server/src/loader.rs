//! Recovers the consensus record from the PR's tracking comment.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use lgtm_core::codec;
use lgtm_core::{ConsensusRecord, TreeHash};

use crate::collaborators::{ChangedFileProvider, CommentStore, PullRequestRef};

/// A record together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedRecord {
    /// The tracking comment was written for the current tree.
    Reusable(ConsensusRecord),
    /// No usable tracking comment; every vote starts over.
    Rebuilt(ConsensusRecord),
}

impl LoadedRecord {
    pub fn is_reusable(&self) -> bool {
        matches!(self, LoadedRecord::Reusable(_))
    }

    pub fn into_record(self) -> ConsensusRecord {
        match self {
            LoadedRecord::Reusable(record) | LoadedRecord::Rebuilt(record) => record,
        }
    }
}

pub struct StateLoader {
    comments: Arc<dyn CommentStore>,
    files: Arc<dyn ChangedFileProvider>,
}

impl StateLoader {
    pub fn new(comments: Arc<dyn CommentStore>, files: Arc<dyn ChangedFileProvider>) -> Self {
        Self { comments, files }
    }

    /// Load the record for `tree_hash`, rebuilding it if the newest tracking
    /// comment is missing or was written for another tree.
    ///
    /// A rebuilt record keeps the stale comment's ID so publishing edits that
    /// comment instead of adding a second one.
    pub async fn load(&self, pr: &PullRequestRef, tree_hash: &TreeHash) -> Result<LoadedRecord> {
        let bot = self.comments.bot_login().await?;
        let comments = self
            .comments
            .list_comments(pr)
            .await
            .with_context(|| format!("Failed to list comments on {}", pr))?;

        let latest = comments
            .iter()
            .rev()
            .filter(|comment| comment.author == bot)
            .find_map(|comment| codec::parse(&comment.body).map(|record| (comment.id, record)));

        let stale_comment = match latest {
            Some((id, mut record)) if codec::is_current(&record, tree_hash) => {
                info!("Reusing tracking comment {} on {}", id, pr);
                record.comment_id = Some(id);
                return Ok(LoadedRecord::Reusable(record));
            }
            Some((id, record)) => {
                info!(
                    "Tracking comment {} on {} is for tree {}, now {}; rebuilding",
                    id,
                    pr,
                    record.tree_hash.short(),
                    tree_hash.short()
                );
                Some(id)
            }
            None => {
                info!("No tracking comment on {}; building a fresh record", pr);
                None
            }
        };

        let mut record = self.fresh(pr, tree_hash).await?;
        record.comment_id = stale_comment;
        Ok(LoadedRecord::Rebuilt(record))
    }

    /// A record with nobody's vote and every changed directory pending.
    async fn fresh(
        &self,
        pr: &PullRequestRef,
        tree_hash: &TreeHash,
    ) -> Result<ConsensusRecord> {
        let changed_files = self
            .files
            .changed_files(pr)
            .await
            .with_context(|| format!("Failed to list changed files of {}", pr))?;
        Ok(ConsensusRecord::fresh(tree_hash.clone(), &changed_files))
    }
}
