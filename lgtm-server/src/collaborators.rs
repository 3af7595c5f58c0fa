//! Interfaces to the code-hosting platform.
//!
//! The router and its helpers only ever talk to GitHub through these traits.
//! [`crate::github::GitHubClient`] implements all of them; tests use
//! in-memory fakes.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use lgtm_core::{CommentId, Login, TreeHash};

/// Identifies a pull request within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// A comment on a pull request as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteComment {
    pub id: CommentId,
    pub author: Login,
    pub body: String,
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// The login the bot posts as.
    async fn bot_login(&self) -> Result<Login>;

    /// All comments on the PR, oldest first.
    async fn list_comments(&self, pr: &PullRequestRef) -> Result<Vec<RemoteComment>>;

    async fn create_comment(&self, pr: &PullRequestRef, body: &str) -> Result<CommentId>;

    async fn update_comment(&self, pr: &PullRequestRef, id: CommentId, body: &str) -> Result<()>;
}

#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn list_labels(&self, pr: &PullRequestRef) -> Result<Vec<String>>;

    async fn add_label(&self, pr: &PullRequestRef, label: &str) -> Result<()>;

    async fn remove_label(&self, pr: &PullRequestRef, label: &str) -> Result<()>;
}

#[async_trait]
pub trait OwnershipProvider: Send + Sync {
    /// Text of the OWNERS file at `path` on `git_ref`, or `None` if there is
    /// no such file.
    async fn owners_file(
        &self,
        pr: &PullRequestRef,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>>;
}

#[async_trait]
pub trait ChangedFileProvider: Send + Sync {
    /// Every path the PR touches, including deleted files.
    async fn changed_files(&self, pr: &PullRequestRef) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CommitTreeProvider: Send + Sync {
    async fn tree_hash(&self, pr: &PullRequestRef, commit_sha: &str) -> Result<TreeHash>;
}

/// Everything the router needs from the platform, in one bound.
pub trait CodeHost:
    CommentStore + LabelStore + OwnershipProvider + ChangedFileProvider + CommitTreeProvider
{
}

impl<T> CodeHost for T where
    T: CommentStore + LabelStore + OwnershipProvider + ChangedFileProvider + CommitTreeProvider
{
}

/// Label names compare case-insensitively on GitHub.
pub fn has_label(labels: &[String], label: &str) -> bool {
    labels.iter().any(|l| l.eq_ignore_ascii_case(label))
}
