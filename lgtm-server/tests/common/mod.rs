//! In-memory stand-in for GitHub.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use lgtm_core::{CommandOptions, CommentId, Login, TreeHash};
use lgtm_server::collaborators::{
    ChangedFileProvider, CommentStore, CommitTreeProvider, LabelStore, OwnershipProvider,
    PullRequestRef, RemoteComment,
};
use lgtm_server::router::{
    NoteEvent, NoteableType, PullRequestAction, PullRequestEvent, RouterSettings,
};
use lgtm_server::EventRouter;

pub const BOT: &str = "lgtm-bot";
pub const LABEL: &str = "lgtm";
pub const AUTHOR: &str = "dave";

/// Operations the fake can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListComments,
    CreateComment,
    UpdateComment,
    ListLabels,
    AddLabel,
    RemoveLabel,
    OwnersFile,
    ChangedFiles,
    TreeHash,
}

#[derive(Default)]
struct Inner {
    comments: Vec<RemoteComment>,
    next_comment_id: u64,
    labels: BTreeSet<String>,
    owners_files: HashMap<String, String>,
    changed_files: Vec<String>,
    trees: HashMap<String, String>,
    failing: HashSet<Op>,
    calls: Vec<Op>,
}

#[derive(Clone, Default)]
pub struct FakeHost {
    inner: Arc<Mutex<Inner>>,
}

impl FakeHost {
    pub fn new() -> Self {
        let host = Self::default();
        host.inner.lock().unwrap().next_comment_id = 1000;
        host
    }

    pub fn pr() -> PullRequestRef {
        PullRequestRef::new("octo", "widgets", 42)
    }

    pub fn set_changed_files(&self, files: &[&str]) {
        self.inner.lock().unwrap().changed_files = files.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_owners_file(&self, path: &str, yaml: &str) {
        self.inner
            .lock()
            .unwrap()
            .owners_files
            .insert(path.to_string(), yaml.to_string());
    }

    pub fn set_tree(&self, commit: &str, tree: &str) {
        self.inner
            .lock()
            .unwrap()
            .trees
            .insert(commit.to_string(), tree.to_string());
    }

    pub fn set_label(&self, label: &str) {
        self.inner.lock().unwrap().labels.insert(label.to_string());
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.inner.lock().unwrap().labels.contains(label)
    }

    pub fn add_human_comment(&self, author: &str, body: &str) -> CommentId {
        self.push_comment(author, body)
    }

    pub fn add_bot_comment(&self, body: &str) -> CommentId {
        self.push_comment(BOT, body)
    }

    fn push_comment(&self, author: &str, body: &str) -> CommentId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_comment_id += 1;
        let id = CommentId(inner.next_comment_id);
        inner.comments.push(RemoteComment {
            id,
            author: Login::new(author),
            body: body.to_string(),
        });
        id
    }

    pub fn comments(&self) -> Vec<RemoteComment> {
        self.inner.lock().unwrap().comments.clone()
    }

    pub fn bot_comments(&self) -> Vec<RemoteComment> {
        let bot = Login::new(BOT);
        self.comments()
            .into_iter()
            .filter(|c| c.author == bot)
            .collect()
    }

    pub fn fail(&self, op: Op) {
        self.inner.lock().unwrap().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<Op> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn enter(&self, op: Op) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(op);
        if inner.failing.contains(&op) {
            return Err(anyhow!("injected failure in {:?}", op));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for FakeHost {
    async fn bot_login(&self) -> Result<Login> {
        Ok(Login::new(BOT))
    }

    async fn list_comments(&self, _pr: &PullRequestRef) -> Result<Vec<RemoteComment>> {
        self.enter(Op::ListComments)?;
        Ok(self.comments())
    }

    async fn create_comment(&self, _pr: &PullRequestRef, body: &str) -> Result<CommentId> {
        self.enter(Op::CreateComment)?;
        Ok(self.push_comment(BOT, body))
    }

    async fn update_comment(&self, _pr: &PullRequestRef, id: CommentId, body: &str) -> Result<()> {
        self.enter(Op::UpdateComment)?;
        let mut inner = self.inner.lock().unwrap();
        let comment = inner
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("no comment {}", id))?;
        comment.body = body.to_string();
        Ok(())
    }
}

#[async_trait]
impl LabelStore for FakeHost {
    async fn list_labels(&self, _pr: &PullRequestRef) -> Result<Vec<String>> {
        self.enter(Op::ListLabels)?;
        Ok(self.inner.lock().unwrap().labels.iter().cloned().collect())
    }

    async fn add_label(&self, _pr: &PullRequestRef, label: &str) -> Result<()> {
        self.enter(Op::AddLabel)?;
        self.inner.lock().unwrap().labels.insert(label.to_string());
        Ok(())
    }

    async fn remove_label(&self, _pr: &PullRequestRef, label: &str) -> Result<()> {
        self.enter(Op::RemoveLabel)?;
        self.inner.lock().unwrap().labels.remove(label);
        Ok(())
    }
}

#[async_trait]
impl OwnershipProvider for FakeHost {
    async fn owners_file(
        &self,
        _pr: &PullRequestRef,
        _git_ref: &str,
        path: &str,
    ) -> Result<Option<String>> {
        self.enter(Op::OwnersFile)?;
        Ok(self.inner.lock().unwrap().owners_files.get(path).cloned())
    }
}

#[async_trait]
impl ChangedFileProvider for FakeHost {
    async fn changed_files(&self, _pr: &PullRequestRef) -> Result<Vec<String>> {
        self.enter(Op::ChangedFiles)?;
        Ok(self.inner.lock().unwrap().changed_files.clone())
    }
}

#[async_trait]
impl CommitTreeProvider for FakeHost {
    async fn tree_hash(&self, _pr: &PullRequestRef, commit_sha: &str) -> Result<TreeHash> {
        self.enter(Op::TreeHash)?;
        self.inner
            .lock()
            .unwrap()
            .trees
            .get(commit_sha)
            .map(|t| TreeHash(t.clone()))
            .ok_or_else(|| anyhow!("unknown commit {}", commit_sha))
    }
}

/// A PR touching `a/x` and `b/y`, with `a` owned by alice and `b` by bob,
/// at commit `c1` whose tree is `t1`.
pub fn scenario_host() -> FakeHost {
    let host = FakeHost::new();
    host.set_changed_files(&["a/x", "b/y"]);
    host.set_owners_file("a/OWNERS", "approvers:\n- alice\n");
    host.set_owners_file("b/OWNERS", "approvers:\n- bob\n");
    host.set_tree("c1", "t1");
    host.set_tree("c2", "t2");
    host
}

pub fn router_for(host: &FakeHost) -> EventRouter {
    EventRouter::new(
        Arc::new(host.clone()),
        RouterSettings {
            label: LABEL.to_string(),
            command_options: CommandOptions::default(),
        },
    )
}

pub fn pr_event(action: PullRequestAction, head_sha: &str) -> PullRequestEvent {
    PullRequestEvent {
        pr: FakeHost::pr(),
        action,
        head_sha: head_sha.to_string(),
        base_ref: "main".to_string(),
    }
}

pub fn note(commenter: &str, body: &str, head_sha: &str) -> NoteEvent {
    NoteEvent {
        pr: FakeHost::pr(),
        comment_body: body.to_string(),
        comment_url: "https://github.com/octo/widgets/pull/42#issuecomment-1".to_string(),
        commenter: commenter.to_string(),
        noteable_type: NoteableType::PullRequest,
        pr_author: AUTHOR.to_string(),
        pr_open: true,
        head_sha: head_sha.to_string(),
        base_ref: "main".to_string(),
    }
}

/// Side map from names; a trailing `!` marks a valid reviewer.
pub fn logins(names: &[&str]) -> BTreeMap<Login, bool> {
    names
        .iter()
        .map(|entry| match entry.strip_suffix('!') {
            Some(name) => (Login::new(name), true),
            None => (Login::new(entry), false),
        })
        .collect()
}

pub fn dirs(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}
