//! The consensus record for a single pull request.
//!
//! A record is only meaningful for the tree hash it was built against. It is
//! never stored anywhere except the tracking comment on the PR itself, so
//! every type here is cheap to rebuild from that comment.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A GitHub login, normalized for comparison.
///
/// GitHub logins are case-insensitive and people routinely write them with a
/// leading `@`, so both are stripped on construction. Two `Login`s are equal
/// iff they name the same account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Login(String);

impl Login {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_start_matches('@').to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Login {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Login {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// Newtype for the git tree hash of the PR head, used as a fencing token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeHash(pub String);

impl TreeHash {
    /// Returns a truncated hash for display (first 7 characters).
    pub fn short(&self) -> &str {
        &self.0[..7.min(self.0.len())]
    }
}

impl fmt::Display for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TreeHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TreeHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a GitHub issue comment ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentId(pub u64);

impl From<u64> for CommentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The headline verdict rendered at the top of the tracking comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    Lgtm,
    #[default]
    NotLgtm,
}

impl Verdict {
    pub fn from_ready(ready: bool) -> Self {
        if ready {
            Verdict::Lgtm
        } else {
            Verdict::NotLgtm
        }
    }

    pub fn is_lgtm(self) -> bool {
        self == Verdict::Lgtm
    }
}

/// Placeholder used in place of `.` for files at the repository root.
pub const ROOT_DIRECTORY: &str = "root directory";

/// Everything the bot knows about review consensus for one PR at one tree hash.
///
/// `consentors` and `opponents` map a login to whether that login is a valid
/// reviewer of at least one changed file. A login is never a key of both maps;
/// the mutators below maintain that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusRecord {
    pub consentors: BTreeMap<Login, bool>,
    pub opponents: BTreeMap<Login, bool>,
    pub pending_directories: BTreeSet<String>,
    pub tree_hash: TreeHash,
    /// `None` until the record has been published at least once.
    pub comment_id: Option<CommentId>,
    pub verdict: Verdict,
}

impl ConsensusRecord {
    /// A record for a tree nobody has reviewed yet: every changed directory
    /// is pending.
    pub fn fresh<S: AsRef<str>>(tree_hash: TreeHash, changed_files: &[S]) -> Self {
        Self {
            consentors: BTreeMap::new(),
            opponents: BTreeMap::new(),
            pending_directories: directories_of(changed_files.iter().map(|f| f.as_ref())),
            tree_hash,
            comment_id: None,
            verdict: Verdict::NotLgtm,
        }
    }

    pub fn is_consentor(&self, login: &Login) -> bool {
        self.consentors.contains_key(login)
    }

    pub fn add_consentor(&mut self, login: Login, is_reviewer: bool) {
        self.opponents.remove(&login);
        self.consentors.insert(login, is_reviewer);
    }

    pub fn add_opponent(&mut self, login: Login, is_reviewer: bool) {
        self.consentors.remove(&login);
        self.opponents.insert(login, is_reviewer);
    }

    pub fn reset_sides(&mut self) {
        self.consentors.clear();
        self.opponents.clear();
    }

    /// Logins whose consent counts towards clearing pending directories.
    pub fn consenting_reviewers(&self) -> BTreeSet<Login> {
        self.consentors
            .iter()
            .filter(|(_, &is_reviewer)| is_reviewer)
            .map(|(login, _)| login.clone())
            .collect()
    }

    /// True when no valid reviewer objects and nothing is left to review.
    pub fn is_ready(&self) -> bool {
        !self.opponents.values().any(|&is_reviewer| is_reviewer)
            && self.pending_directories.is_empty()
    }
}

/// Directory containing `path`, with the repository root replaced by
/// [`ROOT_DIRECTORY`].
pub fn directory_of(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ROOT_DIRECTORY.to_string(),
    }
}

pub fn directories_of<'a>(paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    paths.into_iter().map(directory_of).collect()
}
