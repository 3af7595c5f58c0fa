//! Per-file reviewer entitlement for one pull request.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::{directories_of, Login};

/// Changed file path → logins entitled to review it (approvers ∪ reviewers).
///
/// Built fresh for every event from the base branch's OWNERS files; never
/// carried between events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipMapping {
    files: BTreeMap<String, BTreeSet<Login>>,
}

impl OwnershipMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, owners: impl IntoIterator<Item = Login>) {
        self.files
            .entry(path.into())
            .or_default()
            .extend(owners);
    }

    pub fn owners_of(&self, path: &str) -> Option<&BTreeSet<Login>> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// A valid reviewer owns at least one changed file.
    pub fn is_valid_reviewer(&self, login: &Login) -> bool {
        self.files.values().any(|owners| owners.contains(login))
    }

    /// Every directory touched by the PR, i.e. what a full reopen makes pending.
    pub fn all_directories(&self) -> BTreeSet<String> {
        directories_of(self.files())
    }

    /// Directories still awaiting review given who has consented.
    ///
    /// A file is covered once any of its owners is among `consenting`. The
    /// result is the set of directories holding at least one uncovered file.
    pub fn pending_directories(&self, consenting: &BTreeSet<Login>) -> BTreeSet<String> {
        directories_of(
            self.files
                .iter()
                .filter(|(_, owners)| owners.is_disjoint(consenting))
                .map(|(path, _)| path.as_str()),
        )
    }
}

impl<P: Into<String>, O: IntoIterator<Item = Login>> FromIterator<(P, O)> for OwnershipMapping {
    fn from_iter<T: IntoIterator<Item = (P, O)>>(iter: T) -> Self {
        let mut mapping = OwnershipMapping::new();
        for (path, owners) in iter {
            mapping.insert(path, owners);
        }
        mapping
    }
}
