//! OWNERS files and per-path owner resolution.
//!
//! Ownership metadata lives in `OWNERS` YAML files on the base branch:
//!
//! ```yaml
//! approvers: [alice]
//! reviewers: [bob]
//! options:
//!   no_parent_owners: true
//! ```
//!
//! A path is owned by every OWNERS file between its directory and the
//! repository root, unless one of them sets `no_parent_owners`, which cuts
//! inheritance above it.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ownership::OwnershipMapping;
use crate::record::Login;

pub const OWNERS_FILE_NAME: &str = "OWNERS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnersOptions {
    #[serde(default)]
    pub no_parent_owners: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnersFile {
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub options: OwnersOptions,
}

impl OwnersFile {
    /// Parse the contents of an OWNERS file. An empty file owns nothing.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse OWNERS file")
    }
}

/// Directories whose OWNERS file may apply to `path`, nearest first.
///
/// The repository root is the empty string.
pub fn ancestor_directories(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut current = path.trim_matches('/');
    while let Some((parent, _)) = current.rsplit_once('/') {
        dirs.push(parent.to_string());
        current = parent;
    }
    dirs.push(String::new());
    dirs
}

/// Repository path of the OWNERS file in `dir`.
pub fn owners_path(dir: &str) -> String {
    if dir.is_empty() {
        OWNERS_FILE_NAME.to_string()
    } else {
        format!("{}/{}", dir, OWNERS_FILE_NAME)
    }
}

/// The OWNERS files of one branch, keyed by directory.
///
/// Only directories that actually hold an OWNERS file are present.
#[derive(Debug, Clone, Default)]
pub struct RepoOwners {
    files: BTreeMap<String, OwnersFile>,
}

impl RepoOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dir: impl Into<String>, file: OwnersFile) {
        self.files.insert(dir.into(), file);
    }

    pub fn approvers(&self, path: &str) -> BTreeSet<Login> {
        self.collect(path, |file| &file.approvers)
    }

    pub fn reviewers(&self, path: &str) -> BTreeSet<Login> {
        self.collect(path, |file| &file.reviewers)
    }

    /// Everyone whose review counts for `path`.
    pub fn entitled(&self, path: &str) -> BTreeSet<Login> {
        let mut logins = self.approvers(path);
        logins.extend(self.reviewers(path));
        logins
    }

    pub fn mapping_for<S: AsRef<str>>(&self, changed_files: &[S]) -> OwnershipMapping {
        changed_files
            .iter()
            .map(|path| (path.as_ref(), self.entitled(path.as_ref())))
            .collect()
    }

    fn collect(&self, path: &str, field: impl Fn(&OwnersFile) -> &Vec<String>) -> BTreeSet<Login> {
        let mut logins = BTreeSet::new();
        for dir in ancestor_directories(path) {
            if let Some(file) = self.files.get(&dir) {
                logins.extend(field(file).iter().map(|name| Login::new(name)));
                if file.options.no_parent_owners {
                    break;
                }
            }
        }
        logins
    }
}
