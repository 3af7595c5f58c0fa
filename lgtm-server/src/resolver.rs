use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use lgtm_core::owners::{ancestor_directories, owners_path};
use lgtm_core::{OwnersFile, OwnershipMapping, RepoOwners};

use crate::collaborators::{ChangedFileProvider, OwnershipProvider, PullRequestRef};

/// Builds the per-file ownership mapping of a PR from the OWNERS files on its
/// base branch. Nothing is cached between calls.
pub struct OwnershipResolver {
    owners: Arc<dyn OwnershipProvider>,
    files: Arc<dyn ChangedFileProvider>,
}

impl OwnershipResolver {
    pub fn new(owners: Arc<dyn OwnershipProvider>, files: Arc<dyn ChangedFileProvider>) -> Self {
        Self { owners, files }
    }

    pub async fn resolve(&self, pr: &PullRequestRef, base_ref: &str) -> Result<OwnershipMapping> {
        let changed_files = self
            .files
            .changed_files(pr)
            .await
            .with_context(|| format!("Failed to list changed files of {}", pr))?;

        let directories: BTreeSet<String> = changed_files
            .iter()
            .flat_map(|path| ancestor_directories(path))
            .collect();

        let mut repo_owners = RepoOwners::new();
        for dir in directories {
            let path = owners_path(&dir);
            let Some(text) = self
                .owners
                .owners_file(pr, base_ref, &path)
                .await
                .with_context(|| format!("Failed to fetch {} on {}", path, base_ref))?
            else {
                continue;
            };

            let file = OwnersFile::parse(&text)
                .with_context(|| format!("Invalid OWNERS file {} on {}", path, base_ref))?;
            debug!(
                "{}: {} approvers, {} reviewers",
                path,
                file.approvers.len(),
                file.reviewers.len()
            );
            repo_owners.insert(dir, file);
        }

        let mapping = repo_owners.mapping_for(&changed_files);
        info!(
            "Resolved owners for {} changed files of {} against {}",
            mapping.len(),
            pr,
            base_ref
        );
        Ok(mapping)
    }
}
