//! Publishes the snapshot as a commit in a git repository

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::git::VersionControl;
use super::{format_timestamp, PublishOutcome};
use crate::error::{BackupError, Result};

#[derive(Debug, Clone)]
pub struct RepositoryStrategy {
    pub origin: String,
    /// Local working copy
    pub dir: PathBuf,
    /// Overwritten on every run; history lives in the commit log
    pub file_name: String,
    /// `None` pushes whatever branch the working copy has checked out
    pub branch: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl RepositoryStrategy {
    /// Local directory name for a remote: its last path segment without extension.
    ///
    /// `https://github.com/someone/archive.git` and `git@github.com:someone/archive.git`
    /// both give `archive`.
    pub fn dir_name_from_origin(origin: &str) -> Result<String> {
        let origin = origin.trim();
        let path = match Url::parse(origin) {
            Ok(url) => url.path().to_string(),
            // scp-like `user@host:path`, or a plain local path
            Err(_) => origin
                .split_once(':')
                .map_or(origin, |(_, path)| path)
                .to_string(),
        };

        let last = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let name = Path::new(last)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        if name.is_empty() || name == "." || name == ".." {
            return Err(BackupError::Config(format!(
                "cannot derive a repository directory from repo_origin {origin:?}"
            )));
        }
        Ok(name.to_string())
    }

    pub fn commit_message(at: &DateTime<Local>) -> String {
        format!("backup {}", format_timestamp(at))
    }

    /// Write the snapshot into the working copy and commit/push it if it changed.
    ///
    /// Cancellation aborts the whole sequence; an in-flight git child is killed.
    pub async fn publish<V: VersionControl>(
        &self,
        vcs: &V,
        bytes: &[u8],
        at: DateTime<Local>,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackupError::Cancelled),
            outcome = self.commit_snapshot(vcs, bytes, &at) => outcome,
        }
    }

    async fn commit_snapshot<V: VersionControl>(
        &self,
        vcs: &V,
        bytes: &[u8],
        at: &DateTime<Local>,
    ) -> Result<PublishOutcome> {
        tracing::info!(path = %self.dir.display(), "Checking working copy");
        vcs.ensure_working_copy(&self.dir, &self.origin).await?;

        if self.user_name.is_some() || self.user_email.is_some() {
            if let Err(e) = vcs
                .configure_user(
                    &self.dir,
                    self.user_name.as_deref(),
                    self.user_email.as_deref(),
                )
                .await
            {
                tracing::warn!(error = %e, "Failed to configure git user");
            }
        }

        let path = self.dir.join(&self.file_name);
        tracing::info!(path = %path.display(), "Writing backup file");
        tokio::fs::write(&path, bytes).await?;

        vcs.stage_all(&self.dir).await?;
        if !vcs.has_staged_changes(&self.dir).await? {
            tracing::info!("Backup unchanged since last commit, nothing to commit");
            return Ok(PublishOutcome::Unchanged(path));
        }

        let message = Self::commit_message(at);
        tracing::info!(message = %message, "Committing and pushing changes");
        vcs.commit(&self.dir, &message).await?;
        vcs.push(&self.dir, self.branch.as_deref()).await?;

        Ok(PublishOutcome::Committed { path, message })
    }
}
