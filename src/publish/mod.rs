//! Snapshot publication
//!
//! A run publishes its snapshot exactly once, through one of two strategies chosen from
//! configuration at startup:
//!
//! - [`FileStrategy`]: a new timestamped JSON file per run
//! - [`RepositoryStrategy`]: one fixed file inside a git working copy, committed and
//!   pushed when its content changed
//!
//! Every failure here is fatal to the run; nothing is retried.

mod file;
pub mod git;
mod repo;

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

pub use file::FileStrategy;
pub use git::GitCli;
pub use repo::RepositoryStrategy;

use crate::error::{BackupError, Result};
use crate::model::Snapshot;

/// Run timestamp layout used in file names and commit messages
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub(crate) fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone)]
pub enum PublishStrategy {
    File(FileStrategy),
    Repository(RepositoryStrategy),
}

/// What a publish step left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new backup file was created
    Written(PathBuf),
    /// The backup file changed and the change was committed and pushed
    Committed { path: PathBuf, message: String },
    /// The backup file matched the last commit; nothing was committed
    Unchanged(PathBuf),
}

impl PublishStrategy {
    /// Checks that can fail before any playlist is fetched
    pub async fn preflight(&self) -> Result<()> {
        match self {
            Self::File(file) => ensure_dir(&file.dir).await,
            Self::Repository(repo) => {
                GitCli::from_path()?;
                match repo.dir.parent().filter(|p| !p.as_os_str().is_empty()) {
                    Some(parent) => ensure_dir(parent).await,
                    None => Ok(()),
                }
            }
        }
    }

    pub async fn publish(
        &self,
        snapshot: &Snapshot,
        at: DateTime<Local>,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome> {
        // An interrupted run never replaces or adds a backup
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        let bytes = snapshot.to_json()?;
        tracing::debug!(bytes = bytes.len(), "Snapshot serialized");

        match self {
            Self::File(file) => file.publish(&bytes, at).await,
            Self::Repository(repo) => {
                let git = GitCli::from_path()?;
                repo.publish(&git, &bytes, at, cancel).await
            }
        }
    }
}

async fn ensure_dir(dir: &std::path::Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let metadata = tokio::fs::metadata(dir).await?;
    if metadata.permissions().readonly() {
        return Err(BackupError::Config(format!(
            "output directory {} is not writable",
            dir.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Playlist, Track};
    use chrono::TimeZone;

    fn snapshot() -> Snapshot {
        Snapshot {
            playlists: vec![Playlist {
                id: "AAA".to_string(),
                name: "Mix".to_string(),
                tracks: vec![Track {
                    id: "t1".to_string(),
                    name: "Song".to_string(),
                    artists: vec!["Band".to_string()],
                    added_at: "2024-01-01T00:00:00Z".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_timestamp_format() {
        let at = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(&at), "2024-05-06_07-08-09");
    }

    #[tokio::test]
    async fn test_file_strategy_writes_top_level_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let strategy = PublishStrategy::File(FileStrategy {
            prefix: "backup_".to_string(),
            dir: dir.path().to_path_buf(),
        });
        let at = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        strategy.preflight().await.unwrap();
        let outcome = strategy
            .publish(&snapshot(), at, &CancellationToken::new())
            .await
            .unwrap();

        let expected = dir.path().join("backup_2024-05-06_07-08-09.json");
        assert_eq!(outcome, PublishOutcome::Written(expected.clone()));
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(expected).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["tracks"][0]["artists"][0], "Band");
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_no_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let strategy = PublishStrategy::File(FileStrategy {
            prefix: "backup_".to_string(),
            dir: dir.path().to_path_buf(),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = strategy
            .publish(&snapshot(), Local::now(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Cancelled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_touches_no_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let work = dir.path().join("archive");
        let strategy = PublishStrategy::Repository(RepositoryStrategy {
            origin: "https://github.com/someone/archive.git".to_string(),
            dir: work.clone(),
            file_name: "spbu_backup.json".to_string(),
            branch: None,
            user_name: None,
            user_email: None,
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = strategy
            .publish(&snapshot(), Local::now(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Cancelled));
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn test_preflight_creates_missing_output_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("nested").join("backups");
        let strategy = PublishStrategy::File(FileStrategy {
            prefix: "x_".to_string(),
            dir: target.clone(),
        });

        strategy.preflight().await.unwrap();
        assert!(target.is_dir());
    }
}
