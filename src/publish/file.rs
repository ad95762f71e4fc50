//! One new backup file per run

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use super::{format_timestamp, PublishOutcome};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FileStrategy {
    pub prefix: String,
    pub dir: PathBuf,
}

impl FileStrategy {
    pub fn file_name(&self, at: &DateTime<Local>) -> String {
        format!("{}{}.json", self.prefix, format_timestamp(at))
    }

    /// Write the serialized snapshot to `<dir>/<prefix><timestamp>.json`.
    ///
    /// Timestamps have one-second resolution and runs are assumed to be further apart
    /// than that. The file is created exclusively, so a clash fails the run instead of
    /// replacing an earlier backup.
    pub async fn publish(&self, bytes: &[u8], at: DateTime<Local>) -> Result<PublishOutcome> {
        let path = self.dir.join(self.file_name(&at));
        tracing::info!(path = %path.display(), "Writing backup file");

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;

        Ok(PublishOutcome::Written(path))
    }
}
