//! Per-run state threaded through the fetch and publish steps

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use crate::config::BackupConfig;
use crate::model::SpotifyClient;

/// Everything one backup run needs: the authorized client, the resolved configuration,
/// the cancellation signal and the instant the run started (used to name its output).
pub struct RunContext<C = SpotifyClient> {
    pub client: C,
    pub config: Arc<BackupConfig>,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Local>,
}

impl<C> RunContext<C> {
    pub fn new(client: C, config: Arc<BackupConfig>, cancel: CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
            started_at: Local::now(),
        }
    }
}
