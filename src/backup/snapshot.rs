//! Builds the snapshot: resolves, fetches and flattens every configured playlist

use async_trait::async_trait;

use super::{resolve_playlist, PageFetcher, Paginator};
use crate::context::RunContext;
use crate::error::{BackupError, Result};
use crate::model::{Playlist, PlaylistHeader, PlaylistIdentifier, RawItem, Snapshot, Track};

/// Looks up playlist metadata
#[async_trait]
pub trait PlaylistCatalog: Send + Sync {
    async fn playlist_header(&self, id: &PlaylistIdentifier) -> Result<PlaylistHeader>;
}

pub struct SnapshotBuilder<'a, C> {
    ctx: &'a RunContext<C>,
}

impl<'a, C> SnapshotBuilder<'a, C>
where
    C: PlaylistCatalog + PageFetcher<Item = RawItem>,
{
    pub fn new(ctx: &'a RunContext<C>) -> Self {
        Self { ctx }
    }

    /// Fetch every reference in order. A reference that fails at any step is logged
    /// and left out; it never aborts the run or leaves a half-filled playlist behind.
    pub async fn build(&self, references: &[String]) -> Snapshot {
        let mut playlists = Vec::with_capacity(references.len());
        let mut skipped = 0usize;

        for reference in references {
            tracing::info!(reference = %reference, "Fetching playlist");
            match self.fetch_playlist(reference).await {
                Ok(playlist) => {
                    tracing::info!(
                        playlist_id = %playlist.id,
                        count = playlist.tracks.len(),
                        "Playlist fetched"
                    );
                    playlists.push(playlist);
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Skipping playlist");
                    skipped += 1;
                }
            }
        }

        let snapshot = Snapshot { playlists };
        tracing::info!(
            playlists = snapshot.len(),
            tracks = snapshot.track_count(),
            skipped,
            "Snapshot built"
        );
        snapshot
    }

    async fn fetch_playlist(&self, reference: &str) -> Result<Playlist> {
        let id = resolve_playlist(reference)?;
        let client = &self.ctx.client;

        let header = tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => return Err(BackupError::Cancelled),
            header = client.playlist_header(&id) => header?,
        };

        tracing::debug!(
            playlist_id = %header.id,
            total_hint = header.total_tracks,
            "Fetching playlist items"
        );
        let items = Paginator::new(client, &self.ctx.cancel)
            .fetch_all(&header.id)
            .await?;

        Ok(Playlist {
            id: header.id.to_string(),
            name: header.name,
            tracks: items.into_iter().map(Track::from).collect(),
        })
    }
}
