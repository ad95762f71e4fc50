//! Spotify Web API client wrapper used by the backup pipeline

use async_trait::async_trait;
use chrono::SecondsFormat;
use rspotify::{
    model::{PlayableItem, PlaylistId, PlaylistItem},
    prelude::*,
    AuthCodeSpotify, ClientCredsSpotify,
};

use super::types::{Page, PlaylistHeader, PlaylistIdentifier, RawArtist, RawItem};
use crate::backup::{PageFetcher, PlaylistCatalog};
use crate::error::{BackupError, Result};

/// Authorized Spotify client, produced by one of the two auth flows
#[derive(Clone)]
pub enum SpotifyClient {
    ClientCredentials(ClientCredsSpotify),
    AuthorizationCode(AuthCodeSpotify),
}

impl SpotifyClient {
    /// Playlist items endpoint maximum
    pub const PLAYLIST_PAGE_SIZE: u32 = 100;

    fn playlist_id(id: &PlaylistIdentifier) -> Result<PlaylistId<'_>> {
        PlaylistId::from_id(id.as_str())
            .map_err(|e| BackupError::malformed(id.as_str(), e.to_string()))
    }

    pub fn flow_name(&self) -> &'static str {
        match self {
            Self::ClientCredentials(_) => "client_credentials",
            Self::AuthorizationCode(_) => "authorization_code",
        }
    }
}

#[async_trait]
impl PlaylistCatalog for SpotifyClient {
    async fn playlist_header(&self, id: &PlaylistIdentifier) -> Result<PlaylistHeader> {
        let playlist_id = Self::playlist_id(id)?;
        tracing::debug!(playlist_id = %id, "API: playlist");

        // No `fields` filter: FullPlaylist only deserializes from the complete object
        let playlist = match self {
            Self::ClientCredentials(c) => c.playlist(playlist_id, None, None).await?,
            Self::AuthorizationCode(c) => c.playlist(playlist_id, None, None).await?,
        };

        Ok(PlaylistHeader {
            id: PlaylistIdentifier::new(playlist.id.id()),
            name: playlist.name,
            total_tracks: playlist.tracks.total,
        })
    }
}

#[async_trait]
impl PageFetcher for SpotifyClient {
    type Item = RawItem;

    async fn fetch_page(&self, collection: &PlaylistIdentifier, offset: u32) -> Result<Page<RawItem>> {
        let playlist_id = Self::playlist_id(collection)?;
        let limit = Some(Self::PLAYLIST_PAGE_SIZE);
        tracing::debug!(playlist_id = %collection, offset, "API: playlist_items");

        let page = match self {
            Self::ClientCredentials(c) => {
                c.playlist_items_manual(playlist_id, None, None, limit, Some(offset))
                    .await?
            }
            Self::AuthorizationCode(c) => {
                c.playlist_items_manual(playlist_id, None, None, limit, Some(offset))
                    .await?
            }
        };

        let received = page.items.len() as u32;
        Ok(Page {
            next_offset: page.next.as_ref().map(|_| page.offset + received),
            offset: page.offset,
            total: page.total,
            items: page.items.into_iter().map(raw_item).collect(),
        })
    }
}

/// Decouple a playlist entry from the rspotify model.
///
/// Entries whose track was removed from the catalog come back without a track; they are
/// kept as blank items so the traversal count matches what the service returned.
fn raw_item(item: PlaylistItem) -> RawItem {
    let added_at = item
        .added_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));

    match item.track {
        Some(PlayableItem::Track(track)) => RawItem {
            id: track.id.as_ref().map(|id| id.id().to_string()),
            name: track.name,
            artists: track
                .artists
                .into_iter()
                .map(|a| RawArtist { name: a.name })
                .collect(),
            added_at,
        },
        Some(PlayableItem::Episode(episode)) => RawItem {
            id: Some(episode.id.id().to_string()),
            name: episode.name,
            artists: vec![RawArtist {
                name: episode.show.name,
            }],
            added_at,
        },
        Some(PlayableItem::Unknown(_)) | None => RawItem {
            id: None,
            name: String::new(),
            artists: Vec::new(),
            added_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_item(added_at: &str, track: &str) -> PlaylistItem {
        let json = format!(
            r#"{{"added_at": "{added_at}", "added_by": null, "is_local": false, "track": {track}}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    fn artist(id: &str, name: &str) -> String {
        format!(
            r#"{{
                "external_urls": {{"spotify": "https://open.spotify.com/artist/{id}"}},
                "href": "https://api.spotify.com/v1/artists/{id}",
                "id": "{id}",
                "name": "{name}",
                "type": "artist",
                "uri": "spotify:artist:{id}"
            }}"#
        )
    }

    fn track_json() -> String {
        let lead = artist("0TnOYISbd1XYRBk9myaseg", "Lead");
        let feature = artist("1vCWHaC5f2uS3yhpwWbIA6", "Feature");
        format!(
            r#"{{
                "album": {{
                    "album_type": "album",
                    "total_tracks": 10,
                    "available_markets": ["US"],
                    "external_urls": {{"spotify": "https://open.spotify.com/album/2up3OPMp9Tb4dAKM2erWXQ"}},
                    "href": "https://api.spotify.com/v1/albums/2up3OPMp9Tb4dAKM2erWXQ",
                    "id": "2up3OPMp9Tb4dAKM2erWXQ",
                    "images": [],
                    "name": "Album",
                    "release_date": "2020-01-01",
                    "release_date_precision": "day",
                    "type": "album",
                    "uri": "spotify:album:2up3OPMp9Tb4dAKM2erWXQ",
                    "artists": [{lead}]
                }},
                "artists": [{lead}, {feature}],
                "available_markets": ["US"],
                "disc_number": 1,
                "duration_ms": 201000,
                "explicit": false,
                "external_ids": {{"isrc": "USUM71703861"}},
                "external_urls": {{"spotify": "https://open.spotify.com/track/11dFghVXANMlKmJXsNCbNl"}},
                "href": "https://api.spotify.com/v1/tracks/11dFghVXANMlKmJXsNCbNl",
                "id": "11dFghVXANMlKmJXsNCbNl",
                "is_local": false,
                "name": "Song",
                "popularity": 50,
                "preview_url": null,
                "track_number": 1,
                "type": "track",
                "uri": "spotify:track:11dFghVXANMlKmJXsNCbNl"
            }}"#
        )
    }

    const EPISODE_JSON: &str = r#"{
        "audio_preview_url": null,
        "description": "An episode",
        "html_description": "<p>An episode</p>",
        "duration_ms": 1686230,
        "explicit": false,
        "external_urls": {"spotify": "https://open.spotify.com/episode/512ojhOuo1ktJprKbVcKyQ"},
        "href": "https://api.spotify.com/v1/episodes/512ojhOuo1ktJprKbVcKyQ",
        "id": "512ojhOuo1ktJprKbVcKyQ",
        "images": [],
        "is_externally_hosted": false,
        "is_playable": true,
        "language": "en",
        "languages": ["en"],
        "name": "Episode 1",
        "release_date": "2021-04-01",
        "release_date_precision": "day",
        "type": "episode",
        "uri": "spotify:episode:512ojhOuo1ktJprKbVcKyQ",
        "show": {
            "available_markets": ["US"],
            "copyrights": [],
            "description": "A show",
            "html_description": "<p>A show</p>",
            "explicit": false,
            "external_urls": {"spotify": "https://open.spotify.com/show/38bS44xjbVVZ3No3ByF1dJ"},
            "href": "https://api.spotify.com/v1/shows/38bS44xjbVVZ3No3ByF1dJ",
            "id": "38bS44xjbVVZ3No3ByF1dJ",
            "images": [],
            "is_externally_hosted": false,
            "languages": ["en"],
            "media_type": "audio",
            "name": "The Show",
            "publisher": "Publisher",
            "type": "show",
            "uri": "spotify:show:38bS44xjbVVZ3No3ByF1dJ",
            "total_episodes": 10
        }
    }"#;

    #[test]
    fn test_track_item_keeps_ids_names_and_artist_order() {
        let item = raw_item(playlist_item("2023-05-01T10:20:30Z", &track_json()));

        assert_eq!(item.id.as_deref(), Some("11dFghVXANMlKmJXsNCbNl"));
        assert_eq!(item.name, "Song");
        let artists: Vec<_> = item.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(artists, vec!["Lead", "Feature"]);
        assert_eq!(item.added_at.as_deref(), Some("2023-05-01T10:20:30Z"));
    }

    #[test]
    fn test_added_at_is_rfc3339_at_second_precision() {
        let item = raw_item(playlist_item("2023-05-01T10:20:30.250Z", &track_json()));
        assert_eq!(item.added_at.as_deref(), Some("2023-05-01T10:20:30Z"));
    }

    #[test]
    fn test_episode_item_uses_show_as_artist() {
        let item = raw_item(playlist_item("2023-05-01T10:20:30Z", EPISODE_JSON));

        assert_eq!(item.id.as_deref(), Some("512ojhOuo1ktJprKbVcKyQ"));
        assert_eq!(item.name, "Episode 1");
        assert_eq!(
            item.artists,
            vec![RawArtist {
                name: "The Show".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_track_becomes_blank_item() {
        let item = raw_item(playlist_item("2023-05-01T10:20:30Z", "null"));

        assert_eq!(item.id, None);
        assert!(item.name.is_empty());
        assert!(item.artists.is_empty());
        assert_eq!(item.added_at.as_deref(), Some("2023-05-01T10:20:30Z"));
    }
}
