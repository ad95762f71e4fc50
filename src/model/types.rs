//! Core type definitions shared by the fetch pipeline and the publishers

use std::fmt;

use serde::Serialize;

use crate::error::Result;

/// Canonical identifier of a remote playlist (the base-62 Spotify ID)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaylistIdentifier(String);

impl PlaylistIdentifier {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a remote collection.
///
/// `next_offset` is the continuation marker: `None` means this was the last page.
/// `total` is whatever the service claimed the collection size was and is only a hint.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub next_offset: Option<u32>,
    pub total: u32,
}

/// An artist as it appears on a raw playlist item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawArtist {
    pub name: String,
}

/// A playlist entry as returned by the service, before flattening
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawItem {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<RawArtist>,
    pub added_at: Option<String>,
}

/// Playlist metadata, fetched separately from its items
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistHeader {
    pub id: PlaylistIdentifier,
    pub name: String,
    pub total_tracks: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    #[serde(rename = "addedat")]
    pub added_at: String,
}

impl From<RawItem> for Track {
    fn from(item: RawItem) -> Self {
        Self {
            id: item.id.unwrap_or_default(),
            name: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            added_at: item.added_at.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
}

/// Every playlist that was fetched completely during one run, in input order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub playlists: Vec<Playlist>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.playlists.iter().map(|p| p.tracks.len()).sum()
    }

    /// Tab-indented JSON, the on-disk backup format
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }
}
