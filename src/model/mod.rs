//! Model module - backup data types and the Spotify client
//!
//! - `types`: playlist/track/snapshot types plus the raw page shapes they are built from
//! - `spotify_client`: Spotify API client wrapper

mod types;
mod spotify_client;

pub use types::{
    Page, Playlist, PlaylistHeader, PlaylistIdentifier, RawArtist, RawItem, Snapshot, Track,
};

pub use spotify_client::SpotifyClient;
