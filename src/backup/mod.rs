//! Playlist retrieval pipeline
//!
//! - `resolver`: playlist reference → identifier
//! - `paginator`: follows a paged collection to its last page
//! - `snapshot`: runs both over every configured playlist and flattens the results

mod paginator;
mod resolver;
mod snapshot;

pub use paginator::{PageFetcher, Paginator};
pub use resolver::resolve_playlist;
pub use snapshot::{PlaylistCatalog, SnapshotBuilder};
