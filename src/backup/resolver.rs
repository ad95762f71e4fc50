//! Turns user-supplied playlist references into canonical identifiers

use url::{ParseError, Url};

use crate::error::{BackupError, Result};
use crate::model::PlaylistIdentifier;

/// Resolve a playlist URL, `spotify:` URI or bare ID to its identifier.
///
/// Accepts `https://open.spotify.com/playlist/<id>?si=...`, the same without a scheme,
/// `spotify:playlist:<id>` and a bare `<id>`. No network lookup is made, so an identifier
/// that resolves here can still turn out not to exist.
pub fn resolve_playlist(reference: &str) -> Result<PlaylistIdentifier> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(BackupError::malformed(reference, "empty reference"));
    }

    if is_base62(trimmed) {
        return Ok(PlaylistIdentifier::new(trimmed));
    }

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}"))
            .map_err(|e| BackupError::malformed(reference, e.to_string()))?,
        Err(e) => return Err(BackupError::malformed(reference, e.to_string())),
    };

    let segment = if url.scheme() == "spotify" {
        url.path().rsplit(':').next()
    } else {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
    };

    match segment {
        Some(id) if is_base62(id) => Ok(PlaylistIdentifier::new(id)),
        Some(id) => Err(BackupError::malformed(
            reference,
            format!("{id:?} is not a playlist id"),
        )),
        None => Err(BackupError::malformed(reference, "no path segment")),
    }
}

fn is_base62(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}
