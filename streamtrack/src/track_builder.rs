//! Walks a parsed manifest and emits one track per selectable stream.

pub mod dash;
pub mod hls;

use tracing::info;

use crate::error::{Error, Result};
use crate::language::Language;
use crate::manifest::{ManifestDocument, StreamingManifest};
use crate::tracks::TrackSet;

/// Build the deduplicated track set of a parsed manifest.
///
/// `default_language` is used for every stream whose node and group both
/// leave the language unset.
pub fn build_tracks(document: &ManifestDocument, default_language: &Language) -> Result<TrackSet> {
    document.to_tracks(default_language)
}

/// What a candidate stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Text,
    /// Trick-play thumbnails.
    Image,
}

impl MediaKind {
    /// DASH `contentType`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "text" | "application" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }

    /// The top-level type of a mime type. `application/mp4` says nothing
    /// about the content and yields `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let (top, sub) = mime.split_once('/')?;
        match top {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "application" if sub != "mp4" && sub != "octet-stream" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Reject a build pass that produced nothing to play.
fn finish(tracks: TrackSet) -> Result<TrackSet> {
    if tracks.videos().next().is_none() {
        return Err(Error::NoPlayableStreams);
    }
    info!(
        "Built {} track(s): {} video, {} audio, {} subtitle",
        tracks.len(),
        tracks.videos().count(),
        tracks.audios().count(),
        tracks.subtitles().count()
    );
    Ok(tracks)
}
