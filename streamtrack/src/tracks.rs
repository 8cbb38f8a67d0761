pub mod audio;
pub mod chapter;
pub mod segment;
pub mod subtitle;
pub mod video;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::drm::{DrmSystems, KeySystem};
use crate::language::Language;
use crate::manifest::dash::{AdaptationSet, Representation};

use audio::AudioTrack;
use chapter::ChapterTrack;
use segment::SegmentLocator;
use subtitle::SubtitleTrack;
use video::VideoTrack;

/// Stable identity of a logical stream, used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        TrackId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append the stream's own location, for formats that give no other
    /// distinguishing attribute. The same URI reached twice still collides.
    pub fn qualified(self, location: &str) -> Self {
        TrackId(format!("{}@{location}", self.0))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Back-reference to the manifest node a track was built from.
///
/// These are owned copies; they stay valid after the document is dropped.
#[derive(Debug, Clone)]
pub enum Origin {
    Dash {
        period_index: usize,
        period_id: Option<String>,
        /// The containing AdaptationSet, without its Representations.
        adaptation_set: Box<AdaptationSet>,
        representation: Box<Representation>,
    },
    HlsVariant {
        variant: Box<m3u8_rs::VariantStream>,
    },
    HlsRendition {
        rendition: Box<m3u8_rs::AlternativeMedia>,
    },
    /// A bare media playlist with no master.
    HlsMedia,
}

/// Where a track's media lives and how it is protected.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSource {
    /// The stream's own URL: its DASH BaseURL or its HLS media playlist.
    pub url: String,
    pub segments: SegmentLocator,
    pub drm: DrmSystems,
    #[serde(skip)]
    pub origin: Origin,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Track {
    Video(VideoTrack),
    Audio(AudioTrack),
    Subtitle(SubtitleTrack),
    Chapter(ChapterTrack),
}

impl Track {
    pub fn id(&self) -> &TrackId {
        match self {
            Track::Video(track) => &track.id,
            Track::Audio(track) => &track.id,
            Track::Subtitle(track) => &track.id,
            Track::Chapter(track) => &track.id,
        }
    }

    pub fn language(&self) -> &Language {
        match self {
            Track::Video(track) => &track.language,
            Track::Audio(track) => &track.language,
            Track::Subtitle(track) => &track.language,
            Track::Chapter(track) => &track.language,
        }
    }

    /// Media location and DRM linkage; chapters have none.
    pub fn source(&self) -> Option<&TrackSource> {
        match self {
            Track::Video(track) => Some(&track.source),
            Track::Audio(track) => Some(&track.source),
            Track::Subtitle(track) => Some(&track.source),
            Track::Chapter(_) => None,
        }
    }

    /// `(key system, license server)` pairs to hand to a CDM client.
    pub fn license_targets(&self) -> Vec<(KeySystem, &str)> {
        self.source()
            .map(|source| {
                source
                    .drm
                    .iter()
                    .filter_map(|(system, signal)| {
                        signal.license_url.as_deref().map(|url| (*system, url))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_encrypted(&self) -> bool {
        self.source().is_some_and(|source| !source.drm.is_empty())
    }
}

/// The deduplicated tracks of one manifest, in document order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TrackSet {
    tracks: Vec<Track>,
    #[serde(skip)]
    ids: HashSet<TrackId>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track unless one with the same id is already present.
    ///
    /// Returns whether the track was inserted. A duplicate is not an error:
    /// the same stream is routinely listed under several manifest paths.
    pub fn add(&mut self, track: Track) -> bool {
        if self.ids.contains(track.id()) {
            debug!("Dropping duplicate track {}", track.id());
            return false;
        }
        self.ids.insert(track.id().clone());
        self.tracks.push(track);
        true
    }

    /// Attach an intro/credits marker from a service API.
    pub fn add_chapter(
        &mut self,
        timestamp: f64,
        name: Option<String>,
        language: Language,
    ) -> bool {
        self.add(Track::Chapter(ChapterTrack::new(timestamp, name, language)))
    }

    /// Move every track of `other` in, applying the same dedup rule.
    pub fn merge(&mut self, other: TrackSet) {
        for track in other.tracks {
            self.add(track);
        }
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id() == id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    pub fn videos(&self) -> impl Iterator<Item = &VideoTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Video(video) => Some(video),
            _ => None,
        })
    }

    pub fn audios(&self) -> impl Iterator<Item = &AudioTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Audio(audio) => Some(audio),
            _ => None,
        })
    }

    pub fn subtitles(&self) -> impl Iterator<Item = &SubtitleTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Subtitle(subtitle) => Some(subtitle),
            _ => None,
        })
    }

    pub fn chapters(&self) -> impl Iterator<Item = &ChapterTrack> {
        self.tracks.iter().filter_map(|track| match track {
            Track::Chapter(chapter) => Some(chapter),
            _ => None,
        })
    }

    /// Video tracks ordered best first: height, then bitrate.
    pub fn sort_videos_by_quality(&self) -> Vec<&VideoTrack> {
        let mut videos: Vec<&VideoTrack> = self.videos().collect();
        videos.sort_by(|a, b| (b.height, b.bitrate).cmp(&(a.height, a.bitrate)));
        videos
    }
}

impl<'a> IntoIterator for &'a TrackSet {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

impl IntoIterator for TrackSet {
    type Item = Track;
    type IntoIter = std::vec::IntoIter<Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}
