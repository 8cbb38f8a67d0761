use std::collections::HashMap;
use std::sync::LazyLock;

use m3u8_rs::{AlternativeMediaType, MasterPlaylist, MediaPlaylist, Playlist as M3u8Playlist};
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use super::{resolve_uri, ParseContext, StreamingManifest};
use crate::drm::KeySystem;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::repair::strip_foreign_drm;
use crate::track_builder;
use crate::tracks::TrackSet;

static KEY_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Z0-9-]+)=("[^"]*"|[^,]*)"#).expect("valid attribute regex")
});

/// A parsed HLS presentation with every referenced media playlist loaded.
#[derive(Debug, Clone)]
pub struct Hls {
    pub url: Option<Url>,
    pub playlist: Playlist,
    trimmed: bool,
}

#[derive(Debug, Clone)]
pub enum Playlist {
    Master {
        master: MasterPlaylist,
        /// `#EXT-X-SESSION-KEY` entries left after the foreign-DRM filter.
        session_keys: Vec<KeyEntry>,
        /// Media playlists keyed by their resolved URL.
        media: HashMap<String, MediaDocument>,
    },
    /// A media playlist served on its own.
    Media(MediaDocument),
}

#[derive(Debug, Clone)]
pub struct MediaDocument {
    pub playlist: MediaPlaylist,
    /// Every `#EXT-X-KEY` in document order. m3u8-rs attaches only the last
    /// key declared before a segment, so keys for several systems in a row
    /// are kept here.
    pub keys: Vec<KeyEntry>,
}

/// One `#EXT-X-KEY` or `#EXT-X-SESSION-KEY` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub method: String,
    pub uri: Option<String>,
    pub keyformat: Option<String>,
}

impl KeyEntry {
    /// Parse a tag line; `None` when it has no attribute list or no METHOD.
    pub fn parse(line: &str) -> Option<Self> {
        let (_, attributes) = line.trim().split_once(':')?;
        let mut method = None;
        let mut uri = None;
        let mut keyformat = None;

        for caps in KEY_ATTRIBUTE.captures_iter(attributes) {
            let value = caps[2].trim().trim_matches('"').to_string();
            match &caps[1] {
                "METHOD" => method = Some(value),
                "URI" => uri = Some(value),
                "KEYFORMAT" => keyformat = Some(value),
                _ => {}
            }
        }

        Some(Self {
            method: method?,
            uri,
            keyformat,
        })
    }

    /// `METHOD=NONE` switches encryption off.
    pub fn is_clear(&self) -> bool {
        self.method.eq_ignore_ascii_case("NONE")
    }
}

impl Hls {
    /// The loaded media playlist a master playlist URI points at.
    pub fn media_playlist(&self, uri: &str) -> Result<Option<&MediaDocument>> {
        match &self.playlist {
            Playlist::Master { media, .. } => {
                let url = resolve_uri(self.url.as_ref(), uri)?;
                Ok(media.get(url.as_str()))
            }
            Playlist::Media(_) => Ok(None),
        }
    }

    fn media_playlists(&self) -> Box<dyn Iterator<Item = &MediaPlaylist> + '_> {
        match &self.playlist {
            Playlist::Master { media, .. } => {
                Box::new(media.values().map(|document| &document.playlist))
            }
            Playlist::Media(document) => Box::new(std::iter::once(&document.playlist)),
        }
    }

    fn media_playlists_mut(&mut self) -> Box<dyn Iterator<Item = &mut MediaPlaylist> + '_> {
        match &mut self.playlist {
            Playlist::Master { media, .. } => {
                Box::new(media.values_mut().map(|document| &mut document.playlist))
            }
            Playlist::Media(document) => Box::new(std::iter::once(&mut document.playlist)),
        }
    }
}

impl StreamingManifest for Hls {
    fn from_text(body: &str, url: Option<Url>, ctx: &ParseContext<'_>) -> Result<Self> {
        let (parsed, cleaned) = parse_playlist(body, ctx.key_system)?;
        let playlist = match parsed {
            M3u8Playlist::MasterPlaylist(master) => {
                let mut media = HashMap::new();
                for uri in referenced_uris(&master) {
                    let playlist_url = resolve_uri(url.as_ref(), uri)?;
                    if media.contains_key(playlist_url.as_str()) {
                        continue;
                    }

                    debug!("Loading media playlist {}", playlist_url);
                    let text = ctx.fetcher.fetch_text(&playlist_url)?;
                    match parse_playlist(&text, ctx.key_system)? {
                        (M3u8Playlist::MediaPlaylist(playlist), cleaned) => {
                            let keys = key_entries(&cleaned, "#EXT-X-KEY:");
                            let document = MediaDocument { playlist, keys };
                            media.insert(playlist_url.to_string(), document);
                        }
                        (M3u8Playlist::MasterPlaylist(_), _) => {
                            return Err(Error::malformed(format!(
                                "{playlist_url} is a master playlist, expected a media playlist"
                            )));
                        }
                    }
                }

                info!(
                    "Parsed master playlist with {} variant(s), {} rendition(s), {} media playlist(s)",
                    master.variants.len(),
                    master.alternatives.len(),
                    media.len()
                );
                Playlist::Master {
                    master,
                    session_keys: key_entries(&cleaned, "#EXT-X-SESSION-KEY:"),
                    media,
                }
            }
            M3u8Playlist::MediaPlaylist(playlist) => {
                info!("Parsed media playlist with {} segment(s)", playlist.segments.len());
                Playlist::Media(MediaDocument {
                    playlist,
                    keys: key_entries(&cleaned, "#EXT-X-KEY:"),
                })
            }
        };

        Ok(Hls {
            url,
            playlist,
            trimmed: false,
        })
    }
    /// The longest media playlist's total segment duration.
    fn duration_secs(&self) -> Option<f64> {
        self.media_playlists()
            .filter(|playlist| !playlist.segments.is_empty())
            .map(playlist_duration)
            .reduce(f64::max)
    }

    fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// HLS has no duration attribute, so segments starting at or after the
    /// new end are dropped instead.
    fn apply_trim(&mut self, duration_secs: f64) {
        for playlist in self.media_playlists_mut() {
            let mut start = 0.0;
            let keep = playlist
                .segments
                .iter()
                .take_while(|segment| {
                    let begins = start;
                    start += f64::from(segment.duration);
                    begins < duration_secs
                })
                .count();
            if keep < playlist.segments.len() {
                debug!(
                    "Dropping {} trailing segment(s)",
                    playlist.segments.len() - keep
                );
                playlist.segments.truncate(keep);
            }
        }
        self.trimmed = true;
    }

    fn to_tracks(&self, language: &Language) -> Result<TrackSet> {
        track_builder::hls::build(self, language)
    }
}

/// Parse a playlist after the foreign-DRM filter; the filtered text is
/// returned with it.
fn parse_playlist(text: &str, key_system: KeySystem) -> Result<(M3u8Playlist, String)> {
    let text = text.trim_start_matches('\u{feff}');
    if !text.starts_with("#EXTM3U") {
        return Err(Error::malformed("playlist does not start with #EXTM3U"));
    }

    let cleaned = strip_foreign_drm(text, key_system);
    match m3u8_rs::parse_playlist_res(cleaned.as_bytes()) {
        Ok(playlist) => Ok((playlist, cleaned)),
        Err(e) => {
            debug!("m3u8 parser error: {:?}", e);
            Err(Error::malformed("could not parse M3U8 playlist"))
        }
    }
}

fn key_entries(text: &str, tag: &str) -> Vec<KeyEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(tag))
        .filter_map(KeyEntry::parse)
        .collect()
}

/// URIs of every media playlist a master playlist references.
fn referenced_uris(master: &MasterPlaylist) -> Vec<&str> {
    let variants = master
        .variants
        .iter()
        .filter(|variant| !variant.is_i_frame)
        .map(|variant| variant.uri.as_str());
    let renditions = master
        .alternatives
        .iter()
        .filter(|rendition| {
            matches!(
                rendition.media_type,
                AlternativeMediaType::Audio
                    | AlternativeMediaType::Video
                    | AlternativeMediaType::Subtitles
            )
        })
        .filter_map(|rendition| rendition.uri.as_deref());

    variants.chain(renditions).collect()
}

pub fn playlist_duration(playlist: &MediaPlaylist) -> f64 {
    playlist
        .segments
        .iter()
        .map(|segment| f64::from(segment.duration))
        .sum()
}
