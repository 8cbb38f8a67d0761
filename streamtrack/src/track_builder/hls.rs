use m3u8_rs::{
    AlternativeMedia, AlternativeMediaType, MasterPlaylist, MediaPlaylist, QuotedOrUnquoted,
    VariantStream,
};
use tracing::{debug, warn};
use url::Url;

use super::finish;
use crate::classify::{classify, RangeHint, StreamNode};
use crate::drm::{extract_drm, ProtectionDecl};
use crate::error::{Error, Result};
use crate::language::Language;
use crate::manifest::hls::{Hls, KeyEntry, MediaDocument, Playlist};
use crate::manifest::resolve_uri;
use crate::tracks::audio::{parse_channels, AudioCodec, AudioTrack};
use crate::tracks::segment::{Addressing, ByteRange, Segment, SegmentLocator};
use crate::tracks::subtitle::{SubtitleCodec, SubtitleTrack};
use crate::tracks::video::{VideoCodec, VideoTrack};
use crate::tracks::{Origin, Track, TrackSet, TrackSource};

/// Variants without `CODECS` are assumed to be H.264 with AAC.
const DEFAULT_VIDEO_CODEC: VideoCodec = VideoCodec::Avc;
const DEFAULT_AUDIO_CODEC: AudioCodec = AudioCodec::Aac;

/// Only video variants become first-class tracks; audio muxed into their
/// segments is reported as `embedded_audio`. Renditions with their own URI
/// are standalone streams and become audio or subtitle tracks.
pub fn build(hls: &Hls, default_language: &Language) -> Result<TrackSet> {
    let mut tracks = TrackSet::new();

    match &hls.playlist {
        Playlist::Media(media) => {
            tracks.add(media_only_track(hls.url.as_ref(), media, default_language)?);
        }
        Playlist::Master {
            master,
            session_keys,
            ..
        } => {
            for variant in master.variants.iter().filter(|variant| !variant.is_i_frame) {
                let node = HlsNode::Variant {
                    variant,
                    media: hls.media_playlist(&variant.uri)?,
                    session_keys,
                };
                if let Some(track) =
                    parse_variant(hls.url.as_ref(), master, variant, &node, default_language)?
                {
                    tracks.add(track);
                }
            }

            for rendition in &master.alternatives {
                let Some(uri) = rendition.uri.as_deref() else {
                    continue;
                };
                let codecs = group_codecs(master, rendition);
                let node = HlsNode::Rendition {
                    rendition,
                    codecs: codecs.as_deref(),
                    media: hls.media_playlist(uri)?,
                    session_keys,
                };
                if let Some(track) =
                    parse_rendition(hls.url.as_ref(), rendition, uri, &node, default_language)?
                {
                    tracks.add(track);
                }
            }
        }
    }

    finish(tracks)
}

fn parse_variant(
    base: Option<&Url>,
    master: &MasterPlaylist,
    variant: &VariantStream,
    node: &HlsNode<'_>,
    default_language: &Language,
) -> Result<Option<Track>> {
    let codec = match variant.codecs.as_deref() {
        None => DEFAULT_VIDEO_CODEC,
        Some(codecs) => match VideoCodec::from_codecs(codecs) {
            Some(codec) => codec,
            None => {
                debug!("Skipping audio-only variant {}", variant.uri);
                return Ok(None);
            }
        },
    };
    let embedded_audio = if has_standalone_audio(master, variant) {
        None
    } else {
        match variant.codecs.as_deref() {
            None => Some(DEFAULT_AUDIO_CODEC),
            Some(codecs) => AudioCodec::from_codecs(codecs),
        }
    };

    let url = resolve_uri(base, &variant.uri)?;
    let range = classify(node).range;
    let width = variant
        .resolution
        .as_ref()
        .and_then(|resolution| u32::try_from(resolution.width).ok());
    let height = variant
        .resolution
        .as_ref()
        .and_then(|resolution| u32::try_from(resolution.height).ok());
    let bitrate = Some(variant.bandwidth);
    let language = default_language.clone();

    Ok(Some(Track::Video(VideoTrack {
        id: VideoTrack::stable_id(codec, range, &language, width, height, bitrate),
        language,
        codec,
        range,
        width,
        height,
        frame_rate: variant.frame_rate,
        bitrate,
        embedded_audio,
        source: TrackSource {
            segments: playlist_locator(&url, node.playlist())?,
            url: url.to_string(),
            drm: extract_drm(node),
            origin: Origin::HlsVariant {
                variant: Box::new(variant.clone()),
            },
        },
    })))
}

fn parse_rendition(
    base: Option<&Url>,
    rendition: &AlternativeMedia,
    uri: &str,
    node: &HlsNode<'_>,
    default_language: &Language,
) -> Result<Option<Track>> {
    let url = resolve_uri(base, uri)?;
    let language = Language::resolve(
        [rendition.language.as_deref(), rendition.assoc_language.as_deref()],
        default_language,
    );
    let classification = classify(node);
    let source = TrackSource {
        segments: playlist_locator(&url, node.playlist())?,
        url: url.to_string(),
        drm: extract_drm(node),
        origin: Origin::HlsRendition {
            rendition: Box::new(rendition.clone()),
        },
    };

    let track = match rendition.media_type {
        AlternativeMediaType::Audio => {
            let codec = node
                .codecs()
                .and_then(AudioCodec::from_codecs)
                .unwrap_or(DEFAULT_AUDIO_CODEC);
            let channels = rendition.channels.as_deref().and_then(parse_channels);
            Track::Audio(AudioTrack {
                id: AudioTrack::stable_id(
                    codec,
                    &language,
                    channels.as_deref(),
                    None,
                    classification.is_descriptive,
                )
                .qualified(url.as_str()),
                language,
                codec,
                channels,
                bitrate: None,
                sampling_rate: None,
                is_descriptive: classification.is_descriptive,
                source,
            })
        }
        AlternativeMediaType::Subtitles => {
            let codec = node
                .codecs()
                .and_then(SubtitleCodec::from_codecs)
                .unwrap_or(SubtitleCodec::WebVtt);
            Track::Subtitle(SubtitleTrack {
                id: SubtitleTrack::stable_id(
                    codec,
                    &language,
                    classification.is_forced,
                    classification.is_sdh,
                )
                .qualified(url.as_str()),
                language,
                codec,
                is_forced: classification.is_forced,
                is_sdh: classification.is_sdh,
                source,
            })
        }
        _ => {
            debug!("Skipping {:?} rendition {}", rendition.media_type, rendition.name);
            return Ok(None);
        }
    };
    Ok(Some(track))
}

/// A media playlist served without a master: one video stream with muxed audio.
fn media_only_track(
    base: Option<&Url>,
    media: &MediaDocument,
    language: &Language,
) -> Result<Track> {
    let url = match base {
        Some(url) => url.clone(),
        None => {
            let first = media
                .playlist
                .segments
                .first()
                .ok_or_else(|| Error::malformed("media playlist has no segments"))?;
            resolve_uri(None, &first.uri)?
        }
    };
    let node = HlsNode::Media { media };
    let range = classify(&node).range;

    Ok(Track::Video(VideoTrack {
        id: VideoTrack::stable_id(DEFAULT_VIDEO_CODEC, range, language, None, None, None),
        language: language.clone(),
        codec: DEFAULT_VIDEO_CODEC,
        range,
        width: None,
        height: None,
        frame_rate: None,
        bitrate: None,
        embedded_audio: Some(DEFAULT_AUDIO_CODEC),
        source: TrackSource {
            segments: playlist_locator(&url, Some(&media.playlist))?,
            url: url.to_string(),
            drm: extract_drm(&node),
            origin: Origin::HlsMedia,
        },
    }))
}

/// Whether the variant's audio lives in a separate rendition playlist.
fn has_standalone_audio(master: &MasterPlaylist, variant: &VariantStream) -> bool {
    let Some(group) = variant.audio.as_deref() else {
        return false;
    };
    master.alternatives.iter().any(|rendition| {
        matches!(rendition.media_type, AlternativeMediaType::Audio)
            && rendition.group_id == group
            && rendition.uri.is_some()
    })
}

/// The `CODECS` of the first variant referencing a rendition's group.
fn group_codecs(master: &MasterPlaylist, rendition: &AlternativeMedia) -> Option<String> {
    master
        .variants
        .iter()
        .find(|variant| {
            let group = match rendition.media_type {
                AlternativeMediaType::Audio => variant.audio.as_deref(),
                AlternativeMediaType::Subtitles => variant.subtitles.as_deref(),
                _ => None,
            };
            group == Some(rendition.group_id.as_str())
        })
        .and_then(|variant| variant.codecs.clone())
}

fn playlist_locator(url: &Url, media: Option<&MediaPlaylist>) -> Result<SegmentLocator> {
    let mut locator = SegmentLocator {
        addressing: Addressing::Playlist {
            url: url.to_string(),
        },
        init: None,
        segments: Vec::new(),
    };
    let Some(media) = media else {
        return Ok(locator);
    };

    let mut next_offset = 0;
    for segment in &media.segments {
        let range = segment.byte_range.as_ref().and_then(|range| {
            let offset = range.offset.unwrap_or(next_offset);
            next_offset = offset + range.length;
            ByteRange::from_length(range.length, offset)
        });
        if locator.init.is_none() {
            if let Some(map) = &segment.map {
                let range = map.byte_range.as_ref().and_then(|range| {
                    ByteRange::from_length(range.length, range.offset.unwrap_or(0))
                });
                let init = Segment::new(resolve_uri(Some(url), &map.uri)?).with_range(range);
                locator.init = Some(init);
            }
        }
        locator.segments.push(
            Segment::new(resolve_uri(Some(url), &segment.uri)?)
                .with_range(range)
                .with_duration(f64::from(segment.duration)),
        );
    }

    Ok(locator)
}

enum HlsNode<'a> {
    Variant {
        variant: &'a VariantStream,
        media: Option<&'a MediaDocument>,
        session_keys: &'a [KeyEntry],
    },
    Rendition {
        rendition: &'a AlternativeMedia,
        codecs: Option<&'a str>,
        media: Option<&'a MediaDocument>,
        session_keys: &'a [KeyEntry],
    },
    Media {
        media: &'a MediaDocument,
    },
}

impl HlsNode<'_> {
    fn media(&self) -> Option<&MediaDocument> {
        match self {
            Self::Variant { media, .. } | Self::Rendition { media, .. } => *media,
            Self::Media { media } => Some(*media),
        }
    }

    fn playlist(&self) -> Option<&MediaPlaylist> {
        self.media().map(|media| &media.playlist)
    }

    fn session_keys(&self) -> &[KeyEntry] {
        match self {
            Self::Variant { session_keys, .. } | Self::Rendition { session_keys, .. } => {
                *session_keys
            }
            Self::Media { .. } => &[],
        }
    }
}

impl StreamNode for HlsNode<'_> {
    fn role_values(&self) -> Vec<&str> {
        match self {
            Self::Rendition { rendition, .. } => rendition
                .characteristics
                .as_deref()
                .map(|characteristics| {
                    characteristics
                        .split(',')
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn labels(&self) -> Vec<&str> {
        match self {
            Self::Rendition { rendition, .. } => vec![rendition.name.as_str()],
            _ => Vec::new(),
        }
    }

    fn codecs(&self) -> Option<&str> {
        match self {
            Self::Variant { variant, .. } => variant.codecs.as_deref(),
            Self::Rendition { codecs, .. } => *codecs,
            Self::Media { .. } => None,
        }
    }

    fn mime_type(&self) -> Option<&str> {
        None
    }

    fn range_hints(&self) -> Vec<RangeHint> {
        let Self::Variant { variant, .. } = self else {
            return Vec::new();
        };
        variant
            .other_attributes
            .as_ref()
            .and_then(|attributes| attributes.get("VIDEO-RANGE"))
            .and_then(|value| {
                let value = match value {
                    QuotedOrUnquoted::Quoted(value) | QuotedOrUnquoted::Unquoted(value) => value,
                };
                RangeHint::from_video_range(value)
            })
            .into_iter()
            .collect()
    }

    /// Keys of the stream's own playlist, then session keys.
    fn protections(&self) -> Vec<ProtectionDecl> {
        let playlist_keys = self.media().into_iter().flat_map(|media| media.keys.iter());

        let mut protections: Vec<ProtectionDecl> = Vec::new();
        for key in playlist_keys.chain(self.session_keys()) {
            if let Some(protection) = protection_from_key(key) {
                if !protections.contains(&protection) {
                    protections.push(protection);
                }
            }
        }
        protections
    }

    fn forced_flag(&self) -> bool {
        matches!(self, Self::Rendition { rendition, .. } if rendition.forced)
    }
}

/// `data:` URIs carry init data; any other URI is where the key is served.
fn protection_from_key(key: &KeyEntry) -> Option<ProtectionDecl> {
    if key.is_clear() {
        return None;
    }

    let scheme = key
        .keyformat
        .clone()
        .unwrap_or_else(|| "identity".to_string());
    let mut protection = ProtectionDecl {
        scheme,
        ..Default::default()
    };
    match key.uri.as_deref() {
        Some(uri) if uri.starts_with("data:") => {
            protection.pssh = uri.split_once("base64,").map(|(_, data)| data.to_string());
        }
        Some(uri) => protection.license_url = Some(uri.to_string()),
        None => warn!("Key entry without URI for {}", protection.scheme),
    }
    Some(protection)
}
