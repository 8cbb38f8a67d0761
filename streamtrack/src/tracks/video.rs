use std::fmt;

use serde::Serialize;

use super::audio::AudioCodec;
use super::{TrackId, TrackSource};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VideoCodec {
    Avc,
    Hevc,
    Vp8,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Identify a single RFC 6381 codec entry, e.g. `avc1.640028`.
    pub fn from_codec(codec: &str) -> Option<Self> {
        let fourcc = codec.trim().split('.').next()?.to_ascii_lowercase();
        match fourcc.as_str() {
            "avc1" | "avc2" | "avc3" | "avc4" | "h264" => Some(Self::Avc),
            "hvc1" | "hev1" | "dvh1" | "dvhe" | "h265" | "hevc" => Some(Self::Hevc),
            "vp8" | "vp08" => Some(Self::Vp8),
            "vp9" | "vp09" => Some(Self::Vp9),
            "av01" | "av1" => Some(Self::Av1),
            // Dolby Vision over an AVC base layer
            "dva1" | "dvav" => Some(Self::Avc),
            _ => None,
        }
    }

    /// The first video codec in a comma-separated `codecs` list.
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        codecs.split(',').find_map(Self::from_codec)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "video/h264" => Some(Self::Avc),
            "video/h265" => Some(Self::Hevc),
            "video/vp8" => Some(Self::Vp8),
            "video/vp9" => Some(Self::Vp9),
            "video/av1" => Some(Self::Av1),
            _ => None,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Avc => "AVC",
            Self::Hevc => "HEVC",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
        };
        f.write_str(name)
    }
}

/// True when a codec list carries a Dolby Vision sample entry.
pub fn is_dolby_vision_codec(codecs: &str) -> bool {
    codecs.split(',').any(|codec| {
        let fourcc = codec.trim().split('.').next().unwrap_or_default();
        matches!(
            fourcc.to_ascii_lowercase().as_str(),
            "dvh1" | "dvhe" | "dva1" | "dvav"
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DynamicRange {
    Sdr,
    Hdr10,
    Hlg,
    DolbyVision,
}

impl fmt::Display for DynamicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sdr => "SDR",
            Self::Hdr10 => "HDR10",
            Self::Hlg => "HLG",
            Self::DolbyVision => "DV",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoTrack {
    pub id: TrackId,
    pub language: Language,

    pub codec: VideoCodec,
    pub range: DynamicRange,

    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub bitrate: Option<u64>,

    /// Audio interleaved in this stream's segments (HLS transport streams).
    /// It is downloaded with the video and never listed as its own track.
    pub embedded_audio: Option<AudioCodec>,

    pub source: TrackSource,
}

impl VideoTrack {
    /// Codec, range, language and resolution; bitrate stands in when the
    /// resolution is unknown.
    pub fn stable_id(
        codec: VideoCodec,
        range: DynamicRange,
        language: &Language,
        width: Option<u32>,
        height: Option<u32>,
        bitrate: Option<u64>,
    ) -> TrackId {
        let size = match (width, height) {
            (Some(width), Some(height)) => format!("{width}x{height}"),
            _ => format!("{}bps", bitrate.unwrap_or_default()),
        };
        TrackId::new(format!("video:{codec}:{range}:{language}:{size}"))
    }
}
