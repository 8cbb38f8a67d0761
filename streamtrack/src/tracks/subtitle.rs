use std::fmt;

use serde::Serialize;

use super::{TrackId, TrackSource};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubtitleCodec {
    WebVtt,
    /// TTML and its EBU-TT / IMSC profiles, plain or in fMP4 (`stpp`).
    Ttml,
    SubRip,
}

impl SubtitleCodec {
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        codecs.split(',').find_map(|codec| {
            let fourcc = codec.trim().split('.').next().unwrap_or_default();
            match fourcc.to_ascii_lowercase().as_str() {
                "wvtt" | "vtt" | "webvtt" => Some(Self::WebVtt),
                "stpp" | "ttml" | "dfxp" | "im1t" | "im2t" | "ebutt" => Some(Self::Ttml),
                "srt" | "subrip" => Some(Self::SubRip),
                _ => None,
            }
        })
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "text/vtt" | "text/webvtt" => Some(Self::WebVtt),
            "application/ttml+xml" | "application/ttaf+xml" | "application/xml" => Some(Self::Ttml),
            "application/x-subrip" | "text/srt" => Some(Self::SubRip),
            _ => None,
        }
    }
}

impl fmt::Display for SubtitleCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WebVtt => "WebVTT",
            Self::Ttml => "TTML",
            Self::SubRip => "SubRip",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtitleTrack {
    pub id: TrackId,
    pub language: Language,

    pub codec: SubtitleCodec,
    pub is_forced: bool,
    /// Closed captions / subtitles for the deaf and hard of hearing.
    pub is_sdh: bool,

    pub source: TrackSource,
}

impl SubtitleTrack {
    pub fn stable_id(
        codec: SubtitleCodec,
        language: &Language,
        is_forced: bool,
        is_sdh: bool,
    ) -> TrackId {
        let flavour = match (is_forced, is_sdh) {
            (true, _) => "forced",
            (false, true) => "sdh",
            (false, false) => "full",
        };
        TrackId::new(format!("subtitle:{codec}:{language}:{flavour}"))
    }
}
