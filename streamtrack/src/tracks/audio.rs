use std::fmt;

use serde::Serialize;

use super::{TrackId, TrackSource};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AudioCodec {
    Aac,
    Ac3,
    Ec3,
    Ac4,
    Opus,
    Flac,
    Dts,
    Mp3,
}

impl AudioCodec {
    /// Identify a single RFC 6381 codec entry, e.g. `mp4a.40.2` or `ec-3`.
    pub fn from_codec(codec: &str) -> Option<Self> {
        let codec = codec.trim().to_ascii_lowercase();
        let mut parts = codec.split('.');
        let fourcc = parts.next()?;
        match fourcc {
            "mp4a" => match parts.next() {
                Some("a5") => Some(Self::Ac3),
                Some("a6") => Some(Self::Ec3),
                Some("40") => match parts.next() {
                    Some("34") => Some(Self::Mp3),
                    _ => Some(Self::Aac),
                },
                Some("69") | Some("6b") => Some(Self::Mp3),
                _ => Some(Self::Aac),
            },
            "ac-3" | "ac3" => Some(Self::Ac3),
            "ec-3" | "ec3" | "eac3" => Some(Self::Ec3),
            "ac-4" | "ac4" => Some(Self::Ac4),
            "opus" => Some(Self::Opus),
            "flac" | "fla" => Some(Self::Flac),
            "dtsc" | "dtse" | "dtsh" | "dtsl" | "dtsx" => Some(Self::Dts),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    /// The first audio codec in a comma-separated `codecs` list.
    pub fn from_codecs(codecs: &str) -> Option<Self> {
        codecs.split(',').find_map(Self::from_codec)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "audio/aac" | "audio/mp4a-latm" => Some(Self::Aac),
            "audio/ac3" => Some(Self::Ac3),
            "audio/eac3" => Some(Self::Ec3),
            "audio/opus" => Some(Self::Opus),
            "audio/flac" => Some(Self::Flac),
            "audio/mpeg" => Some(Self::Mp3),
            _ => None,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aac => "AAC",
            Self::Ac3 => "DD",
            Self::Ec3 => "DD+",
            Self::Ac4 => "AC-4",
            Self::Opus => "OPUS",
            Self::Flac => "FLAC",
            Self::Dts => "DTS",
            Self::Mp3 => "MP3",
        };
        f.write_str(name)
    }
}

/// Normalize a channel count or channel configuration to a layout string.
///
/// Accepts MPEG decimal counts (`2`, `6`), Dolby hex masks (`F801`) and
/// HLS `CHANNELS` values (`16/JOC`).
pub fn parse_channels(value: &str) -> Option<String> {
    let value = value.trim();
    let head = value.split('/').next().unwrap_or(value).trim();

    let layout = match head.to_ascii_uppercase().as_str() {
        "A000" => "2.0",
        "F801" => "5.1",
        "FA01" => "7.1",
        _ => match head.parse::<u32>().ok()? {
            1 => "1.0",
            2 => "2.0",
            3 => "2.1",
            6 => "5.1",
            8 => "7.1",
            // Object-based (JOC) counts are carried in a 5.1 bed
            n if n > 8 => "5.1",
            n => return Some(format!("{n}.0")),
        },
    };
    Some(layout.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioTrack {
    pub id: TrackId,
    pub language: Language,

    pub codec: AudioCodec,
    pub channels: Option<String>,
    pub bitrate: Option<u64>,
    pub sampling_rate: Option<u32>,

    /// Audio description for the visually impaired.
    pub is_descriptive: bool,

    pub source: TrackSource,
}

impl AudioTrack {
    pub fn stable_id(
        codec: AudioCodec,
        language: &Language,
        channels: Option<&str>,
        bitrate: Option<u64>,
        is_descriptive: bool,
    ) -> TrackId {
        let role = if is_descriptive { ":ad" } else { "" };
        TrackId::new(format!(
            "audio:{codec}:{language}:{}:{}bps{role}",
            channels.unwrap_or("?"),
            bitrate.unwrap_or_default()
        ))
    }
}
