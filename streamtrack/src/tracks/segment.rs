use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

static TEMPLATE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(RepresentationID|Number|Time|Bandwidth|SubNumber)?(?:%0(\d+)d)?\$")
        .expect("valid template regex")
});

/// Inclusive byte range, as in `Range: bytes=start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a DASH `start-end` range.
    pub fn parse(range: &str) -> Option<Self> {
        let (start, end) = range.trim().split_once('-')?;
        let start = start.trim().parse::<u64>().ok()?;
        let end = end.trim().parse::<u64>().ok()?;
        (end >= start).then_some(Self { start, end })
    }

    /// Build from an HLS `length@offset` pair.
    pub fn from_length(length: u64, offset: u64) -> Option<Self> {
        (length > 0).then(|| Self {
            start: offset,
            end: offset + length - 1,
        })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub url: String,
    pub range: Option<ByteRange>,
    /// Seconds, when the manifest states it.
    pub duration: Option<f64>,
}

impl Segment {
    pub fn new(url: impl Into<String>) -> Self {
        Segment {
            url: url.into(),
            range: None,
            duration: None,
        }
    }

    pub fn with_range(mut self, range: Option<ByteRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// How the manifest addresses a stream's media.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Addressing {
    /// One file, optionally with init/index byte ranges (`SegmentBase`).
    SingleFile { index_range: Option<ByteRange> },
    /// Explicit `SegmentURL` entries.
    List,
    /// `SegmentTemplate`, kept unexpanded next to the expanded list so a
    /// fetcher can substitute further numbers itself.
    Template {
        media: String,
        initialization: Option<String>,
        timescale: u64,
        start_number: u64,
    },
    /// HLS media playlist.
    Playlist { url: String },
}

/// Everything a downstream fetcher needs to retrieve a stream's segments
/// without re-parsing the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentLocator {
    pub addressing: Addressing,
    pub init: Option<Segment>,
    pub segments: Vec<Segment>,
}

impl SegmentLocator {
    pub fn single_file(url: impl Into<String>) -> Self {
        let url = url.into();
        SegmentLocator {
            addressing: Addressing::SingleFile { index_range: None },
            init: None,
            segments: vec![Segment::new(url)],
        }
    }

    /// Total stated duration of the listed segments.
    pub fn duration(&self) -> Option<f64> {
        self.segments
            .iter()
            .map(|segment| segment.duration)
            .sum::<Option<f64>>()
    }
}

/// Substitute DASH template identifiers.
///
/// `$Number$`/`$Time$` are left in place when no value is given, unknown
/// identifiers are kept verbatim and `$$` becomes `$`.
pub fn substitute_template(
    template: &str,
    representation_id: &str,
    bandwidth: Option<u64>,
    number: Option<u64>,
    time: Option<u64>,
) -> String {
    TEMPLATE_IDENTIFIER
        .replace_all(template, |caps: &Captures| {
            let width = caps
                .get(2)
                .and_then(|w| w.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            let value = match caps.get(1).map(|m| m.as_str()) {
                None => return "$".to_string(),
                Some("RepresentationID") => return representation_id.to_string(),
                Some("Bandwidth") => bandwidth,
                Some("Number") => number,
                Some("Time") => time,
                Some(_) => None,
            };
            match value {
                Some(value) => format!("{value:0width$}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
