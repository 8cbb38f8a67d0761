use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{ParseContext, StreamingManifest};
use crate::error::{Error, Result};
use crate::language::Language;
use crate::track_builder;
use crate::tracks::TrackSet;
use crate::utils::time::{format_iso_duration, parse_iso_duration};

/// A parsed MPEG-DASH manifest.
#[derive(Debug, Clone)]
pub struct Dash {
    pub url: Option<Url>,
    pub mpd: MPD,
    trimmed: bool,
}

impl Dash {
    pub fn parse(content: &str, url: Option<Url>) -> Result<Self> {
        let content = content.trim_start_matches('\u{feff}');
        check_root(content)?;

        let mpd = match from_str::<MPD>(content) {
            Ok(mpd) => mpd,
            Err(e) => return Err(Error::malformed(format!("failed to parse MPD: {e}"))),
        };

        if let Some(duration) = &mpd.media_presentation_duration {
            parse_iso_duration(duration)?;
        }

        info!(
            "Parsed MPD with {} period(s), duration {}",
            mpd.periods.len(),
            mpd.media_presentation_duration.as_deref().unwrap_or("unknown")
        );
        Ok(Dash {
            url,
            mpd,
            trimmed: false,
        })
    }
}

impl StreamingManifest for Dash {
    fn from_text(body: &str, url: Option<Url>, _ctx: &ParseContext<'_>) -> Result<Self> {
        Self::parse(body, url)
    }

    /// `mediaPresentationDuration`, or the sum of the Period durations when
    /// the root does not state one.
    fn duration_secs(&self) -> Option<f64> {
        if let Some(duration) = &self.mpd.media_presentation_duration {
            return parse_iso_duration(duration).ok();
        }
        self.mpd
            .periods
            .iter()
            .map(|period| {
                period
                    .duration
                    .as_deref()
                    .and_then(|duration| parse_iso_duration(duration).ok())
            })
            .sum::<Option<f64>>()
            .filter(|total| *total > 0.0)
    }

    fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    fn apply_trim(&mut self, duration_secs: f64) {
        let duration = format_iso_duration(duration_secs);
        debug!(
            "Rewriting mediaPresentationDuration {:?} -> {}",
            self.mpd.media_presentation_duration, duration
        );
        self.mpd.media_presentation_duration = Some(duration);
        self.trimmed = true;
    }

    fn to_tracks(&self, language: &Language) -> Result<TrackSet> {
        track_builder::dash::build(self, language)
    }
}

/// The serde path accepts any root element, so check it is an MPD first.
fn check_root(content: &str) -> Result<()> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                return if name.as_ref() == b"MPD" {
                    Ok(())
                } else {
                    Err(Error::malformed(format!(
                        "unexpected root element <{}>",
                        String::from_utf8_lossy(name.as_ref())
                    )))
                };
            }
            Ok(Event::Eof) => return Err(Error::malformed("document has no root element")),
            Ok(Event::Text(text)) if !text.iter().all(u8::is_ascii_whitespace) => {
                return Err(Error::malformed("text before the root element"));
            }
            Ok(_) => {}
            Err(e) => return Err(Error::malformed(format!("invalid XML: {e}"))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MPD {
    #[serde(rename = "@type", default)]
    pub presentation_type: Option<String>,
    #[serde(rename = "@mediaPresentationDuration", default)]
    pub media_presentation_duration: Option<String>,

    #[serde(rename = "BaseURL", default)]
    pub base_urls: Vec<BaseURL>,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Period {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(rename = "@start", default)]
    pub start: Option<String>,
    #[serde(rename = "@duration", default)]
    pub duration: Option<String>,

    #[serde(rename = "BaseURL", default)]
    pub base_urls: Vec<BaseURL>,
    #[serde(rename = "SegmentTemplate", default)]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "AdaptationSet", default)]
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdaptationSet {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(rename = "@contentType", default)]
    pub content_type: Option<String>,
    #[serde(rename = "@mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "@codecs", default)]
    pub codecs: Option<String>,
    #[serde(rename = "@lang", default)]
    pub lang: Option<String>,

    #[serde(rename = "@width", default)]
    pub width: Option<u32>,
    #[serde(rename = "@height", default)]
    pub height: Option<u32>,
    #[serde(rename = "@maxWidth", default)]
    pub max_width: Option<u32>,
    #[serde(rename = "@maxHeight", default)]
    pub max_height: Option<u32>,
    #[serde(rename = "@frameRate", default)]
    pub frame_rate: Option<String>,
    #[serde(rename = "@audioSamplingRate", default)]
    pub audio_sampling_rate: Option<String>,

    #[serde(rename = "Role", default)]
    pub roles: Vec<Descriptor>,
    #[serde(rename = "Accessibility", default)]
    pub accessibility: Vec<Descriptor>,
    #[serde(rename = "Label", default)]
    pub labels: Vec<Label>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_properties: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_properties: Vec<Descriptor>,
    #[serde(rename = "AudioChannelConfiguration", default)]
    pub audio_channel_configurations: Vec<Descriptor>,
    #[serde(rename = "ContentProtection", default)]
    pub content_protections: Vec<ContentProtection>,

    #[serde(rename = "BaseURL", default)]
    pub base_urls: Vec<BaseURL>,
    #[serde(rename = "SegmentTemplate", default)]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "SegmentList", default)]
    pub segment_list: Option<SegmentList>,
    #[serde(rename = "SegmentBase", default)]
    pub segment_base: Option<SegmentBase>,

    #[serde(rename = "Representation", default)]
    pub representations: Vec<Representation>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Representation {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(rename = "@bandwidth", default)]
    pub bandwidth: Option<u64>,
    #[serde(rename = "@mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "@codecs", default)]
    pub codecs: Option<String>,
    #[serde(rename = "@lang", default)]
    pub lang: Option<String>,

    #[serde(rename = "@width", default)]
    pub width: Option<u32>,
    #[serde(rename = "@height", default)]
    pub height: Option<u32>,
    #[serde(rename = "@frameRate", default)]
    pub frame_rate: Option<String>,
    #[serde(rename = "@audioSamplingRate", default)]
    pub audio_sampling_rate: Option<String>,

    #[serde(rename = "Role", default)]
    pub roles: Vec<Descriptor>,
    #[serde(rename = "Accessibility", default)]
    pub accessibility: Vec<Descriptor>,
    #[serde(rename = "Label", default)]
    pub labels: Vec<Label>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_properties: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_properties: Vec<Descriptor>,
    #[serde(rename = "AudioChannelConfiguration", default)]
    pub audio_channel_configurations: Vec<Descriptor>,
    #[serde(rename = "ContentProtection", default)]
    pub content_protections: Vec<ContentProtection>,

    #[serde(rename = "BaseURL", default)]
    pub base_urls: Vec<BaseURL>,
    #[serde(rename = "SegmentTemplate", default)]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "SegmentList", default)]
    pub segment_list: Option<SegmentList>,
    #[serde(rename = "SegmentBase", default)]
    pub segment_base: Option<SegmentBase>,
}

/// `Role`, `Accessibility`, `EssentialProperty` and friends.
#[derive(Debug, Deserialize, Clone)]
pub struct Descriptor {
    #[serde(rename = "@schemeIdUri", default)]
    pub scheme_id_uri: Option<String>,
    #[serde(rename = "@value", default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Label {
    #[serde(rename = "$text", default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BaseURL {
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentProtection {
    #[serde(rename = "@schemeIdUri", default)]
    pub scheme_id_uri: String,
    #[serde(rename = "@value", default)]
    pub value: Option<String>,
    #[serde(rename = "@default_KID", alias = "@cenc:default_KID", default)]
    pub default_kid: Option<String>,
    #[serde(
        rename = "@licenseAcquisitionUrl",
        alias = "@bc:licenseAcquisitionUrl",
        default
    )]
    pub license_acquisition_url: Option<String>,

    #[serde(rename = "pssh", alias = "cenc:pssh", default)]
    pub pssh: Vec<TextValue>,
    #[serde(
        rename = "Laurl",
        alias = "dashif:Laurl",
        alias = "clearkey:Laurl",
        default
    )]
    pub dashif_laurl: Vec<LicenseUrl>,
    #[serde(rename = "laurl", alias = "ms:laurl", alias = "dashif:laurl", default)]
    pub ms_laurl: Vec<LicenseUrl>,
}

impl ContentProtection {
    /// The first license URL the declaration carries, in any dialect.
    pub fn license_url(&self) -> Option<String> {
        self.dashif_laurl
            .iter()
            .chain(&self.ms_laurl)
            .find_map(LicenseUrl::url)
            .or_else(|| {
                self.license_acquisition_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
            })
    }

    pub fn pssh(&self) -> Option<String> {
        self.pssh
            .iter()
            .filter_map(|pssh| pssh.value.as_deref())
            .map(str::trim)
            .find(|pssh| !pssh.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TextValue {
    #[serde(rename = "$text", default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LicenseUrl {
    #[serde(rename = "@licenseUrl", default)]
    pub license_url: Option<String>,
    #[serde(rename = "$text", default)]
    pub value: Option<String>,
}

impl LicenseUrl {
    fn url(&self) -> Option<String> {
        self.license_url
            .as_deref()
            .or(self.value.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SegmentTemplate {
    #[serde(rename = "@media", default)]
    pub media: Option<String>,
    #[serde(rename = "@initialization", default)]
    pub initialization: Option<String>,
    #[serde(rename = "@timescale", default)]
    pub timescale: Option<u64>,
    #[serde(rename = "@duration", default)]
    pub duration: Option<u64>,
    #[serde(rename = "@startNumber", default)]
    pub start_number: Option<u64>,
    #[serde(rename = "@endNumber", default)]
    pub end_number: Option<u64>,
    #[serde(rename = "@presentationTimeOffset", default)]
    pub presentation_time_offset: Option<u64>,

    #[serde(rename = "SegmentTimeline", default)]
    pub segment_timeline: Option<SegmentTimeline>,
}

impl SegmentTemplate {
    /// Fill unset attributes from an enclosing level's template.
    pub fn inherit(&self, parent: &SegmentTemplate) -> SegmentTemplate {
        SegmentTemplate {
            media: self.media.clone().or_else(|| parent.media.clone()),
            initialization: self
                .initialization
                .clone()
                .or_else(|| parent.initialization.clone()),
            timescale: self.timescale.or(parent.timescale),
            duration: self.duration.or(parent.duration),
            start_number: self.start_number.or(parent.start_number),
            end_number: self.end_number.or(parent.end_number),
            presentation_time_offset: self
                .presentation_time_offset
                .or(parent.presentation_time_offset),
            segment_timeline: self
                .segment_timeline
                .clone()
                .or_else(|| parent.segment_timeline.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentTimeline {
    #[serde(rename = "S", default)]
    pub entries: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimelineEntry {
    #[serde(rename = "@t", default)]
    pub t: Option<u64>,
    #[serde(rename = "@d")]
    pub d: u64,
    #[serde(rename = "@r", default)]
    pub r: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentList {
    #[serde(rename = "@timescale", default)]
    pub timescale: Option<u64>,
    #[serde(rename = "@duration", default)]
    pub duration: Option<u64>,

    #[serde(rename = "Initialization", default)]
    pub initialization: Option<Initialization>,
    #[serde(rename = "SegmentURL", default)]
    pub segment_urls: Vec<SegmentURL>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentURL {
    #[serde(rename = "@media", default)]
    pub media: Option<String>,
    #[serde(rename = "@mediaRange", default)]
    pub media_range: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentBase {
    #[serde(rename = "@indexRange", default)]
    pub index_range: Option<String>,

    #[serde(rename = "Initialization", default)]
    pub initialization: Option<Initialization>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Initialization {
    #[serde(rename = "@sourceURL", default)]
    pub source_url: Option<String>,
    #[serde(rename = "@range", default)]
    pub range: Option<String>,
}
