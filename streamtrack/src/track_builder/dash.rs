use tracing::{debug, warn};
use url::Url;

use super::{finish, MediaKind};
use crate::classify::{classify, RangeHint, StreamNode};
use crate::drm::{extract_drm, ProtectionDecl};
use crate::error::{Error, Result};
use crate::language::Language;
use crate::manifest::dash::{
    AdaptationSet, BaseURL, Dash, Descriptor, Initialization, Period, Representation,
    SegmentBase, SegmentList, SegmentTemplate,
};
use crate::manifest::{resolve_uri, StreamingManifest};
use crate::tracks::audio::{parse_channels, AudioCodec, AudioTrack};
use crate::tracks::segment::{substitute_template, Addressing, ByteRange, Segment, SegmentLocator};
use crate::tracks::subtitle::{SubtitleCodec, SubtitleTrack};
use crate::tracks::video::{VideoCodec, VideoTrack};
use crate::tracks::{Origin, Track, TrackSet, TrackSource};
use crate::utils::time::{parse_frame_rate, parse_iso_duration};

const TRANSFER_CHARACTERISTICS_SCHEME: &str = "urn:mpeg:mpegB:cicp:TransferCharacteristics";

/// Upper bound on segments expanded for one representation.
const MAX_EXPANDED_SEGMENTS: usize = 100_000;

/// Walk Period → AdaptationSet → Representation in document order.
pub fn build(dash: &Dash, default_language: &Language) -> Result<TrackSet> {
    let mpd = &dash.mpd;
    let presentation_duration = dash.duration_secs();
    let mpd_base = join_base(dash.url.as_ref(), &mpd.base_urls)?;

    let mut tracks = TrackSet::new();
    let mut next_period_start = 0.0;

    for (period_index, period) in mpd.periods.iter().enumerate() {
        let start = match &period.start {
            Some(start) => parse_iso_duration(start)?,
            None => next_period_start,
        };
        let duration = period_duration(period, start, presentation_duration)?;
        next_period_start = start + duration.unwrap_or_default();

        let period_base = join_base(mpd_base.as_ref(), &period.base_urls)?;
        let context = PeriodContext {
            index: period_index,
            period,
            base: period_base.as_ref(),
            duration,
        };

        for adaptation_set in &period.adaptation_sets {
            build_adaptation_set(&context, adaptation_set, default_language, &mut tracks)?;
        }
    }

    finish(tracks)
}

struct PeriodContext<'a> {
    index: usize,
    period: &'a Period,
    base: Option<&'a Url>,
    /// Seconds of this period inside the (possibly trimmed) presentation.
    duration: Option<f64>,
}

/// The period's own duration, cut to what remains of the presentation.
fn period_duration(period: &Period, start: f64, presentation: Option<f64>) -> Result<Option<f64>> {
    let remaining = presentation.map(|total| (total - start).max(0.0));
    let declared = period
        .duration
        .as_deref()
        .map(parse_iso_duration)
        .transpose()?;

    Ok(match (declared, remaining) {
        (Some(declared), Some(remaining)) => Some(declared.min(remaining)),
        (declared, remaining) => declared.or(remaining),
    })
}

fn build_adaptation_set(
    context: &PeriodContext<'_>,
    adaptation_set: &AdaptationSet,
    default_language: &Language,
    tracks: &mut TrackSet,
) -> Result<()> {
    let set_base = join_base(context.base, &adaptation_set.base_urls)?;
    let shell = AdaptationSet {
        representations: Vec::new(),
        ..adaptation_set.clone()
    };

    for representation in &adaptation_set.representations {
        let node = DashNode {
            adaptation_set,
            representation,
        };
        let Some(kind) = node.media_kind() else {
            debug!(
                "Skipping representation {:?}: cannot tell its media kind",
                representation.id
            );
            continue;
        };
        if kind == MediaKind::Image {
            continue;
        }

        let base = join_base(set_base.as_ref(), &representation.base_urls)?.ok_or_else(|| {
            Error::malformed(format!(
                "representation {:?} has no base URL to resolve against",
                representation.id
            ))
        })?;
        let source = TrackSource {
            url: base.to_string(),
            segments: segment_locator(context, adaptation_set, representation, &base)?,
            drm: extract_drm(&node),
            origin: Origin::Dash {
                period_index: context.index,
                period_id: context.period.id.clone(),
                adaptation_set: Box::new(shell.clone()),
                representation: Box::new(representation.clone()),
            },
        };
        let language = Language::resolve(
            [representation.lang.as_deref(), adaptation_set.lang.as_deref()],
            default_language,
        );

        let track = match kind {
            MediaKind::Video => parse_video_representation(&node, language, source),
            MediaKind::Audio => parse_audio_representation(&node, language, source),
            MediaKind::Text => parse_text_representation(&node, language, source),
            MediaKind::Image => None,
        };
        match track {
            Some(track) => {
                tracks.add(track);
            }
            None => warn!(
                "Skipping {:?} representation {:?}: unrecognized codec {:?}",
                kind,
                representation.id,
                node.codecs().or(node.mime_type())
            ),
        }
    }

    Ok(())
}

fn parse_video_representation(
    node: &DashNode<'_>,
    language: Language,
    source: TrackSource,
) -> Option<Track> {
    let codec = node
        .codecs()
        .and_then(VideoCodec::from_codecs)
        .or_else(|| node.mime_type().and_then(VideoCodec::from_mime))?;
    let range = classify(node).range;

    let representation = node.representation;
    let adaptation_set = node.adaptation_set;
    let width = representation.width.or(adaptation_set.width);
    let height = representation.height.or(adaptation_set.height);
    let bitrate = representation.bandwidth;

    Some(Track::Video(VideoTrack {
        id: VideoTrack::stable_id(codec, range, &language, width, height, bitrate),
        language,
        codec,
        range,
        width,
        height,
        frame_rate: representation
            .frame_rate
            .as_deref()
            .or(adaptation_set.frame_rate.as_deref())
            .and_then(parse_frame_rate),
        bitrate,
        embedded_audio: None,
        source,
    }))
}

fn parse_audio_representation(
    node: &DashNode<'_>,
    language: Language,
    source: TrackSource,
) -> Option<Track> {
    let codec = node
        .codecs()
        .and_then(AudioCodec::from_codecs)
        .or_else(|| node.mime_type().and_then(AudioCodec::from_mime))?;
    let is_descriptive = classify(node).is_descriptive;

    let representation = node.representation;
    let adaptation_set = node.adaptation_set;
    let channels = representation
        .audio_channel_configurations
        .iter()
        .chain(&adaptation_set.audio_channel_configurations)
        .find_map(|config| config.value.as_deref().and_then(parse_channels));
    let sampling_rate = representation
        .audio_sampling_rate
        .as_deref()
        .or(adaptation_set.audio_sampling_rate.as_deref())
        .and_then(|rate| rate.split_whitespace().next())
        .and_then(|rate| rate.parse::<u32>().ok());
    let bitrate = representation.bandwidth;

    Some(Track::Audio(AudioTrack {
        id: AudioTrack::stable_id(codec, &language, channels.as_deref(), bitrate, is_descriptive),
        language,
        codec,
        channels,
        bitrate,
        sampling_rate,
        is_descriptive,
        source,
    }))
}

fn parse_text_representation(
    node: &DashNode<'_>,
    language: Language,
    source: TrackSource,
) -> Option<Track> {
    let codec = node
        .codecs()
        .and_then(SubtitleCodec::from_codecs)
        .or_else(|| node.mime_type().and_then(SubtitleCodec::from_mime))?;
    let classification = classify(node);

    Some(Track::Subtitle(SubtitleTrack {
        id: SubtitleTrack::stable_id(
            codec,
            &language,
            classification.is_forced,
            classification.is_sdh,
        ),
        language,
        codec,
        is_forced: classification.is_forced,
        is_sdh: classification.is_sdh,
        source,
    }))
}

/// Resolve the first non-empty `BaseURL` against `parent`.
fn join_base(parent: Option<&Url>, base_urls: &[BaseURL]) -> Result<Option<Url>> {
    match base_urls
        .iter()
        .map(|base_url| base_url.value.trim())
        .find(|value| !value.is_empty())
    {
        Some(value) => {
            let url = resolve_uri(parent, value)?;
            debug!("Resolved BaseURL {} -> {}", value, url);
            Ok(Some(url))
        }
        None => Ok(parent.cloned()),
    }
}

/// Representation before AdaptationSet before Period.
fn segment_locator(
    context: &PeriodContext<'_>,
    adaptation_set: &AdaptationSet,
    representation: &Representation,
    base: &Url,
) -> Result<SegmentLocator> {
    let template = [
        representation.segment_template.as_ref(),
        adaptation_set.segment_template.as_ref(),
        context.period.segment_template.as_ref(),
    ]
    .into_iter()
    .flatten()
    .fold(None::<SegmentTemplate>, |merged, template| match merged {
        Some(merged) => Some(merged.inherit(template)),
        None => Some(template.clone()),
    });
    if let Some(template) = template {
        return expand_template(&template, representation, base, context.duration);
    }

    if let Some(list) = representation
        .segment_list
        .as_ref()
        .or(adaptation_set.segment_list.as_ref())
    {
        return expand_list(list, base, context.duration);
    }

    let segment_base = representation
        .segment_base
        .as_ref()
        .or(adaptation_set.segment_base.as_ref());
    single_file(segment_base, base)
}

fn single_file(segment_base: Option<&SegmentBase>, base: &Url) -> Result<SegmentLocator> {
    let mut locator = SegmentLocator::single_file(base.as_str());
    if let Some(segment_base) = segment_base {
        locator.addressing = Addressing::SingleFile {
            index_range: segment_base.index_range.as_deref().and_then(ByteRange::parse),
        };
        locator.init = segment_base
            .initialization
            .as_ref()
            .map(|init| init_segment(init, base))
            .transpose()?;
    }
    Ok(locator)
}

fn init_segment(init: &Initialization, base: &Url) -> Result<Segment> {
    let url = match &init.source_url {
        Some(source_url) => resolve_uri(Some(base), source_url)?,
        None => base.clone(),
    };
    Ok(Segment::new(url).with_range(init.range.as_deref().and_then(ByteRange::parse)))
}

fn expand_list(
    list: &SegmentList,
    base: &Url,
    period_duration: Option<f64>,
) -> Result<SegmentLocator> {
    let timescale = list.timescale.unwrap_or(1).max(1) as f64;
    let segment_duration = list.duration.map(|duration| duration as f64 / timescale);

    let mut segments = Vec::with_capacity(list.segment_urls.len());
    let mut start = 0.0;
    for segment_url in &list.segment_urls {
        if period_duration.is_some_and(|duration| start >= duration) {
            break;
        }
        let url = match &segment_url.media {
            Some(media) => resolve_uri(Some(base), media)?,
            None => base.clone(),
        };
        let range = segment_url.media_range.as_deref().and_then(ByteRange::parse);
        let mut segment = Segment::new(url).with_range(range);
        if let Some(duration) = segment_duration {
            segment = segment.with_duration(duration);
            start += duration;
        }
        segments.push(segment);
    }

    Ok(SegmentLocator {
        addressing: Addressing::List,
        init: list
            .initialization
            .as_ref()
            .map(|init| init_segment(init, base))
            .transpose()?,
        segments,
    })
}

/// Expand a template into explicit segments, bounded by the period.
fn expand_template(
    template: &SegmentTemplate,
    representation: &Representation,
    base: &Url,
    period_duration: Option<f64>,
) -> Result<SegmentLocator> {
    let representation_id = representation.id.as_deref().unwrap_or_default();
    let bandwidth = representation.bandwidth;
    let media = template
        .media
        .as_deref()
        .ok_or_else(|| Error::malformed("SegmentTemplate has no @media"))?;
    let timescale = template.timescale.unwrap_or(1).max(1);
    let start_number = template.start_number.unwrap_or(1);

    let init = template
        .initialization
        .as_deref()
        .map(|initialization| {
            let path =
                substitute_template(initialization, representation_id, bandwidth, None, None);
            resolve_uri(Some(base), &path).map(Segment::new)
        })
        .transpose()?;

    let offset = template.presentation_time_offset.unwrap_or_default();
    let mut segments = Vec::new();
    let mut push = |number: u64, time: u64, duration: u64| -> Result<()> {
        let path =
            substitute_template(media, representation_id, bandwidth, Some(number), Some(time));
        let url = resolve_uri(Some(base), &path)?;
        segments.push(Segment::new(url).with_duration(duration as f64 / timescale as f64));
        Ok(())
    };

    if let Some(timeline) = &template.segment_timeline {
        let end = period_duration.map(|duration| offset as f64 + duration * timescale as f64);
        let mut number = start_number;
        let mut time = offset;
        let mut count = 0usize;

        'timeline: for (index, entry) in timeline.entries.iter().enumerate() {
            if let Some(t) = entry.t {
                time = t;
            }
            if entry.d == 0 {
                continue;
            }
            // A negative repeat runs until the next entry's start or the period end.
            let repeats = match entry.r.unwrap_or(0) {
                r if r >= 0 => r as u64,
                _ => {
                    let until = timeline
                        .entries
                        .get(index + 1)
                        .and_then(|next| next.t)
                        .map(|t| t as f64)
                        .or(end);
                    match until {
                        Some(until) => {
                            (((until - time as f64) / entry.d as f64).ceil().max(1.0) as u64) - 1
                        }
                        None => 0,
                    }
                }
            };

            for _ in 0..=repeats {
                if end.is_some_and(|end| time as f64 >= end) || count >= MAX_EXPANDED_SEGMENTS {
                    break 'timeline;
                }
                push(number, time, entry.d)?;
                count += 1;

                let (Some(next_number), Some(next_time)) =
                    (number.checked_add(1), time.checked_add(entry.d))
                else {
                    warn!(
                        "Segment timeline for {:?} overflows at time {}; stopping expansion",
                        representation.id, time
                    );
                    break 'timeline;
                };
                number = next_number;
                time = next_time;
            }
        }
    } else if let Some(duration) = template.duration.filter(|duration| *duration > 0) {
        let segment_secs = duration as f64 / timescale as f64;
        let by_duration =
            period_duration.map(|total| (total / segment_secs - 1e-9).ceil().max(0.0) as u64);
        let by_end_number = template
            .end_number
            .map(|end| end.saturating_sub(start_number).saturating_add(1));
        let count = match (by_duration, by_end_number) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match count {
            Some(count) => {
                let count = count.min(MAX_EXPANDED_SEGMENTS as u64);
                for index in 0..count {
                    let number = start_number.checked_add(index);
                    let time = index
                        .checked_mul(duration)
                        .and_then(|time| time.checked_add(offset));
                    let (Some(number), Some(time)) = (number, time) else {
                        warn!(
                            "Segment numbering for {:?} overflows after {} segments",
                            representation.id, index
                        );
                        break;
                    };
                    push(number, time, duration)?;
                }
            }
            None => debug!(
                "Template for {:?} has no bounding duration; leaving it unexpanded",
                representation.id
            ),
        }
    }

    if segments.len() >= MAX_EXPANDED_SEGMENTS {
        warn!(
            "Segment expansion for {:?} stopped at {} segments",
            representation.id, MAX_EXPANDED_SEGMENTS
        );
    }

    Ok(SegmentLocator {
        addressing: Addressing::Template {
            media: media.to_string(),
            initialization: template.initialization.clone(),
            timescale,
            start_number,
        },
        init,
        segments,
    })
}

/// A Representation seen together with its AdaptationSet.
struct DashNode<'a> {
    adaptation_set: &'a AdaptationSet,
    representation: &'a Representation,
}

impl DashNode<'_> {
    fn media_kind(&self) -> Option<MediaKind> {
        if let Some(kind) = self
            .adaptation_set
            .content_type
            .as_deref()
            .and_then(MediaKind::from_content_type)
        {
            return Some(kind);
        }
        if let Some(kind) = self.mime_type().and_then(MediaKind::from_mime) {
            return Some(kind);
        }

        let codecs = self.codecs()?;
        if VideoCodec::from_codecs(codecs).is_some() {
            Some(MediaKind::Video)
        } else if AudioCodec::from_codecs(codecs).is_some() {
            Some(MediaKind::Audio)
        } else if SubtitleCodec::from_codecs(codecs).is_some() {
            Some(MediaKind::Text)
        } else {
            None
        }
    }
}

/// Node-level descriptors followed by the group's.
fn descriptors<'a>(
    own: &'a [Descriptor],
    group: &'a [Descriptor],
) -> impl Iterator<Item = &'a Descriptor> {
    own.iter().chain(group)
}

impl StreamNode for DashNode<'_> {
    fn role_values(&self) -> Vec<&str> {
        let representation = self.representation;
        let adaptation_set = self.adaptation_set;
        descriptors(&representation.roles, &adaptation_set.roles)
            .chain(descriptors(
                &representation.accessibility,
                &adaptation_set.accessibility,
            ))
            .filter_map(|descriptor| descriptor.value.as_deref())
            .collect()
    }

    fn labels(&self) -> Vec<&str> {
        self.representation
            .labels
            .iter()
            .chain(&self.adaptation_set.labels)
            .filter_map(|label| label.value.as_deref())
            .collect()
    }

    fn codecs(&self) -> Option<&str> {
        self.representation
            .codecs
            .as_deref()
            .or(self.adaptation_set.codecs.as_deref())
    }

    fn mime_type(&self) -> Option<&str> {
        self.representation
            .mime_type
            .as_deref()
            .or(self.adaptation_set.mime_type.as_deref())
    }

    fn range_hints(&self) -> Vec<RangeHint> {
        let representation = self.representation;
        let adaptation_set = self.adaptation_set;
        descriptors(
            &representation.essential_properties,
            &adaptation_set.essential_properties,
        )
        .chain(descriptors(
            &representation.supplemental_properties,
            &adaptation_set.supplemental_properties,
        ))
        .filter(|descriptor| {
            descriptor
                .scheme_id_uri
                .as_deref()
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case(TRANSFER_CHARACTERISTICS_SCHEME))
        })
        .filter_map(|descriptor| {
            descriptor
                .value
                .as_deref()
                .and_then(RangeHint::from_transfer_characteristics)
        })
        .collect()
    }

    fn protections(&self) -> Vec<ProtectionDecl> {
        self.representation
            .content_protections
            .iter()
            .chain(&self.adaptation_set.content_protections)
            .map(|protection| ProtectionDecl {
                scheme: protection.scheme_id_uri.clone(),
                license_url: protection.license_url(),
                pssh: protection.pssh(),
                default_kid: protection.default_kid.clone(),
            })
            .collect()
    }
}
