//! Role, accessibility and dynamic-range resolution.
//!
//! The builder hands every candidate stream to [`classify`] through the
//! [`StreamNode`] accessor, so the rules here never look at DASH or HLS
//! syntax directly.

use tracing::debug;

use crate::drm::ProtectionDecl;
use crate::tracks::video::{is_dolby_vision_codec, DynamicRange};

/// Role values vendors use interchangeably for audio description.
const DESCRIPTIVE_ROLES: [&str; 3] = ["description", "alternative", "alternate"];

const HLS_DESCRIBES_VIDEO: &str = "public.accessibility.describes-video";
const HLS_TRANSCRIBES_DIALOG: &str = "public.accessibility.transcribes-spoken-dialog";
const HLS_DESCRIBES_SOUND: &str = "public.accessibility.describes-music-and-sound";

const SDH_PHRASES: [&str; 4] = ["caption", "hard of hearing", "hard-of-hearing", "deaf"];
const SDH_TOKENS: [&str; 3] = ["sdh", "cc", "hoh"];

const FORCED_ROLES: [&str; 3] = ["forced-subtitle", "forced_subtitle", "forced"];

/// Explicit dynamic-range signaling found on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeHint {
    Sdr,
    /// SMPTE ST 2084 transfer.
    Pq,
    Hlg,
    DolbyVision,
}

impl RangeHint {
    /// Map an ITU-T H.273 transfer characteristics code point.
    pub fn from_transfer_characteristics(value: &str) -> Option<Self> {
        match value.trim() {
            "16" => Some(Self::Pq),
            "18" => Some(Self::Hlg),
            "1" | "6" | "13" | "14" | "15" => Some(Self::Sdr),
            _ => None,
        }
    }

    /// Map an HLS `VIDEO-RANGE` value.
    pub fn from_video_range(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PQ" => Some(Self::Pq),
            "HLG" => Some(Self::Hlg),
            "SDR" => Some(Self::Sdr),
            _ => None,
        }
    }

    /// Map a free-text facet or label such as `hdr_hlg` or `Dolby Vision`.
    pub fn from_facet(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        if value.contains("hlg") {
            Some(Self::Hlg)
        } else if value.contains("dolby vision") || value.contains("dolby_vision") {
            Some(Self::DolbyVision)
        } else if value.contains("hdr") {
            Some(Self::Pq)
        } else {
            None
        }
    }
}

/// A format-agnostic view of one candidate stream.
///
/// Values are returned most-specific first: for DASH the Representation
/// before its AdaptationSet, for HLS the rendition before its group.
pub trait StreamNode {
    /// Role and accessibility values (DASH `Role`/`Accessibility`, HLS
    /// `CHARACTERISTICS` entries).
    fn role_values(&self) -> Vec<&str>;

    /// Human-readable labels (DASH `Label`, HLS `NAME`).
    fn labels(&self) -> Vec<&str>;

    /// RFC 6381 codec string.
    fn codecs(&self) -> Option<&str>;

    fn mime_type(&self) -> Option<&str>;

    fn range_hints(&self) -> Vec<RangeHint>;

    /// DRM declarations on the node and its containing group.
    fn protections(&self) -> Vec<ProtectionDecl>;

    /// Explicit forced flag (HLS `FORCED=YES`).
    fn forced_flag(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_descriptive: bool,
    pub is_forced: bool,
    pub is_sdh: bool,
    pub range: DynamicRange,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            is_descriptive: false,
            is_forced: false,
            is_sdh: false,
            range: DynamicRange::Sdr,
        }
    }
}

/// Resolve role flags and dynamic range for a node.
///
/// Unrecognized role text never fails; it leaves every flag false.
pub fn classify(node: &dyn StreamNode) -> Classification {
    let roles: Vec<String> = node
        .role_values()
        .into_iter()
        .map(|role| role.trim().to_ascii_lowercase())
        .collect();
    let labels: Vec<String> = node
        .labels()
        .into_iter()
        .map(|label| label.trim().to_ascii_lowercase())
        .collect();

    let is_descriptive = roles
        .iter()
        .any(|role| DESCRIPTIVE_ROLES.contains(&role.as_str()) || role == HLS_DESCRIBES_VIDEO);

    let is_sdh = roles
        .iter()
        .chain(labels.iter())
        .any(|text| has_sdh_marker(text));

    let is_forced = node.forced_flag()
        || roles.iter().any(|role| FORCED_ROLES.contains(&role.as_str()))
        || labels.iter().any(|label| label.contains("forced"));

    let range = resolve_range(node, &labels);

    let classification = Classification {
        is_descriptive,
        is_forced,
        is_sdh,
        range,
    };
    if classification != Classification::default() {
        debug!(
            roles = ?roles,
            labels = ?labels,
            "Classified node as {:?}",
            classification
        );
    }
    classification
}

fn has_sdh_marker(text: &str) -> bool {
    if text == HLS_TRANSCRIBES_DIALOG || text == HLS_DESCRIBES_SOUND {
        return true;
    }
    if SDH_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return true;
    }
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| SDH_TOKENS.contains(&token))
}

/// Explicit HDR signaling first, then label facets, then what the codec
/// implies. Dolby Vision codecs upgrade a PQ hint.
fn resolve_range(node: &dyn StreamNode, labels: &[String]) -> DynamicRange {
    let dolby_vision_codec = node.codecs().is_some_and(is_dolby_vision_codec);

    let hint = node
        .range_hints()
        .into_iter()
        .next()
        .or_else(|| labels.iter().find_map(|label| RangeHint::from_facet(label)));

    match hint {
        Some(RangeHint::Pq) if dolby_vision_codec => DynamicRange::DolbyVision,
        Some(RangeHint::Pq) => DynamicRange::Hdr10,
        Some(RangeHint::Hlg) => DynamicRange::Hlg,
        Some(RangeHint::DolbyVision) => DynamicRange::DolbyVision,
        Some(RangeHint::Sdr) | None if dolby_vision_codec => DynamicRange::DolbyVision,
        Some(RangeHint::Sdr) | None => DynamicRange::Sdr,
    }
}
