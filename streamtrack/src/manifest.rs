pub mod dash;
pub mod hls;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::drm::KeySystem;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::networking::Fetch;
use crate::repair;
use crate::tracks::TrackSet;

pub use dash::Dash;
pub use hls::Hls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Dash,
    Hls,
}

impl ManifestKind {
    /// Guess the format from the document itself.
    pub fn detect(body: &str) -> Option<Self> {
        let body = body.trim_start_matches('\u{feff}').trim_start();
        if body.starts_with("#EXTM3U") {
            Some(Self::Hls)
        } else if body.starts_with('<') && body.contains("<MPD") {
            Some(Self::Dash)
        } else {
            None
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dash => f.write_str("dash"),
            Self::Hls => f.write_str("hls"),
        }
    }
}

impl FromStr for ManifestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dash" | "mpd" => Ok(Self::Dash),
            "hls" | "m3u8" => Ok(Self::Hls),
            other => Err(Error::Config(format!("unknown manifest kind {other:?}"))),
        }
    }
}

/// Where a manifest comes from.
#[derive(Debug, Clone)]
pub enum ManifestSource {
    Url(Url),
    /// Already-fetched text. `url` is the address it was served from, used
    /// to resolve relative references.
    Text { body: String, url: Option<Url> },
}

/// Inputs shared by every parse.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub fetcher: &'a dyn Fetch,
    /// Key system the caller can license; HLS entries for others are dropped.
    pub key_system: KeySystem,
}

impl<'a> ParseContext<'a> {
    pub fn new(fetcher: &'a dyn Fetch, key_system: KeySystem) -> Self {
        Self {
            fetcher,
            key_system,
        }
    }
}

/// The interface both manifest formats implement.
pub trait StreamingManifest: Sized {
    /// Parse already-fetched text. Sub-resources are fetched through
    /// `ctx.fetcher` before this returns.
    fn from_text(body: &str, url: Option<Url>, ctx: &ParseContext<'_>) -> Result<Self>;

    fn from_url(url: &Url, ctx: &ParseContext<'_>) -> Result<Self> {
        let body = ctx.fetcher.fetch_text(url)?;
        Self::from_text(&body, Some(url.clone()), ctx)
    }

    /// Total presentation duration in seconds, when the manifest states one.
    fn duration_secs(&self) -> Option<f64>;

    fn is_trimmed(&self) -> bool;

    /// Rewrite the stated duration. Called by the repair step only.
    fn apply_trim(&mut self, duration_secs: f64);

    /// Shorten the presentation by `margin_secs`. See
    /// [`repair::trim_trailing_segment`].
    fn trim_trailing_segment(self, margin_secs: f64) -> Result<Self> {
        repair::trim_trailing_segment(self, margin_secs)
    }

    fn to_tracks(&self, language: &Language) -> Result<TrackSet>;
}

/// A parsed manifest of either format.
#[derive(Debug, Clone)]
pub enum ManifestDocument {
    Dash(Dash),
    Hls(Hls),
}

impl ManifestDocument {
    pub fn parse(
        source: &ManifestSource,
        kind: ManifestKind,
        ctx: &ParseContext<'_>,
    ) -> Result<Self> {
        let document = match (source, kind) {
            (ManifestSource::Url(url), ManifestKind::Dash) => Self::Dash(Dash::from_url(url, ctx)?),
            (ManifestSource::Url(url), ManifestKind::Hls) => Self::Hls(Hls::from_url(url, ctx)?),
            (ManifestSource::Text { body, url }, ManifestKind::Dash) => {
                Self::Dash(Dash::from_text(body, url.clone(), ctx)?)
            }
            (ManifestSource::Text { body, url }, ManifestKind::Hls) => {
                Self::Hls(Hls::from_text(body, url.clone(), ctx)?)
            }
        };
        info!("Parsed {} manifest", kind);
        Ok(document)
    }

    pub fn kind(&self) -> ManifestKind {
        match self {
            Self::Dash(_) => ManifestKind::Dash,
            Self::Hls(_) => ManifestKind::Hls,
        }
    }
}

impl StreamingManifest for ManifestDocument {
    /// Parses text, sniffing the format.
    fn from_text(body: &str, url: Option<Url>, ctx: &ParseContext<'_>) -> Result<Self> {
        let kind = ManifestKind::detect(body)
            .ok_or_else(|| Error::malformed("neither an MPD nor an M3U8 playlist"))?;
        Self::parse(
            &ManifestSource::Text {
                body: body.to_string(),
                url,
            },
            kind,
            ctx,
        )
    }

    fn duration_secs(&self) -> Option<f64> {
        match self {
            Self::Dash(dash) => dash.duration_secs(),
            Self::Hls(hls) => hls.duration_secs(),
        }
    }

    fn is_trimmed(&self) -> bool {
        match self {
            Self::Dash(dash) => dash.is_trimmed(),
            Self::Hls(hls) => hls.is_trimmed(),
        }
    }

    fn apply_trim(&mut self, duration_secs: f64) {
        match self {
            Self::Dash(dash) => dash.apply_trim(duration_secs),
            Self::Hls(hls) => hls.apply_trim(duration_secs),
        }
    }

    fn to_tracks(&self, language: &Language) -> Result<TrackSet> {
        match self {
            Self::Dash(dash) => dash.to_tracks(language),
            Self::Hls(hls) => hls.to_tracks(language),
        }
    }
}

/// Resolve a manifest reference against the document it appears in.
///
/// A relative reference with no base is malformed input.
pub fn resolve_uri(base: Option<&Url>, uri: &str) -> Result<Url> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                Error::malformed(format!("relative URI {uri:?} with no base URL"))
            })?;
            base.join(uri)
                .map_err(|e| Error::malformed(format!("cannot resolve {uri:?}: {e}")))
        }
        Err(e) => Err(Error::malformed(format!("invalid URI {uri:?}: {e}"))),
    }
}
