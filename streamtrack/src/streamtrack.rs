//! Normalizes DASH and HLS manifests into one deduplicated set of tracks.
//!
//! A service plugin hands [`load`] a manifest URL or text, a default
//! language and whether to trim the final segment, and gets back a
//! [`TrackSet`] with codec, resolution, range, language, role and DRM
//! metadata for every selectable stream.

pub mod classify;
pub mod config;
pub mod drm;
pub mod error;
pub mod language;
pub mod manifest;
pub mod networking;
pub mod repair;
pub mod track_builder;
pub mod tracks;
pub mod utils;

use tracing::info;

pub use config::EngineConfig;
pub use drm::{DrmSignal, DrmSystems, KeySystem};
pub use error::{Error, Result};
pub use language::Language;
pub use manifest::{
    Dash, Hls, ManifestDocument, ManifestKind, ManifestSource, ParseContext, StreamingManifest,
};
pub use networking::{Fetch, HttpClient};
pub use track_builder::build_tracks;
pub use tracks::{Track, TrackId, TrackSet};

/// One manifest to normalize.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: ManifestSource,
    pub kind: ManifestKind,
    /// Used for every stream that does not state its own language.
    pub language: Language,
    /// Remove the configured margin from the end of the presentation.
    pub trim: bool,
}

/// Fetch, parse, optionally trim, and build.
///
/// Either a complete TrackSet is returned or an error; a failure at any
/// stage discards everything parsed so far.
pub fn load(request: &LoadRequest, fetcher: &dyn Fetch, config: &EngineConfig) -> Result<TrackSet> {
    config.validate()?;
    let ctx = ParseContext::new(fetcher, config.key_system);

    let mut document = ManifestDocument::parse(&request.source, request.kind, &ctx)?;
    if request.trim {
        document = document.trim_trailing_segment(config.trim_margin_secs)?;
    }

    let tracks = build_tracks(&document, &request.language)?;
    info!(
        "Loaded {} manifest: {} track(s) for default language {}",
        document.kind(),
        tracks.len(),
        request.language
    );
    Ok(tracks)
}
