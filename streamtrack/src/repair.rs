//! Corrections applied to a manifest before tracks are built from it.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::drm::KeySystem;
use crate::error::{Error, Result};
use crate::manifest::StreamingManifest;

static KEY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"KEYFORMAT="([^"]*)""#).expect("valid KEYFORMAT regex"));

static VENDOR_DRM_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^#[A-Z0-9][A-Z0-9-]*-DRM:(?:.*?\bID="([^"]*)")?(.*)$"#)
        .expect("valid DRM tag regex")
});

/// Shorten a manifest's stated duration by `margin_secs`.
///
/// Many origins answer 404 for the final segment of every stream. Cutting
/// the stated duration lets the builder stop one segment early without
/// touching any segment timeline. A manifest is trimmed at most once; a
/// second call returns it unchanged.
pub fn trim_trailing_segment<M: StreamingManifest>(mut document: M, margin_secs: f64) -> Result<M> {
    if document.is_trimmed() {
        debug!("Manifest already trimmed, leaving duration as is");
        return Ok(document);
    }

    let duration = document
        .duration_secs()
        .ok_or_else(|| Error::malformed("manifest states no duration to trim"))?;
    if duration < margin_secs {
        return Err(Error::ManifestTooShort {
            duration,
            margin: margin_secs,
        });
    }

    let trimmed = duration - margin_secs;
    info!("Trimming manifest duration from {}s to {}s", duration, trimmed);
    document.apply_trim(trimmed);
    Ok(document)
}

/// Drop HLS entries that belong to a key system other than `target`.
///
/// `#EXT-X-KEY` and `#EXT-X-SESSION-KEY` lines with a foreign `KEYFORMAT`
/// are removed. A vendor `#…-DRM:` tag naming a foreign system starts a
/// section that belongs to that system, so the playlist is cut at the end
/// of the line before it. Line structure is otherwise kept byte for byte.
pub fn strip_foreign_drm(text: &str, target: KeySystem) -> String {
    let mut kept = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);

        if let Some(caps) = VENDOR_DRM_TAG.captures(content) {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if is_foreign(KeySystem::from_vendor_name(name), target) {
                debug!("Cutting playlist at foreign DRM section: {}", content);
                if let Some(end) = kept.rfind('\n') {
                    kept.truncate(end);
                } else {
                    kept.clear();
                }
                return kept;
            }
        }

        if content.starts_with("#EXT-X-KEY:") || content.starts_with("#EXT-X-SESSION-KEY:") {
            let format = KEY_FORMAT
                .captures(content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str());
            if let Some(format) = format {
                if is_foreign(KeySystem::from_identifier(format), target) {
                    debug!("Dropping foreign key entry: {}", content);
                    continue;
                }
            }
        }

        kept.push_str(line);
    }

    kept
}

/// Identity keys (plain AES-128) are usable whatever the target.
fn is_foreign(system: Option<KeySystem>, target: KeySystem) -> bool {
    matches!(system, Some(system) if system != target && system != KeySystem::ClearKey)
}
