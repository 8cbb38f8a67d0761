//! DRM key-system signaling.
//!
//! Extraction only: this module locates key systems, license-server URLs
//! and init data in a manifest node. It never contacts a license server and
//! never sees challenge or license bytes; those belong to the caller's CDM.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::StreamNode;
use crate::error::Error;

const WIDEVINE_UUID: &str = "edef8ba9-79d6-4ace-a3c8-27dcd51d21ed";
const PLAYREADY_UUID: &str = "9a04f079-9840-4286-ab92-e65be0885f95";
const PLAYREADY_SWAPPED_UUID: &str = "79f0049a-4098-8642-ab92-e65be0885f95";
const FAIRPLAY_UUID: &str = "94ce86fb-07ff-4f43-adb8-93d2fa968ca2";
const CLEARKEY_UUID: &str = "e2719d58-a985-b3c9-781a-b030af78d30e";
const CLEARKEY_DASHIF_UUID: &str = "1077efec-c0b2-4d02-ace3-3c1e52e2fb4b";

/// Common-encryption marker; carries the default KID but names no system.
const MP4_PROTECTION_SCHEME: &str = "urn:mpeg:dash:mp4protection:2011";

/// A DRM scheme the engine can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySystem {
    Widevine,
    PlayReady,
    FairPlay,
    /// W3C Clear Key, and HLS `AES-128` identity keys.
    ClearKey,
}

impl KeySystem {
    /// Recognize a DASH `schemeIdUri`, an HLS `KEYFORMAT` or an EME key
    /// system string.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let id = identifier.trim().to_ascii_lowercase();
        let uuid = id.strip_prefix("urn:uuid:").unwrap_or(&id);

        match uuid {
            WIDEVINE_UUID | "com.widevine.alpha" | "com.widevine" => Some(Self::Widevine),
            PLAYREADY_UUID | PLAYREADY_SWAPPED_UUID | "com.microsoft.playready" => {
                Some(Self::PlayReady)
            }
            FAIRPLAY_UUID | "com.apple.streamingkeydelivery" | "com.apple.fps" => {
                Some(Self::FairPlay)
            }
            CLEARKEY_UUID | CLEARKEY_DASHIF_UUID | "org.w3.clearkey" | "identity" => {
                Some(Self::ClearKey)
            }
            _ if uuid.starts_with("com.apple.fps.") => Some(Self::FairPlay),
            _ if uuid.starts_with("com.microsoft.playready.") => Some(Self::PlayReady),
            _ => None,
        }
    }

    /// Recognize a free-form vendor tag value such as `fairplay`.
    pub fn from_vendor_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("widevine") {
            Some(Self::Widevine)
        } else if name.contains("playready") {
            Some(Self::PlayReady)
        } else if name.contains("fairplay") || name.contains("streamingkeydelivery") {
            Some(Self::FairPlay)
        } else if name.contains("clearkey") {
            Some(Self::ClearKey)
        } else {
            Self::from_identifier(&name)
        }
    }
}

impl fmt::Display for KeySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Widevine => "Widevine",
            Self::PlayReady => "PlayReady",
            Self::FairPlay => "FairPlay",
            Self::ClearKey => "ClearKey",
        };
        f.write_str(name)
    }
}

/// One DRM declaration as found in the manifest, before recognition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtectionDecl {
    /// `schemeIdUri` (DASH) or `KEYFORMAT` (HLS).
    pub scheme: String,
    pub license_url: Option<String>,
    /// Base64 PSSH box or other init data.
    pub pssh: Option<String>,
    pub default_kid: Option<String>,
}

/// What the manifest says about one key system.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrmSignal {
    pub license_url: Option<String>,
    pub pssh: Option<String>,
    pub default_kid: Option<String>,
}

/// Key system to signal. Empty for clear content.
pub type DrmSystems = BTreeMap<KeySystem, DrmSignal>;

/// Collect the recognized key systems a node declares.
///
/// Declarations are visited in the node's order (the node itself before its
/// containing group), so the most specific value for each field wins.
/// Unrecognized schemes are logged and contribute nothing.
pub fn extract_drm(node: &dyn StreamNode) -> DrmSystems {
    let mut systems = DrmSystems::new();
    let mut common_kid: Option<String> = None;

    for decl in node.protections() {
        if decl.scheme.eq_ignore_ascii_case(MP4_PROTECTION_SCHEME) {
            if common_kid.is_none() {
                common_kid = decl.default_kid.as_deref().map(normalize_kid);
            }
            continue;
        }

        let Some(key_system) = KeySystem::from_identifier(&decl.scheme) else {
            let error = Error::UnsupportedKeySystem(decl.scheme.clone());
            warn!("Ignoring DRM signaling: {}", error);
            continue;
        };

        let signal = systems.entry(key_system).or_default();
        if signal.license_url.is_none() {
            signal.license_url = decl.license_url.clone();
        }
        if signal.pssh.is_none() {
            signal.pssh = decl.pssh.clone();
        }
        if signal.default_kid.is_none() {
            signal.default_kid = decl.default_kid.as_deref().map(normalize_kid);
        }
    }

    if let Some(kid) = common_kid {
        for signal in systems.values_mut() {
            signal.default_kid.get_or_insert_with(|| kid.clone());
        }
    }

    if !systems.is_empty() {
        debug!(
            "Found key systems: {}",
            systems
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    systems
}

/// Lowercase a key ID and strip its dashes.
fn normalize_kid(kid: &str) -> String {
    kid.trim()
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RangeHint;

    struct Protected(Vec<ProtectionDecl>);

    impl StreamNode for Protected {
        fn role_values(&self) -> Vec<&str> {
            vec![]
        }
        fn labels(&self) -> Vec<&str> {
            vec![]
        }
        fn codecs(&self) -> Option<&str> {
            None
        }
        fn mime_type(&self) -> Option<&str> {
            None
        }
        fn range_hints(&self) -> Vec<RangeHint> {
            vec![]
        }
        fn protections(&self) -> Vec<ProtectionDecl> {
            self.0.clone()
        }
    }

    fn decl(scheme: &str) -> ProtectionDecl {
        ProtectionDecl {
            scheme: scheme.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_recognizes_identifiers() {
        assert_eq!(
            KeySystem::from_identifier("urn:uuid:EDEF8BA9-79D6-4ACE-A3C8-27DCD51D21ED"),
            Some(KeySystem::Widevine)
        );
        assert_eq!(
            KeySystem::from_identifier("com.microsoft.playready"),
            Some(KeySystem::PlayReady)
        );
        assert_eq!(
            KeySystem::from_identifier("com.apple.streamingkeydelivery"),
            Some(KeySystem::FairPlay)
        );
        assert_eq!(KeySystem::from_identifier("urn:uuid:0000"), None);
    }

    #[test]
    fn test_clear_content_is_empty() {
        assert!(extract_drm(&Protected(vec![])).is_empty());
    }

    #[test]
    fn test_extracts_license_and_kid() {
        let node = Protected(vec![
            ProtectionDecl {
                scheme: MP4_PROTECTION_SCHEME.to_string(),
                default_kid: Some("0123ABCD-0000-0000-0000-000000000000".to_string()),
                ..Default::default()
            },
            ProtectionDecl {
                scheme: format!("urn:uuid:{WIDEVINE_UUID}"),
                license_url: Some("https://license.example.com/wv".to_string()),
                pssh: Some("AAAAW3Bzc2g=".to_string()),
                default_kid: None,
            },
        ]);

        let systems = extract_drm(&node);
        let widevine = &systems[&KeySystem::Widevine];
        assert_eq!(
            widevine.license_url.as_deref(),
            Some("https://license.example.com/wv")
        );
        assert_eq!(widevine.pssh.as_deref(), Some("AAAAW3Bzc2g="));
        assert_eq!(
            widevine.default_kid.as_deref(),
            Some("0123abcd000000000000000000000000")
        );
    }

    #[test]
    fn test_unsupported_scheme_is_not_fatal() {
        let node = Protected(vec![
            decl("urn:uuid:5e629af5-38da-4063-8977-97ffbd9902d4"),
            decl(&format!("urn:uuid:{PLAYREADY_UUID}")),
        ]);

        let systems = extract_drm(&node);
        assert_eq!(systems.len(), 1);
        assert!(systems.contains_key(&KeySystem::PlayReady));
    }

    #[test]
    fn test_specific_declaration_wins() {
        let node = Protected(vec![
            ProtectionDecl {
                scheme: "com.widevine.alpha".to_string(),
                license_url: Some("https://rep.example.com".to_string()),
                ..Default::default()
            },
            ProtectionDecl {
                scheme: "com.widevine.alpha".to_string(),
                license_url: Some("https://set.example.com".to_string()),
                ..Default::default()
            },
        ]);

        let systems = extract_drm(&node);
        assert_eq!(
            systems[&KeySystem::Widevine].license_url.as_deref(),
            Some("https://rep.example.com")
        );
    }
}
