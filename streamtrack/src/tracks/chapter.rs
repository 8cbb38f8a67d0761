use serde::Serialize;

use super::TrackId;
use crate::language::Language;

/// An intro/credits style marker supplied by a service's own API.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterTrack {
    pub id: TrackId,
    pub language: Language,
    pub name: Option<String>,
    /// Seconds from the start of the presentation.
    pub timestamp: f64,
}

impl ChapterTrack {
    pub fn new(timestamp: f64, name: Option<String>, language: Language) -> Self {
        Self {
            id: TrackId::new(format!("chapter:{:.3}", timestamp.max(0.0))),
            language,
            name,
            timestamp: timestamp.max(0.0),
        }
    }
}
