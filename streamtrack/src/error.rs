//! Error types for streamtrack.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort loading a manifest.
///
/// Every variant except [`Error::UnsupportedKeySystem`] aborts the whole
/// build; there is no partial TrackSet.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest text could not be parsed.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// Trimming the trailing segment would leave a negative duration.
    #[error("manifest too short to trim: {duration}s is less than the {margin}s margin")]
    ManifestTooShort { duration: f64, margin: f64 },

    /// The build pass produced no video track.
    #[error("no playable streams: manifest contains no video tracks")]
    NoPlayableStreams,

    /// DRM signaling for a key system we do not recognize. Logged, never
    /// returned from a build.
    #[error("unsupported key system: {0}")]
    UnsupportedKeySystem(String),

    /// Transport failure while fetching a manifest or playlist.
    #[error("network failure fetching {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The origin answered with a non-success status.
    #[error("network failure fetching {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be deserialized.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed manifest error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedManifest(message.into())
    }

    /// Create a network failure from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::NetworkFailure {
            url: url.into(),
            source,
        }
    }

    /// True for the transport-level failures a caller may choose to retry.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. } | Self::HttpStatus { .. })
    }
}
