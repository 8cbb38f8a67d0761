//! Engine configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::drm::KeySystem;
use crate::error::{Error, Result};

/// Safety margin removed by the duration-trim repair. Origins that 404 on
/// the final segment are off by one segment of at most this length.
pub const DEFAULT_TRIM_MARGIN_SECS: f64 = 6.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trim_margin_secs: f64,
    /// Key system the caller's CDM speaks; HLS entries for other systems are
    /// dropped before parsing.
    pub key_system: KeySystem,
    pub http: HttpConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trim_margin_secs: DEFAULT_TRIM_MARGIN_SECS,
            key_system: KeySystem::Widevine,
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Extra request headers, sent with every manifest and playlist fetch.
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.trim_margin_secs.is_finite() || self.trim_margin_secs < 0.0 {
            return Err(Error::Config(format!(
                "trim_margin_secs must be a non-negative number, got {}",
                self.trim_margin_secs
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::Config("http.timeout_secs cannot be 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.trim_margin_secs, DEFAULT_TRIM_MARGIN_SECS);
        assert_eq!(config.key_system, KeySystem::Widevine);
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_full_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            trim_margin_secs = 4.0
            key_system = "playready"

            [http]
            timeout_secs = 10
            user_agent = "streamtrack/0.1"

            [http.headers]
            Referer = "https://www.example.com/"
            "#,
        )
        .unwrap();

        assert_eq!(config.trim_margin_secs, 4.0);
        assert_eq!(config.key_system, KeySystem::PlayReady);
        assert_eq!(config.http.user_agent.as_deref(), Some("streamtrack/0.1"));
        assert_eq!(
            config.http.headers.get("Referer").map(String::as_str),
            Some("https://www.example.com/")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("trim_margin_secs = -1.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[http]\ntimeout_secs = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("key_system = \"nagra\""),
            Err(Error::ConfigParse(_))
        ));
    }
}
