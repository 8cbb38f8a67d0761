use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A BCP-47 style language tag, normalized to `ll` / `ll-RR` casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    /// Parse a tag, returning `None` for empty, undetermined (`und`) or
    /// structurally invalid values.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().replace('_', "-");
        if value.is_empty() {
            return None;
        }

        let mut subtags = Vec::new();
        for (index, subtag) in value.split('-').enumerate() {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return None;
            }
            let normalized = match (index, subtag.len()) {
                (0, _) => subtag.to_ascii_lowercase(),
                (_, 2) => subtag.to_ascii_uppercase(),
                (_, 4) => {
                    let mut script = subtag.to_ascii_lowercase();
                    script[..1].make_ascii_uppercase();
                    script
                }
                _ => subtag.to_ascii_lowercase(),
            };
            subtags.push(normalized);
        }

        let primary = &subtags[0];
        if primary.len() < 2
            || primary.len() > 3
            || !primary.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }
        if primary == "und" || primary == "mis" || primary == "zxx" {
            return None;
        }

        Some(Self(subtags.join("-")))
    }

    /// The first usable candidate, or `default`. The result is never unset.
    pub fn resolve<'a, I>(candidates: I, default: &Language) -> Language
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find_map(Language::parse)
            .unwrap_or_else(|| default.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::parse(s).ok_or_else(|| Error::Config(format!("invalid language tag: {s:?}")))
    }
}

impl TryFrom<String> for Language {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case() {
        assert_eq!(Language::parse("EN").unwrap().as_str(), "en");
        assert_eq!(Language::parse("en_gb").unwrap().as_str(), "en-GB");
        assert_eq!(Language::parse("zh-hant-tw").unwrap().as_str(), "zh-Hant-TW");
    }

    #[test]
    fn test_rejects_unset_values() {
        assert!(Language::parse("").is_none());
        assert!(Language::parse("und").is_none());
        assert!(Language::parse("english language").is_none());
    }

    #[test]
    fn test_resolve_order() {
        let default = Language::parse("nb").unwrap();
        assert_eq!(
            Language::resolve([Some("fr"), Some("de")], &default).as_str(),
            "fr"
        );
        assert_eq!(Language::resolve([None, Some("de")], &default).as_str(), "de");
        assert_eq!(Language::resolve([Some("und"), None], &default).as_str(), "nb");
    }
}
