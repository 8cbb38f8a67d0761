use std::cell::RefCell;
use std::collections::HashMap;

use streamtrack::{EngineConfig, Error, Fetch, Language, Result};
use url::Url;

/// Serves canned documents by URL and records what was requested.
#[derive(Default)]
pub struct MemoryFetch {
    documents: HashMap<String, String>,
    pub requests: RefCell<Vec<String>>,
}

impl MemoryFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }
}

impl Fetch for MemoryFetch {
    fn fetch_text(&self, url: &Url) -> Result<String> {
        self.requests.borrow_mut().push(url.to_string());
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

pub fn en() -> Language {
    Language::parse("en").unwrap()
}

pub fn config() -> EngineConfig {
    EngineConfig::default()
}

pub fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}
