use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info};
use url::Url;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// The engine's only access to the network.
///
/// Fetches are synchronous from the engine's point of view. A caller that
/// wants concurrency or caching wraps its own implementation.
pub trait Fetch {
    fn fetch_text(&self, url: &Url) -> Result<String>;
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpClient {
    fn fetch_text(&self, url: &Url) -> Result<String> {
        let start_time = Instant::now();
        debug!("Sending GET request to: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| Error::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .map_err(|e| Error::network(url.as_str(), e))?;

        info!(
            "Fetched {} in {} ms, received {} bytes",
            url,
            start_time.elapsed().as_millis(),
            body.len()
        );
        Ok(body)
    }
}
