// src/source.rs
//
// Where track payloads come from.

use std::cell::Cell;
use std::collections::HashMap;
use std::future::Future;

use crate::error::{AudioError, AudioResult};

/// Fetches the binary timeline behind a resource locator.
pub trait TrackSource {
    fn fetch(&self, locator: &str) -> impl Future<Output = AudioResult<Vec<u8>>>;
}

/// In-memory payloads keyed by locator.
#[derive(Debug, Default)]
pub struct MemoryTrackSource {
    payloads: HashMap<String, Vec<u8>>,
    fetches: Cell<usize>,
}

impl MemoryTrackSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(locator, bytes);
        self
    }

    pub fn insert(&mut self, locator: impl Into<String>, bytes: Vec<u8>) {
        self.payloads.insert(locator.into(), bytes);
    }

    /// Number of fetches served or refused so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl TrackSource for MemoryTrackSource {
    async fn fetch(&self, locator: &str) -> AudioResult<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        self.payloads
            .get(locator)
            .cloned()
            .ok_or_else(|| AudioError::ResourceUnavailable(format!("{} not found", locator)))
    }
}

/// Fetches tracks with HTTP GET relative to a base URL.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTrackSource {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "http")]
impl HttpTrackSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            format!("{}/{}", self.base_url, locator.trim_start_matches('/'))
        }
    }
}

#[cfg(feature = "http")]
impl TrackSource for HttpTrackSource {
    async fn fetch(&self, locator: &str) -> AudioResult<Vec<u8>> {
        let url = self.url_for(locator);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AudioError::ResourceUnavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AudioError::ResourceUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::ResourceUnavailable(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
