//! Remote image fetching
//!
//! `ImageFetcher` is the seam between the transform pipeline and the network.
//! `HttpImageFetcher` performs real HTTP GETs through reqwest; the in-memory
//! `MemoryImageFetcher` serves canned responses for tests and benchmarks.
//!
//! A fetch that reaches the upstream always yields a `FetchedImage`, even for
//! non-success statuses, so the endpoint can pass them through verbatim. Only
//! transport failures and oversized bodies are `FetchError`s.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Errors that prevent a response from being obtained
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("response body of {size} bytes exceeds maximum {max_size} bytes")]
    TooLarge { size: usize, max_size: usize },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Raw upstream response
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchedImage {
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// GET `url`, sending `headers` along with the request
    async fn fetch(
        &self,
        url: &Url,
        headers: &HashMap<String, String>,
    ) -> Result<FetchedImage, FetchError>;
}

/// Pick the configured headers out of the inbound request headers.
///
/// Header names are matched case-insensitively; the returned map uses the
/// configured (lowercase) names.
pub fn select_forward_headers(
    inbound: &HashMap<String, String>,
    forward: &[String],
) -> HashMap<String, String> {
    let mut selected = HashMap::new();
    for name in forward {
        let wanted = name.to_lowercase();
        if let Some((_, value)) = inbound
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
        {
            selected.insert(wanted, value.clone());
        }
    }
    selected
}

/// HTTP fetcher with a request timeout and a body size cap
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(
        &self,
        url: &Url,
        headers: &HashMap<String, String>,
    ) -> Result<FetchedImage, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Reject early when the upstream announces an oversized body
        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(FetchError::TooLarge {
                    size: length as usize,
                    max_size: self.max_bytes,
                });
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    size: body.len() + chunk.len(),
                    max_size: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            url = %url,
            status = status,
            bytes = body.len(),
            "Fetched source image"
        );

        Ok(FetchedImage {
            status,
            content_type,
            body: body.freeze(),
        })
    }
}

/// In-memory fetcher keyed by URL. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct MemoryImageFetcher {
    responses: RwLock<HashMap<String, FetchedImage>>,
    requests: RwLock<Vec<(String, HashMap<String, String>)>>,
    max_bytes: Option<usize>,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn insert(&self, url: &str, response: FetchedImage) {
        if let Ok(mut responses) = self.responses.write() {
            responses.insert(url.to_string(), response);
        }
    }

    /// URLs and forwarded headers of every fetch so far, in order
    pub fn requests(&self) -> Vec<(String, HashMap<String, String>)> {
        self.requests
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(
        &self,
        url: &Url,
        headers: &HashMap<String, String>,
    ) -> Result<FetchedImage, FetchError> {
        if let Ok(mut requests) = self.requests.write() {
            requests.push((url.to_string(), headers.clone()));
        }

        let response = self
            .responses
            .read()
            .ok()
            .and_then(|r| r.get(url.as_str()).cloned())
            .ok_or_else(|| FetchError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })?;

        if let Some(max_size) = self.max_bytes {
            if response.body.len() > max_size {
                return Err(FetchError::TooLarge {
                    size: response.body.len(),
                    max_size,
                });
            }
        }

        Ok(response)
    }
}
