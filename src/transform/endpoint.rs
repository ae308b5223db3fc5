//! Transform endpoint
//!
//! Drives one `GET /api/transform` request through validation, source fetch,
//! decode, pipeline execution and encoding, and turns the outcome into an
//! `EndpointResponse`. The HTTP server only has to copy that response onto the
//! wire.
//!
//! Every image handle acquired for the request reports to one `HandleLedger`;
//! handles are released on every exit path, so the ledger's `live()` count is
//! zero once `handle` returns.

use bytes::Bytes;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::action::ActionChain;
use super::allow_list::AllowList;
use super::codecs;
use super::encoder::{self, EncoderQuality, OutputFormat};
use super::error::TransformError;
use super::executor::{ExecutorOptions, PipelineExecutor};
use super::fetcher::{select_forward_headers, FetchError, HttpImageFetcher, ImageFetcher};
use super::handle::{DecodeLimits, HandleLedger, ImageHandle};
use crate::config::TransformConfig;
use crate::metrics::TransformMetrics;

/// Validated query parameters of a transform request
#[derive(Debug, Clone, PartialEq)]
pub struct TransformQuery {
    pub url: Url,
    pub format: OutputFormat,
    pub action: Option<String>,
    pub quality: Option<f32>,
}

impl TransformQuery {
    /// Validate raw query parameters. Absent and empty values are treated
    /// alike.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, TransformError> {
        let get = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get("url").ok_or(TransformError::MissingUrl)?;
        let url = Url::parse(raw_url).map_err(|e| TransformError::InvalidUrl {
            url: raw_url.to_string(),
            message: e.to_string(),
        })?;

        let format = match get("format") {
            Some(raw) => raw.parse()?,
            None => OutputFormat::default(),
        };

        let quality = match get("quality") {
            Some(raw) => Some(raw.parse::<f32>().ok().filter(|q| q.is_finite()).ok_or_else(
                || TransformError::InvalidQuality {
                    quality: raw.to_string(),
                },
            )?),
            None => None,
        };

        Ok(Self {
            url,
            format,
            action: get("action").map(|s| s.to_string()),
            quality,
        })
    }
}

/// Fully formed endpoint response
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
    /// `cache-control: max-age` in seconds, set on successful transforms only
    pub max_age: Option<u64>,
}

impl EndpointResponse {
    pub fn image(content_type: &str, body: Vec<u8>, max_age: u64) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body: Bytes::from(body),
            max_age: Some(max_age),
        }
    }

    /// `{"error": message}` body with the given status
    pub fn json_error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self {
            status,
            content_type: "application/json".to_string(),
            body: Bytes::from(body),
            max_age: None,
        }
    }

    pub fn from_error(error: &TransformError) -> Self {
        Self::json_error(error.to_http_status(), &error.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn cache_control(&self) -> Option<String> {
        self.max_age.map(|age| format!("max-age={}", age))
    }
}

/// Output format label for metrics; anything unrecognised counts as webp
pub fn format_label(params: &HashMap<String, String>) -> &str {
    params
        .get("format")
        .map(|s| s.as_str())
        .filter(|f| f.parse::<OutputFormat>().is_ok())
        .unwrap_or("webp")
}

/// Orchestrates a transform request
pub struct TransformService {
    config: TransformConfig,
    fetcher: Arc<dyn ImageFetcher>,
    allow_list: Arc<AllowList>,
    executor: PipelineExecutor,
}

impl TransformService {
    /// Service backed by a real HTTP fetcher built from `config`
    pub fn from_config(config: &TransformConfig) -> Result<Self, FetchError> {
        let fetcher = HttpImageFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            config.max_source_bytes,
        )?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn new(config: &TransformConfig, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let allow_list = Arc::new(AllowList::new(config.allow_list.clone()));
        let executor = PipelineExecutor::new(
            codecs::init(),
            Arc::clone(&fetcher),
            Arc::clone(&allow_list),
            ExecutorOptions {
                strict: config.strict_pipeline,
                limits: DecodeLimits {
                    max_pixels: config.max_source_pixels,
                },
            },
        );

        Self {
            config: config.clone(),
            fetcher,
            allow_list,
            executor,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Handle a request given its query parameters and inbound headers
    pub async fn handle(
        &self,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
    ) -> EndpointResponse {
        let ledger = HandleLedger::new();
        let response = self.handle_with_ledger(params, headers, &ledger).await;
        if ledger.live() != 0 {
            warn!(live = ledger.live(), "Image handles outlived the request");
        }
        response
    }

    /// Same as `handle`, recording image handles in a caller-owned ledger
    pub async fn handle_with_ledger(
        &self,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
        ledger: &Arc<HandleLedger>,
    ) -> EndpointResponse {
        let started = Instant::now();
        let metrics = TransformMetrics::global();

        let response = match self.transform(params, headers, ledger).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    error = %error,
                    kind = error.kind(),
                    status = error.to_http_status(),
                    "Transform request failed"
                );
                EndpointResponse::from_error(&error)
            }
        };

        metrics.record_request(response.status);
        metrics.observe_duration(format_label(params), started.elapsed().as_secs_f64());
        response
    }

    async fn transform(
        &self,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
        ledger: &Arc<HandleLedger>,
    ) -> Result<EndpointResponse, TransformError> {
        let query = TransformQuery::from_params(params)?;

        if !self.allow_list.is_allowed(&query.url) {
            return Err(TransformError::NotAllowed {
                url: query.url.to_string(),
            });
        }

        let forwarded = select_forward_headers(headers, &self.config.forward_headers);
        let fetched = self
            .fetcher
            .fetch(&query.url, &forwarded)
            .await
            .map_err(|e| match e {
                FetchError::TooLarge { size, max_size } => {
                    TransformError::SourceTooLarge { size, max_size }
                }
                other => TransformError::UpstreamUnavailable {
                    url: query.url.to_string(),
                    message: other.to_string(),
                },
            })?;

        if !fetched.is_success() {
            debug!(url = %query.url, status = fetched.status, "Passing upstream status through");
            return Ok(EndpointResponse {
                status: fetched.status,
                content_type: fetched
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                body: fetched.body,
                max_age: None,
            });
        }

        if fetched.body.len() > self.config.max_source_bytes {
            return Err(TransformError::SourceTooLarge {
                size: fetched.body.len(),
                max_size: self.config.max_source_bytes,
            });
        }

        let limits = DecodeLimits {
            max_pixels: self.config.max_source_pixels,
        };
        let handle = ImageHandle::decode(&fetched.body, &limits, ledger)?;
        drop(fetched);

        let chain = ActionChain::parse(query.action.as_deref());
        let handle = self.executor.execute(handle, &chain, &forwarded).await?;

        let encoded = encoder::encode(
            handle.image()?,
            query.format,
            EncoderQuality::new(query.quality),
        )?;
        let (width, height) = handle.dimensions().unwrap_or_default();
        drop(handle);

        info!(
            url = %query.url,
            format = %query.format,
            steps = chain.len(),
            width = width,
            height = height,
            bytes = encoded.data.len(),
            "Transformed image"
        );

        Ok(EndpointResponse::image(
            encoded.content_type(),
            encoded.data,
            self.config.cache_max_age_secs,
        ))
    }
}
