//! Pipeline executor
//!
//! Applies an `ActionChain` to an image handle one step at a time. Steps run
//! strictly in order; a dual-image step finishes fetching and decoding its
//! second image before the next step starts.
//!
//! In lenient mode (the default) a step that cannot be applied leaves the
//! image as it was and the pipeline moves on. In strict mode the first such
//! step ends the request with `TransformError::StepFailed`.

use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::action::{ActionChain, PipelineStep};
use super::allow_list::AllowList;
use super::error::TransformError;
use super::fetcher::{FetchError, ImageFetcher};
use super::handle::{DecodeLimits, ImageHandle};
use super::operations::{OperationRegistry, Params};
use crate::metrics::TransformMetrics;

/// Why a dual-image step did not get its second image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingUrl,
    InvalidUrl(String),
    NotAllowed(String),
    FetchFailed(String),
    BadStatus(u16),
    TooLarge(usize),
    DecodeFailed(String),
}

impl SkipReason {
    fn outcome(&self) -> &'static str {
        match self {
            SkipReason::MissingUrl | SkipReason::InvalidUrl(_) => "invalid_url",
            SkipReason::NotAllowed(_) => "not_allowed",
            SkipReason::FetchFailed(_) => "fetch_error",
            SkipReason::BadStatus(_) => "bad_status",
            SkipReason::TooLarge(_) => "too_large",
            SkipReason::DecodeFailed(_) => "decode_error",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingUrl => write!(f, "second image url is missing"),
            SkipReason::InvalidUrl(url) => write!(f, "second image url '{}' is invalid", url),
            SkipReason::NotAllowed(url) => {
                write!(f, "second image url '{}' is not in white list", url)
            }
            SkipReason::FetchFailed(message) => write!(f, "second image fetch failed: {}", message),
            SkipReason::BadStatus(status) => {
                write!(f, "second image fetch returned status {}", status)
            }
            SkipReason::TooLarge(size) => write!(f, "second image of {} bytes is too large", size),
            SkipReason::DecodeFailed(message) => {
                write!(f, "second image could not be decoded: {}", message)
            }
        }
    }
}

/// Per-step behaviour of the executor
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// Fail the request on the first step that cannot be applied
    pub strict: bool,
    pub limits: DecodeLimits,
}

pub struct PipelineExecutor {
    registry: &'static OperationRegistry,
    fetcher: Arc<dyn ImageFetcher>,
    allow_list: Arc<AllowList>,
    options: ExecutorOptions,
}

impl PipelineExecutor {
    pub fn new(
        registry: &'static OperationRegistry,
        fetcher: Arc<dyn ImageFetcher>,
        allow_list: Arc<AllowList>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            registry,
            fetcher,
            allow_list,
            options,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.options.strict
    }

    /// Run every step of `chain` against `handle` and return the resulting
    /// handle. `headers` are forwarded to secondary image fetches.
    pub async fn execute(
        &self,
        mut handle: ImageHandle,
        chain: &ActionChain,
        headers: &HashMap<String, String>,
    ) -> Result<ImageHandle, TransformError> {
        let metrics = TransformMetrics::global();
        let max_pixels = self.options.limits.max_pixels;

        for (index, step) in chain.into_iter().enumerate() {
            let Some(operation) = self.registry.resolve(&step.operation) else {
                // Unknown names are user input; keep them out of metric labels
                metrics.record_step("unknown", "unknown");
                debug!(step = index, operation = %step.operation, "Unknown operation, skipping");
                if self.options.strict {
                    return Err(TransformError::step_failed(
                        step.to_string(),
                        "unknown operation",
                    ));
                }
                continue;
            };

            // Multi-image steps reserve their first token for the second image url
            let outcome = if self.registry.is_multi_image(&step.operation) {
                let fetched = self.secondary(step, &handle, headers).await;
                match fetched {
                    Ok(secondary) => operation
                        .apply_dual(
                            &mut handle,
                            secondary,
                            Params::new(&step.params[1..]).with_max_pixels(max_pixels),
                        )
                        .map_err(|e| e.to_string()),
                    Err(reason) => {
                        metrics.record_secondary_fetch(reason.outcome());
                        Err(reason.to_string())
                    }
                }
            } else {
                operation
                    .apply_single(
                        &mut handle,
                        Params::new(&step.params).with_max_pixels(max_pixels),
                    )
                    .map_err(|e| e.to_string())
            };

            match outcome {
                Ok(()) => {
                    metrics.record_step(&step.operation, "applied");
                    debug!(
                        step = index,
                        operation = %step.operation,
                        dimensions = ?handle.dimensions(),
                        "Applied pipeline step"
                    );
                }
                Err(reason) => {
                    metrics.record_step(&step.operation, "failed");
                    warn!(
                        step = index,
                        operation = %step.operation,
                        reason = %reason,
                        strict = self.options.strict,
                        "Pipeline step not applied"
                    );
                    if self.options.strict {
                        return Err(TransformError::step_failed(step.to_string(), reason));
                    }
                }
            }
        }

        Ok(handle)
    }

    /// Fetch and decode the second image of a dual-image step.
    async fn secondary(
        &self,
        step: &PipelineStep,
        primary: &ImageHandle,
        headers: &HashMap<String, String>,
    ) -> Result<ImageHandle, SkipReason> {
        let raw = step
            .params
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(SkipReason::MissingUrl)?;

        let url = Url::parse(raw).map_err(|_| SkipReason::InvalidUrl(raw.to_string()))?;
        if !self.allow_list.is_allowed(&url) {
            return Err(SkipReason::NotAllowed(raw.to_string()));
        }

        let fetched = self
            .fetcher
            .fetch(&url, headers)
            .await
            .map_err(|e| match e {
                FetchError::TooLarge { size, .. } => SkipReason::TooLarge(size),
                other => SkipReason::FetchFailed(other.to_string()),
            })?;
        if !fetched.is_success() {
            return Err(SkipReason::BadStatus(fetched.status));
        }

        let secondary = ImageHandle::decode(&fetched.body, &self.options.limits, primary.ledger())
            .map_err(|e| SkipReason::DecodeFailed(e.to_string()))?;
        TransformMetrics::global().record_secondary_fetch("ok");
        Ok(secondary)
    }
}
