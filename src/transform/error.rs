//! Transform error types
//!
//! Provides structured error handling with HTTP status mapping for the
//! transform endpoint, plus the per-step `OperationError` that the pipeline
//! executor swallows in lenient mode.

use std::fmt;

/// Errors that end a transform request with a JSON error body
#[derive(Debug, Clone)]
pub enum TransformError {
    // === Request Validation Errors ===
    /// The `url` query parameter is missing or empty
    MissingUrl,
    /// The `url` query parameter is not an absolute URL
    InvalidUrl { url: String, message: String },
    /// The `format` query parameter is not one of the supported formats
    InvalidFormat { format: String },
    /// The `quality` query parameter is not a number
    InvalidQuality { quality: String },

    // === Security Errors ===
    /// Source host is not covered by the allow-list
    NotAllowed { url: String },
    /// Source body exceeds the configured size limit
    SourceTooLarge { size: usize, max_size: usize },
    /// Decoded dimensions exceed the pixel limit (image bomb protection)
    ImageBombDetected {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    // === Fetch Errors ===
    /// The source could not be reached at all (no HTTP response)
    UpstreamUnavailable { url: String, message: String },

    // === Processing Errors ===
    /// Source bytes could not be decoded into an image
    DecodeFailed { message: String },
    /// Final image could not be encoded
    EncodeFailed { format: String, message: String },
    /// A pipeline step could not be applied (strict mode only)
    StepFailed { step: String, reason: String },
    /// An image handle was used after it had been released
    HandleReleased,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::MissingUrl => write!(f, "url is required"),
            TransformError::InvalidUrl { url, message } => {
                write!(f, "invalid url '{}': {}", url, message)
            }
            TransformError::InvalidFormat { format } => write!(
                f,
                "invalid format '{}': expected one of jpeg, jpg, png, webp",
                format
            ),
            TransformError::InvalidQuality { quality } => {
                write!(f, "invalid quality '{}': expected a number", quality)
            }
            TransformError::NotAllowed { .. } => write!(f, "url is not in white list"),
            TransformError::SourceTooLarge { size, max_size } => write!(
                f,
                "source image of {} bytes exceeds maximum {} bytes",
                size, max_size
            ),
            TransformError::ImageBombDetected {
                width,
                height,
                max_pixels,
            } => write!(
                f,
                "image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                width,
                height,
                *width as u64 * *height as u64,
                max_pixels
            ),
            TransformError::UpstreamUnavailable { url, message } => {
                write!(f, "failed to fetch '{}': {}", url, message)
            }
            TransformError::DecodeFailed { message } => write!(f, "{}", message),
            TransformError::EncodeFailed { format, message } => {
                write!(f, "failed to encode to {}: {}", format, message)
            }
            TransformError::StepFailed { step, reason } => {
                write!(f, "action '{}' failed: {}", step, reason)
            }
            TransformError::HandleReleased => write!(f, "image handle already released"),
        }
    }
}

impl std::error::Error for TransformError {}

impl TransformError {
    /// Maps transform errors to HTTP status codes
    ///
    /// Status mapping:
    /// - MissingUrl, InvalidUrl, InvalidFormat, InvalidQuality → 400
    /// - DecodeFailed, EncodeFailed, ImageBombDetected, StepFailed → 400
    /// - NotAllowed → 403 (Forbidden)
    /// - SourceTooLarge → 413 (Payload Too Large)
    /// - HandleReleased → 500
    /// - UpstreamUnavailable → 502 (Bad Gateway)
    pub fn to_http_status(&self) -> u16 {
        match self {
            TransformError::MissingUrl
            | TransformError::InvalidUrl { .. }
            | TransformError::InvalidFormat { .. }
            | TransformError::InvalidQuality { .. }
            | TransformError::DecodeFailed { .. }
            | TransformError::EncodeFailed { .. }
            | TransformError::ImageBombDetected { .. }
            | TransformError::StepFailed { .. } => 400,

            TransformError::NotAllowed { .. } => 403,

            TransformError::SourceTooLarge { .. } => 413,

            TransformError::HandleReleased => 500,

            TransformError::UpstreamUnavailable { .. } => 502,
        }
    }

    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransformError::MissingUrl => "missing_url",
            TransformError::InvalidUrl { .. } => "invalid_url",
            TransformError::InvalidFormat { .. } => "invalid_format",
            TransformError::InvalidQuality { .. } => "invalid_quality",
            TransformError::NotAllowed { .. } => "not_allowed",
            TransformError::SourceTooLarge { .. } => "source_too_large",
            TransformError::ImageBombDetected { .. } => "image_bomb",
            TransformError::UpstreamUnavailable { .. } => "upstream_unavailable",
            TransformError::DecodeFailed { .. } => "decode_failed",
            TransformError::EncodeFailed { .. } => "encode_failed",
            TransformError::StepFailed { .. } => "step_failed",
            TransformError::HandleReleased => "handle_released",
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        TransformError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        TransformError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn step_failed(step: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformError::StepFailed {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single operation inside the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum OperationError {
    /// A required positional parameter is absent
    MissingParameter { index: usize, name: &'static str },
    /// A parameter token could not be interpreted
    InvalidParameter { name: &'static str, value: String },
    /// Parameters are well-formed but cannot be applied to this image
    Unsupported(String),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::MissingParameter { index, name } => {
                write!(f, "missing parameter #{} ({})", index + 1, name)
            }
            OperationError::InvalidParameter { name, value } => {
                write!(f, "invalid value '{}' for parameter {}", value, name)
            }
            OperationError::Unsupported(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for OperationError {}
