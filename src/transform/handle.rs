//! Owned image handles
//!
//! Every decoded image (the primary source, each secondary image and any
//! intermediate image produced by an operation) lives in an `ImageHandle`.
//! A handle is released exactly once: explicitly through `release()`, which
//! is idempotent, or implicitly on drop. Each request carries a
//! `HandleLedger` that counts acquisitions and releases so callers can
//! assert nothing outlives the request.

use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::error::TransformError;

/// Per-request accounting of image buffers
#[derive(Debug, Default)]
pub struct HandleLedger {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl HandleLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Buffers acquired but not yet released
    pub fn live(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }

    fn record_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}

/// Limits enforced before a source is fully decoded
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_pixels: crate::constants::DEFAULT_MAX_SOURCE_PIXELS,
        }
    }
}

/// Exclusively owned decoded image
pub struct ImageHandle {
    image: Option<DynamicImage>,
    ledger: Arc<HandleLedger>,
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("dimensions", &self.dimensions())
            .field("released", &self.is_released())
            .finish()
    }
}

impl ImageHandle {
    /// Take ownership of an already decoded image
    pub fn from_image(image: DynamicImage, ledger: &Arc<HandleLedger>) -> Self {
        ledger.record_acquire();
        Self {
            image: Some(image),
            ledger: Arc::clone(ledger),
        }
    }

    /// Decode raw source bytes, rejecting oversized images before the full
    /// decode allocates their pixel buffer.
    pub fn decode(
        data: &[u8],
        limits: &DecodeLimits,
        ledger: &Arc<HandleLedger>,
    ) -> Result<Self, TransformError> {
        let (width, height) = reader(data)?
            .into_dimensions()
            .map_err(|e| TransformError::decode_failed(e.to_string()))?;
        validate_dimensions(width, height, limits)?;

        let image = reader(data)?
            .decode()
            .map_err(|e| TransformError::decode_failed(e.to_string()))?;

        Ok(Self::from_image(image, ledger))
    }

    pub fn image(&self) -> Result<&DynamicImage, TransformError> {
        self.image.as_ref().ok_or(TransformError::HandleReleased)
    }

    pub fn image_mut(&mut self) -> Result<&mut DynamicImage, TransformError> {
        self.image.as_mut().ok_or(TransformError::HandleReleased)
    }

    /// Supersede the current buffer with a new one produced by an operation.
    /// The old buffer is released and the new one acquired.
    pub fn replace(&mut self, image: DynamicImage) {
        self.release();
        self.ledger.record_acquire();
        self.image = Some(image);
    }

    /// Ledger this handle reports to; secondary images share it
    pub fn ledger(&self) -> &Arc<HandleLedger> {
        &self.ledger
    }

    /// Give up the pixel buffer. The handle counts as released afterwards.
    pub fn into_image(mut self) -> Result<DynamicImage, TransformError> {
        let image = self.image.take().ok_or(TransformError::HandleReleased)?;
        self.ledger.record_release();
        Ok(image)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| (img.width(), img.height()))
    }

    pub fn is_released(&self) -> bool {
        self.image.is_none()
    }

    /// Free the pixel buffer. Calling this on a released handle does nothing.
    pub fn release(&mut self) {
        if self.image.take().is_some() {
            self.ledger.record_release();
        }
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, TransformError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::decode_failed(e.to_string()))
}

/// Reject images whose pixel count exceeds the configured limit
pub fn validate_dimensions(
    width: u32,
    height: u32,
    limits: &DecodeLimits,
) -> Result<(), TransformError> {
    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        return Err(TransformError::ImageBombDetected {
            width,
            height,
            max_pixels: limits.max_pixels,
        });
    }
    Ok(())
}
