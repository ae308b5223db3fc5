//! Output encoders
//!
//! Provides a trait-based encoder system that allows:
//! - Choosing the encoder from the requested output format
//! - Consistent quality handling across formats (png ignores it)
//! - Lossy WebP through libwebp, JPEG and PNG through the image crate

use image::DynamicImage;
use std::fmt;
use std::str::FromStr;

use super::error::TransformError;
use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Jpeg,
    Jpg,
    Png,
    #[default]
    WebP,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg | OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" => Ok(OutputFormat::Jpeg),
            "jpg" => Ok(OutputFormat::Jpg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(TransformError::InvalidFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested quality, resolved per encoder
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncoderQuality {
    requested: Option<f32>,
}

impl EncoderQuality {
    pub fn new(requested: Option<f32>) -> Self {
        Self {
            requested: requested.filter(|q| q.is_finite()),
        }
    }

    /// JPEG quality, 1-100
    pub fn jpeg(&self) -> u8 {
        self.requested
            .map(|q| q.round().clamp(1.0, 100.0) as u8)
            .unwrap_or(DEFAULT_JPEG_QUALITY)
    }

    /// WebP quality, 0-100
    pub fn webp(&self) -> f32 {
        self.requested
            .map(|q| q.clamp(0.0, 100.0))
            .unwrap_or(DEFAULT_WEBP_QUALITY)
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
}

impl EncodedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Trait for image encoders
pub trait ImageEncoder: Send + Sync {
    /// Encode raw RGBA8 pixel data
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<Vec<u8>, TransformError>;
}

/// JPEG encoder using the image crate
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<Vec<u8>, TransformError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        // JPEG has no alpha channel
        let rgb_data = rgba_to_rgb(data);

        let mut output = Cursor::new(Vec::new());
        ImageJpegEncoder::new_with_quality(&mut output, quality.jpeg())
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8)
            .map_err(|e| TransformError::encode_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }
}

/// PNG encoder using the image crate
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: EncoderQuality,
    ) -> Result<Vec<u8>, TransformError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        ImagePngEncoder::new(&mut output)
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| TransformError::encode_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    }
}

/// Lossy WebP encoder backed by libwebp
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: EncoderQuality,
    ) -> Result<Vec<u8>, TransformError> {
        let encoded = webp::Encoder::from_rgba(data, width, height)
            .encode_simple(false, quality.webp())
            .map_err(|e| TransformError::encode_failed("webp", format!("{:?}", e)))?;

        Ok(encoded.to_vec())
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg | OutputFormat::Jpg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
        }
    }
}

/// Encode `image` in `format`
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: EncoderQuality,
) -> Result<EncodedImage, TransformError> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(TransformError::encode_failed(
            format.as_str(),
            "image has no pixels",
        ));
    }

    let data = EncoderFactory::create(format).encode(rgba.as_raw(), width, height, quality)?;
    Ok(EncodedImage { data, format })
}

/// Convert RGBA to RGB by discarding the alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}
