//! Color and filter operations

use image::{DynamicImage, RgbaImage};

use super::params::Params;
use super::StepResult;
use crate::transform::error::OperationError;

/// Normalize the image to RGBA8 in place and borrow its buffer.
pub(crate) fn rgba_mut(image: &mut DynamicImage) -> &mut RgbaImage {
    if !matches!(image, DynamicImage::ImageRgba8(_)) {
        *image = DynamicImage::ImageRgba8(image.to_rgba8());
    }
    match image {
        DynamicImage::ImageRgba8(buffer) => buffer,
        _ => unreachable!("image was converted to RGBA8 above"),
    }
}

/// Rec. 601 luma
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

/// Gray values in all three channels; alpha is preserved.
pub fn grayscale(image: &mut DynamicImage, _params: Params<'_>) -> StepResult {
    for pixel in rgba_mut(image).pixels_mut() {
        let y = luma(pixel[0], pixel[1], pixel[2]);
        pixel[0] = y;
        pixel[1] = y;
        pixel[2] = y;
    }
    Ok(None)
}

pub fn sepia(image: &mut DynamicImage, _params: Params<'_>) -> StepResult {
    for pixel in rgba_mut(image).pixels_mut() {
        let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        pixel[0] = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0) as u8;
        pixel[1] = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0) as u8;
        pixel[2] = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0) as u8;
    }
    Ok(None)
}

pub fn invert(image: &mut DynamicImage, _params: Params<'_>) -> StepResult {
    image.invert();
    Ok(None)
}

/// `brighten!amount`, negative amounts darken
pub fn brighten(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let amount: i32 = params.required(0, "amount")?;
    Ok(Some(image.brighten(amount)))
}

/// `darken!amount`
pub fn darken(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let amount: i32 = params.required(0, "amount")?;
    Ok(Some(image.brighten(amount.saturating_neg())))
}

/// `adjust_contrast!contrast`, positive increases, negative decreases
pub fn adjust_contrast(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let contrast: f32 = params.required(0, "contrast")?;
    if !contrast.is_finite() {
        return Err(OperationError::InvalidParameter {
            name: "contrast",
            value: contrast.to_string(),
        });
    }
    Ok(Some(image.adjust_contrast(contrast)))
}

/// `hue_rotate!degrees`
pub fn hue_rotate(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let degrees: i32 = params.required(0, "degrees")?;
    Ok(Some(image.huerotate(degrees)))
}

/// `threshold!level`: luma above `level` turns white, the rest black
pub fn threshold(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let level: u8 = params.required(0, "level")?;
    for pixel in rgba_mut(image).pixels_mut() {
        let value = if luma(pixel[0], pixel[1], pixel[2]) > level {
            255
        } else {
            0
        };
        pixel[0] = value;
        pixel[1] = value;
        pixel[2] = value;
    }
    Ok(None)
}

/// `gaussian_blur!radius`
pub fn gaussian_blur(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let radius: f32 = params.required(0, "radius")?;
    if !(radius.is_finite() && radius > 0.0) {
        return Err(OperationError::InvalidParameter {
            name: "radius",
            value: radius.to_string(),
        });
    }
    Ok(Some(image.blur(radius)))
}

/// `sharpen[!sigma[,threshold]]`, an unsharp mask
pub fn sharpen(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let sigma: f32 = params.optional(0, "sigma", 1.0)?;
    let threshold: i32 = params.optional(1, "threshold", 2)?;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(OperationError::InvalidParameter {
            name: "sigma",
            value: sigma.to_string(),
        });
    }
    Ok(Some(image.unsharpen(sigma, threshold)))
}
