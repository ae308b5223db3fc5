//! Geometry operations: resize, crop, rotate, flip

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::DynamicImage;
use std::num::NonZeroU32;

use super::params::Params;
use super::StepResult;
use crate::constants::MAX_OUTPUT_DIMENSION;
use crate::transform::error::OperationError;

/// Map the numeric sampling filter of `resize!w,h,filter` to a resize algorithm.
///
/// 1 nearest, 2 triangle, 3 catmull-rom, 4 gaussian (mitchell), 5 lanczos3.
pub fn sampling_filter(code: u8) -> Result<ResizeAlg, OperationError> {
    match code {
        1 => Ok(ResizeAlg::Nearest),
        2 => Ok(ResizeAlg::Convolution(FilterType::Bilinear)),
        3 => Ok(ResizeAlg::Convolution(FilterType::CatmullRom)),
        4 => Ok(ResizeAlg::Convolution(FilterType::Mitchell)),
        5 => Ok(ResizeAlg::Convolution(FilterType::Lanczos3)),
        _ => Err(OperationError::InvalidParameter {
            name: "filter",
            value: code.to_string(),
        }),
    }
}

fn output_dimension(value: u32, name: &'static str) -> Result<NonZeroU32, OperationError> {
    if value > MAX_OUTPUT_DIMENSION {
        return Err(OperationError::Unsupported(format!(
            "{} {} exceeds maximum {}",
            name, value, MAX_OUTPUT_DIMENSION
        )));
    }
    NonZeroU32::new(value).ok_or(OperationError::InvalidParameter {
        name,
        value: value.to_string(),
    })
}

/// `resize!width,height[,filter]`
pub fn resize(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let width = output_dimension(params.required(0, "width")?, "width")?;
    let height = output_dimension(params.required(1, "height")?, "height")?;
    let pixels = u64::from(width.get()) * u64::from(height.get());
    if pixels > params.max_pixels() {
        return Err(OperationError::Unsupported(format!(
            "resize to {}x{} exceeds the {} pixel limit",
            width,
            height,
            params.max_pixels()
        )));
    }
    let algorithm = sampling_filter(params.optional(2, "filter", 5u8)?)?;

    resize_to(image, width, height, algorithm).map(Some)
}

/// Resize using fast-image-resize on an RGBA8 copy of the image
pub fn resize_to(
    image: &DynamicImage,
    width: NonZeroU32,
    height: NonZeroU32,
    algorithm: ResizeAlg,
) -> Result<DynamicImage, OperationError> {
    let src_width = NonZeroU32::new(image.width())
        .ok_or_else(|| OperationError::Unsupported("source width is 0".to_string()))?;
    let src_height = NonZeroU32::new(image.height())
        .ok_or_else(|| OperationError::Unsupported("source height is 0".to_string()))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        image.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| OperationError::Unsupported(format!("failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(width, height, PixelType::U8x4);

    let mut resizer = Resizer::new(algorithm);
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| OperationError::Unsupported(format!("resize failed: {:?}", e)))?;

    let rgba = image::RgbaImage::from_raw(width.get(), height.get(), dst_image.into_vec())
        .ok_or_else(|| OperationError::Unsupported("failed to create output buffer".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

/// `crop!x1,y1,x2,y2` keeps the rectangle [x1, x2) x [y1, y2)
pub fn crop(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let x1: u32 = params.required(0, "x1")?;
    let y1: u32 = params.required(1, "y1")?;
    let x2: u32 = params.required(2, "x2")?;
    let y2: u32 = params.required(3, "y2")?;

    if x2 <= x1 || y2 <= y1 {
        return Err(OperationError::Unsupported(format!(
            "empty crop rectangle ({},{})-({},{})",
            x1, y1, x2, y2
        )));
    }
    if x2 > image.width() || y2 > image.height() {
        return Err(OperationError::Unsupported(format!(
            "crop rectangle ({},{})-({},{}) outside {}x{} image",
            x1,
            y1,
            x2,
            y2,
            image.width(),
            image.height()
        )));
    }

    Ok(Some(image.crop_imm(x1, y1, x2 - x1, y2 - y1)))
}

/// `rotate!degrees`, multiples of 90 in either direction
pub fn rotate(image: &mut DynamicImage, params: Params<'_>) -> StepResult {
    let degrees: i32 = params.required(0, "degrees")?;
    if degrees % 90 != 0 {
        return Err(OperationError::Unsupported(format!(
            "rotation by {} degrees, only multiples of 90 are supported",
            degrees
        )));
    }

    match degrees.rem_euclid(360) {
        90 => Ok(Some(image.rotate90())),
        180 => Ok(Some(image.rotate180())),
        270 => Ok(Some(image.rotate270())),
        _ => Ok(None),
    }
}

pub fn fliph(image: &mut DynamicImage, _params: Params<'_>) -> StepResult {
    image::imageops::flip_horizontal_in_place(image);
    Ok(None)
}

pub fn flipv(image: &mut DynamicImage, _params: Params<'_>) -> StepResult {
    image::imageops::flip_vertical_in_place(image);
    Ok(None)
}
