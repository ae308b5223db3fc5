//! Two-image operations
//!
//! Both operations draw a secondary image onto the primary one and keep the
//! primary's dimensions. The secondary URL has already been consumed by the
//! executor, so `params` starts with the first parameter after the URL.

use image::{DynamicImage, Rgba, RgbaImage};

use super::color::rgba_mut;
use super::params::Params;
use crate::transform::error::OperationError;

/// Separable blend modes for `blend!url[,mode]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Over,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Plus,
    Exclusion,
}

impl std::str::FromStr for BlendMode {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "over" | "normal" => Ok(BlendMode::Over),
            "multiply" => Ok(BlendMode::Multiply),
            "screen" => Ok(BlendMode::Screen),
            "overlay" => Ok(BlendMode::Overlay),
            "darken" => Ok(BlendMode::Darken),
            "lighten" => Ok(BlendMode::Lighten),
            "difference" => Ok(BlendMode::Difference),
            "plus" | "add" => Ok(BlendMode::Plus),
            "exclusion" => Ok(BlendMode::Exclusion),
            _ => Err(OperationError::InvalidParameter {
                name: "mode",
                value: s.to_string(),
            }),
        }
    }
}

impl BlendMode {
    /// Mix a backdrop and a source channel, both normalized to [0, 1]
    fn mix(self, cb: f32, cs: f32) -> f32 {
        match self {
            BlendMode::Over => cs,
            BlendMode::Multiply => cb * cs,
            BlendMode::Screen => cb + cs - cb * cs,
            BlendMode::Overlay => {
                if cb <= 0.5 {
                    2.0 * cb * cs
                } else {
                    1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
                }
            }
            BlendMode::Darken => cb.min(cs),
            BlendMode::Lighten => cb.max(cs),
            BlendMode::Difference => (cb - cs).abs(),
            BlendMode::Plus => (cb + cs).min(1.0),
            BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
        }
    }
}

/// Composite `source` over `backdrop` with the given blend mode.
///
/// Porter-Duff "over" on the alpha channel; where the backdrop is opaque the
/// source color is replaced by the mode's mix of both colors.
fn composite(backdrop: Rgba<u8>, source: Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    let as_ = source[3] as f32 / 255.0;
    let ab = backdrop[3] as f32 / 255.0;

    let out_alpha = as_ + ab * (1.0 - as_);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |b: u8, s: u8| -> u8 {
        let cb = b as f32 / 255.0;
        let cs = s as f32 / 255.0;
        let mixed = (1.0 - ab) * cs + ab * mode.mix(cb, cs);
        let result = (mixed * as_ + cb * ab * (1.0 - as_)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(backdrop[0], source[0]),
        channel(backdrop[1], source[1]),
        channel(backdrop[2], source[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Draw `overlay` onto `base` with its top-left corner at (x, y). Pixels
/// falling outside `base` are clipped.
fn draw(base: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64, mode: BlendMode) {
    let (base_w, base_h) = (base.width() as i64, base.height() as i64);
    let (over_w, over_h) = (overlay.width() as i64, overlay.height() as i64);

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = x.saturating_add(over_w).min(base_w);
    let y_end = y.saturating_add(over_h).min(base_h);

    for by in y_start..y_end {
        for bx in x_start..x_end {
            let src = *overlay.get_pixel((bx - x) as u32, (by - y) as u32);
            let dst = base.get_pixel_mut(bx as u32, by as u32);
            *dst = composite(*dst, src, mode);
        }
    }
}

/// `watermark!url,x,y`
pub fn watermark(
    image: &mut DynamicImage,
    overlay: &DynamicImage,
    params: Params<'_>,
) -> Result<(), OperationError> {
    let x: i64 = params.optional(0, "x", 0)?;
    let y: i64 = params.optional(1, "y", 0)?;
    draw(rgba_mut(image), &overlay.to_rgba8(), x, y, BlendMode::Over);
    Ok(())
}

/// `blend!url[,mode]`
pub fn blend(
    image: &mut DynamicImage,
    overlay: &DynamicImage,
    params: Params<'_>,
) -> Result<(), OperationError> {
    let mode: BlendMode = match params.raw(0) {
        Some(raw) => raw.parse()?,
        None => BlendMode::Over,
    };
    draw(rgba_mut(image), &overlay.to_rgba8(), 0, 0, mode);
    Ok(())
}
