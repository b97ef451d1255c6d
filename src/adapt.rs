//! Image adaptation to the fixed display canvas.
//!
//! Generated images arrive at whatever size the provider chose. Before they
//! reach the panel they are resized to the display width (preserving aspect
//! ratio) and then either center-cropped or padded vertically so the result
//! is exactly `target_width × target_height`.
//!
//! An image that already has the target size is returned untouched, which
//! makes [`adapt`] idempotent.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

use crate::error::{Result, StudioError};

/// Resampling filter used for the width fit.
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// How the resized image was fitted to the target height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Source already matched the target; nothing was done.
    Unchanged,
    /// Resized height matched the target exactly.
    Resized,
    /// Resized image was taller; rows were removed from top and bottom.
    Cropped {
        /// Rows removed from the top.
        top: u32,
    },
    /// Resized image was shorter; it was pasted onto a filled canvas.
    Padded {
        /// Row offset of the pasted image.
        top: u32,
    },
}

/// Height of the source after scaling it to `target_width`, rounded to the
/// nearest row (halves round up).
///
/// Never returns zero for non-degenerate inputs.
#[must_use]
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let numerator = u128::from(target_width) * u128::from(height);
    let w = u128::from(width);
    let rounded = (numerator * 2 + w) / (w * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX).max(1)
}

/// Decide how an image of `width × height` is fitted, without touching
/// pixels.
pub fn plan(width: u32, height: u32, target_width: u32, target_height: u32) -> Result<Fit> {
    if width == 0 || height == 0 {
        return Err(StudioError::Adapt(format!(
            "source image has no pixels ({width}x{height})"
        )));
    }
    if target_width == 0 || target_height == 0 {
        return Err(StudioError::Adapt(format!(
            "target canvas has no pixels ({target_width}x{target_height})"
        )));
    }
    if width == target_width && height == target_height {
        return Ok(Fit::Unchanged);
    }

    let scaled = scaled_height(width, height, target_width);
    let fit = match scaled.cmp(&target_height) {
        std::cmp::Ordering::Greater => Fit::Cropped {
            top: (scaled - target_height) / 2,
        },
        std::cmp::Ordering::Less => Fit::Padded {
            top: (target_height - scaled) / 2,
        },
        std::cmp::Ordering::Equal => Fit::Resized,
    };
    Ok(fit)
}

/// Adapt `image` to exactly `target_width × target_height`.
///
/// `fill` is only used when the resized image is shorter than the canvas.
pub fn adapt(
    image: DynamicImage,
    target_width: u32,
    target_height: u32,
    fill: Rgb<u8>,
) -> Result<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    let fit = plan(width, height, target_width, target_height)?;

    if fit == Fit::Unchanged {
        debug!("image already {width}x{height}, no adaptation needed");
        return Ok(image);
    }

    let scaled = scaled_height(width, height, target_width);
    let resized = image.resize_exact(target_width, scaled, RESIZE_FILTER);
    debug!("resized {width}x{height} -> {target_width}x{scaled}");

    let adapted = match fit {
        Fit::Unchanged | Fit::Resized => resized,
        Fit::Cropped { top } => {
            debug!(top, "center-cropping to {target_width}x{target_height}");
            resized.crop_imm(0, top, target_width, target_height)
        }
        Fit::Padded { top } => {
            debug!(top, "padding onto {target_width}x{target_height} canvas");
            let mut canvas = RgbImage::from_pixel(target_width, target_height, fill);
            imageops::replace(&mut canvas, &resized.to_rgb8(), 0, i64::from(top));
            DynamicImage::ImageRgb8(canvas)
        }
    };

    Ok(adapted)
}
