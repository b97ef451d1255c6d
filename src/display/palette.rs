//! Conversion of RGB images into the 7-colour panel buffer.
//!
//! The panel understands seven ink colours addressed by a 4-bit index. Two
//! pixels share a byte (high nibble first), rows are packed left to right
//! and top to bottom. Images are Floyd–Steinberg dithered onto the palette
//! so gradients survive the tiny colour set.

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Result, StudioError};

/// Ink colours in panel index order.
pub const PALETTE: [[u8; 3]; 7] = [
    [0, 0, 0],       // black
    [255, 255, 255], // white
    [0, 255, 0],     // green
    [0, 0, 255],     // blue
    [255, 0, 0],     // red
    [255, 255, 0],   // yellow
    [255, 128, 0],   // orange
];

/// Packed panel frame, two pixels per byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PanelBuffer {
    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw packed bytes as sent to the panel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Palette index of the pixel at `(x, y)`.
    pub fn index_at(&self, x: u32, y: u32) -> u8 {
        let i = (y as usize) * (self.width as usize) + x as usize;
        let byte = self.data[i / 2];
        if i % 2 == 0 { byte >> 4 } else { byte & 0x0f }
    }

    /// Render the frame back to RGB, as the panel would show it.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb(PALETTE[usize::from(self.index_at(x, y))])
        })
    }
}

fn nearest(px: [f32; 3]) -> u8 {
    let mut best = 0u8;
    let mut best_dist = f32::MAX;
    for (i, c) in PALETTE.iter().enumerate() {
        let d: f32 = px
            .iter()
            .zip(c.iter())
            .map(|(a, b)| {
                let diff = a - f32::from(*b);
                diff * diff
            })
            .sum();
        if d < best_dist {
            best_dist = d;
            best = i as u8;
        }
    }
    best
}

/// Dither `image` onto the panel palette.
///
/// The image must already have the panel's dimensions; see
/// [`crate::adapt::adapt`].
pub fn to_panel_buffer(image: &DynamicImage, width: u32, height: u32) -> Result<PanelBuffer> {
    if image.width() != width || image.height() != height {
        return Err(StudioError::Display(format!(
            "image is {}x{}, panel expects {width}x{height}",
            image.width(),
            image.height()
        )));
    }

    let rgb = image.to_rgb8();
    let w = width as usize;
    let h = height as usize;
    let mut data = vec![0u8; (w * h).div_ceil(2)];

    // Error carried into the current and next row, three channels per pixel.
    let mut cur = vec![[0f32; 3]; w + 2];
    let mut next = vec![[0f32; 3]; w + 2];

    for y in 0..h {
        for x in 0..w {
            let src = rgb.get_pixel(x as u32, y as u32).0;
            let mut px = [0f32; 3];
            for c in 0..3 {
                px[c] = (f32::from(src[c]) + cur[x + 1][c]).clamp(0.0, 255.0);
            }
            let idx = nearest(px);
            let ink = PALETTE[usize::from(idx)];
            for c in 0..3 {
                let err = px[c] - f32::from(ink[c]);
                cur[x + 2][c] += err * 7.0 / 16.0;
                next[x][c] += err * 3.0 / 16.0;
                next[x + 1][c] += err * 5.0 / 16.0;
                next[x + 2][c] += err * 1.0 / 16.0;
            }

            let i = y * w + x;
            if i % 2 == 0 {
                data[i / 2] |= idx << 4;
            } else {
                data[i / 2] |= idx;
            }
        }
        std::mem::swap(&mut cur, &mut next);
        next.iter_mut().for_each(|e| *e = [0.0; 3]);
    }

    Ok(PanelBuffer {
        width,
        height,
        data,
    })
}
