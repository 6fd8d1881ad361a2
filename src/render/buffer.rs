//! # Raster Buffers
//!
//! Explicit pixel containers used between pipeline stages:
//!
//! | Type | Per pixel | Produced by |
//! |------|-----------|-------------|
//! | [`PixelBuffer`] | RGBA (4 bytes) | camera, image files, text rasterizer |
//! | [`GrayscaleBuffer`] | intensity 0-255 | luminance conversion, edge detection, dithering |
//! | [`BinaryMask`] | `bool` mark | thresholding, consumed by the bitmap packer |
//!
//! All buffers are row-major with a top-left origin.
//!
//! ## Luminance
//!
//! ```text
//! Y = 0.299 R + 0.587 G + 0.114 B
//! ```
//!
//! The same weights are used by every stage. Stored intensities are rounded
//! to the nearest `u8` (ties to even) and clamped; error diffusion keeps the
//! unrounded `f32` value.

use image::{RgbaImage, imageops::FilterType};

use crate::error::{PrintError, PrintResult};

/// Intensity below which a processed pixel counts as a printed dot.
pub const MARK_LEVEL: u8 = 128;

/// Round and clamp a computed intensity into a stored byte.
#[inline]
pub fn clamp_u8(v: f64) -> u8 {
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Luminance of one RGB triple.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// RGBA pixels. Invariant: `data.len() == width * height * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking the length invariant.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> PrintResult<Self> {
        if data.len() != width * height * 4 {
            return Err(PrintError::InvalidImage(format!(
                "{}x{} RGBA needs {} bytes, got {}",
                width,
                height,
                width * height * 4,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer filled with one color.
    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGBA of the pixel at (x, y).
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = (y * self.width + x) * 4;
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Luminance stored as `f32`, one value per pixel.
    pub fn luminance_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|px| luminance(px[0], px[1], px[2]) as f32)
            .collect()
    }

    /// Luminance rounded to `u8`.
    pub fn to_grayscale(&self) -> GrayscaleBuffer {
        let data = self
            .data
            .chunks_exact(4)
            .map(|px| clamp_u8(luminance(px[0], px[1], px[2])))
            .collect();
        GrayscaleBuffer {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Downscale so the width fits `max_width`, preserving aspect ratio.
    ///
    /// Never upscales. The target size is `floor(w * s) x floor(h * s)` with
    /// `s = min(max_width / w, 1)`. Resampling uses a bilinear (triangle)
    /// filter.
    pub fn fit_width(&self, max_width: usize) -> PixelBuffer {
        if self.width <= max_width || self.width == 0 {
            return self.clone();
        }
        let scale = max_width as f64 / self.width as f64;
        let new_w = ((self.width as f64 * scale).floor() as u32).max(1);
        let new_h = ((self.height as f64 * scale).floor() as u32).max(1);

        let resized = image::imageops::resize(&self.to_rgba_image(), new_w, new_h, FilterType::Triangle);
        PixelBuffer::from(resized)
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length invariant guarantees the buffer fits
        RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width as u32, self.height as u32))
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self {
            width: w as usize,
            height: h as usize,
            data: img.into_raw(),
        }
    }
}

// ============================================================================
// GRAYSCALE BUFFER
// ============================================================================

/// One intensity per pixel, 0 = black, 255 = white.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayscaleBuffer {
    /// All pixels set to `value`.
    pub fn new(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> PrintResult<Self> {
        if data.len() != width * height {
            return Err(PrintError::InvalidImage(format!(
                "{}x{} grayscale needs {} bytes, got {}",
                width,
                height,
                width * height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Pixels darker than `level` become marks.
    pub fn to_mask(&self, level: u8) -> BinaryMask {
        BinaryMask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| v < level).collect(),
        }
    }

    /// Expand back to opaque RGBA (for previews).
    pub fn to_pixels(&self) -> PixelBuffer {
        let mut data = Vec::with_capacity(self.data.len() * 4);
        for &v in &self.data {
            data.extend_from_slice(&[v, v, v, 255]);
        }
        PixelBuffer {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

// ============================================================================
// BINARY MASK
// ============================================================================

/// `true` = print a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: usize, height: usize, mark: bool) -> Self {
        Self {
            width,
            height,
            data: vec![mark; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, mark: bool) {
        self.data[y * self.width + x] = mark;
    }

    pub fn count_marks(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }
}
