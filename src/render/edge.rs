//! # Edge Detection
//!
//! Turns a photograph into line art that survives a 1-bit thermal head.
//!
//! ## Algorithms
//!
//! | Algorithm | Output | Notes |
//! |-----------|--------|-------|
//! | Sobel | 255 where gradient > threshold | cheap, thick edges, border ring left at 0 |
//! | Canny | 255 on thin hysteresis edges | blur + NMS + hysteresis |
//!
//! Both produce *white edges on black*. The printer burns marks where the
//! value is dark, so callers [`invert`] the result before packing.
//!
//! ## Sobel Kernels
//!
//! ```text
//!        Gx                 Gy
//!   -1   0  +1         -1  -2  -1
//!   -2   0  +2          0   0   0
//!   -1   0  +1         +1  +2  +1
//! ```
//!
//! ## Canny Hysteresis
//!
//! Tracking is a single pass: a weak pixel (`low <= m < high`) survives only
//! if one of its 8 neighbours is strong. Weak pixels that connect to a strong
//! edge only through other weak pixels are dropped. This is a known
//! limitation of the tracker, kept so output matches existing prints.

use rayon::prelude::*;

use super::buffer::{GrayscaleBuffer, clamp_u8};

/// Default Sobel magnitude threshold.
pub const DEFAULT_SOBEL_THRESHOLD: f64 = 50.0;

const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Canny parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyParams {
    pub low: f64,
    pub high: f64,
    /// Gaussian blur sigma
    pub sigma: f64,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 100.0,
            sigma: 1.4,
        }
    }
}

/// Edge detector selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeAlgorithm {
    Sobel { threshold: f64 },
    Canny(CannyParams),
}

impl EdgeAlgorithm {
    /// Run the detector. Output is white-on-black.
    pub fn detect(&self, gray: &GrayscaleBuffer) -> GrayscaleBuffer {
        match self {
            EdgeAlgorithm::Sobel { threshold } => sobel(gray, *threshold),
            EdgeAlgorithm::Canny(params) => canny(gray, params),
        }
    }
}

impl Default for EdgeAlgorithm {
    fn default() -> Self {
        EdgeAlgorithm::Sobel {
            threshold: DEFAULT_SOBEL_THRESHOLD,
        }
    }
}

/// 3x3 Sobel response at an interior pixel.
#[inline]
fn sobel_at(gray: &GrayscaleBuffer, x: usize, y: usize) -> (f64, f64) {
    let mut gx = 0i32;
    let mut gy = 0i32;
    for (ky, (row_x, row_y)) in SOBEL_X.iter().zip(SOBEL_Y.iter()).enumerate() {
        for kx in 0..3 {
            let p = gray.get(x + kx - 1, y + ky - 1) as i32;
            gx += p * row_x[kx];
            gy += p * row_y[kx];
        }
    }
    (gx as f64, gy as f64)
}

// ============================================================================
// SOBEL
// ============================================================================

/// Sobel edge detection with a hard threshold.
///
/// Output has the same dimensions as the input and contains only 0 and 255.
/// The outermost row and column ring is never written.
///
/// ## Example
///
/// ```
/// use catprint::render::buffer::GrayscaleBuffer;
/// use catprint::render::edge::sobel;
///
/// let flat = GrayscaleBuffer::new(16, 16, 200);
/// let edges = sobel(&flat, 50.0);
/// assert!(edges.data.iter().all(|&v| v == 0));
/// ```
pub fn sobel(gray: &GrayscaleBuffer, threshold: f64) -> GrayscaleBuffer {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayscaleBuffer::new(w, h, 0);
    if w < 3 || h < 3 {
        return out;
    }

    out.data
        .par_chunks_mut(w)
        .enumerate()
        .filter(|(y, _)| *y >= 1 && *y < h - 1)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let (gx, gy) = sobel_at(gray, x, y);
                let magnitude = (gx * gx + gy * gy).sqrt();
                row[x] = if magnitude > threshold { 255 } else { 0 };
            }
        });

    out
}

// ============================================================================
// CANNY
// ============================================================================

/// Gradient magnitude and direction (radians, `atan2(gy, gx)`).
///
/// Border pixels have magnitude and direction 0.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub magnitude: Vec<f64>,
    pub direction: Vec<f64>,
}

/// Canny edge detection.
pub fn canny(gray: &GrayscaleBuffer, params: &CannyParams) -> GrayscaleBuffer {
    let blurred = gaussian_blur(gray, params.sigma);
    let gradients = gradients(&blurred);
    let suppressed = non_maximum_suppression(&gradients);
    let edges = hysteresis(&suppressed, gray.width, gray.height, params.low, params.high);

    GrayscaleBuffer {
        width: gray.width,
        height: gray.height,
        data: edges.into_iter().map(|e| if e { 255 } else { 0 }).collect(),
    }
}

/// Normalized 2-D Gaussian kernel of side `ceil(sigma * 3) * 2 + 1`.
///
/// Returned row-major; weights sum to 1.
pub fn gaussian_kernel(sigma: f64) -> (usize, Vec<f64>) {
    let size = (sigma * 3.0).ceil() as usize * 2 + 1;
    let half = (size / 2) as f64;
    let mut kernel = Vec::with_capacity(size * size);

    for y in 0..size {
        for x in 0..size {
            let dx = x as f64 - half;
            let dy = y as f64 - half;
            kernel.push((-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp());
        }
    }

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    (size, kernel)
}

/// Gaussian blur with edge-clamped sampling.
pub fn gaussian_blur(gray: &GrayscaleBuffer, sigma: f64) -> GrayscaleBuffer {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayscaleBuffer::new(w, h, 0);
    if w == 0 || h == 0 {
        return out;
    }
    let (size, kernel) = gaussian_kernel(sigma);
    let half = (size / 2) as isize;

    out.data
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, dst) in row.iter_mut().enumerate() {
                let mut acc = 0.0f64;
                for ky in 0..size {
                    let sy = (y as isize + ky as isize - half).clamp(0, h as isize - 1) as usize;
                    for kx in 0..size {
                        let sx = (x as isize + kx as isize - half).clamp(0, w as isize - 1) as usize;
                        acc += gray.get(sx, sy) as f64 * kernel[ky * size + kx];
                    }
                }
                *dst = clamp_u8(acc);
            }
        });

    out
}

/// Sobel gradients for every interior pixel.
pub fn gradients(gray: &GrayscaleBuffer) -> Gradients {
    let (w, h) = (gray.width, gray.height);
    let mut magnitude = vec![0.0; w * h];
    let mut direction = vec![0.0; w * h];

    if w >= 3 && h >= 3 {
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let (gx, gy) = sobel_at(gray, x, y);
                let idx = y * w + x;
                magnitude[idx] = (gx * gx + gy * gy).sqrt();
                direction[idx] = gy.atan2(gx);
            }
        }
    }

    Gradients {
        width: w,
        height: h,
        magnitude,
        direction,
    }
}

/// Thin edges to one pixel by keeping only local maxima along the gradient.
///
/// Direction is folded into [0, 180) and quantized into four bins
/// (0, 45, 90 and 135 degrees).
pub fn non_maximum_suppression(g: &Gradients) -> Vec<f64> {
    let (w, h) = (g.width, g.height);
    let mut out = vec![0.0; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    let m = &g.magnitude;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let angle = g.direction[idx].to_degrees();
            let angle = ((angle % 180.0) + 180.0) % 180.0;

            let (n1, n2) = if angle < 22.5 || angle >= 157.5 {
                (m[idx - 1], m[idx + 1])
            } else if angle < 67.5 {
                (m[idx - w + 1], m[idx + w - 1])
            } else if angle < 112.5 {
                (m[idx - w], m[idx + w])
            } else {
                (m[idx - w - 1], m[idx + w + 1])
            };

            if m[idx] >= n1 && m[idx] >= n2 {
                out[idx] = m[idx];
            }
        }
    }

    out
}

/// Double threshold plus one-hop edge tracking.
pub fn hysteresis(edges: &[f64], width: usize, height: usize, low: f64, high: f64) -> Vec<bool> {
    let strong: Vec<bool> = edges.iter().map(|&e| e >= high).collect();
    let mut out = strong.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let idx = y * width + x;
            let e = edges[idx];
            if e >= low && e < high {
                let neighbours = [
                    idx - width - 1,
                    idx - width,
                    idx - width + 1,
                    idx - 1,
                    idx + 1,
                    idx + width - 1,
                    idx + width,
                    idx + width + 1,
                ];
                if neighbours.iter().any(|&n| strong[n]) {
                    out[idx] = true;
                }
            }
        }
    }

    out
}

// ============================================================================
// INVERSION
// ============================================================================

/// Pointwise `255 - v`.
pub fn invert(gray: &GrayscaleBuffer) -> GrayscaleBuffer {
    GrayscaleBuffer {
        width: gray.width,
        height: gray.height,
        data: gray.data.iter().map(|&v| 255 - v).collect(),
    }
}
