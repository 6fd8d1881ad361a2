//! Image processing presets: pixel buffer in, printable grayscale out.

use serde::{Deserialize, Serialize};

use super::buffer::{GrayscaleBuffer, PixelBuffer};
use super::dither::{self, DitheringAlgorithm};
use super::edge::{self, CannyParams, EdgeAlgorithm};

/// How a photo is turned into dots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ImageMode {
    /// Sobel line art
    Sobel {
        #[serde(default = "default_sobel_threshold")]
        threshold: f64,
        #[serde(default = "default_true")]
        invert: bool,
    },
    /// Canny line art
    Canny {
        #[serde(default = "default_canny_low")]
        low: f64,
        #[serde(default = "default_canny_high")]
        high: f64,
        #[serde(default = "default_sigma")]
        sigma: f64,
        #[serde(default = "default_true")]
        invert: bool,
    },
    /// Photographic error diffusion
    Dither { algorithm: DitheringAlgorithm },
}

fn default_sobel_threshold() -> f64 {
    edge::DEFAULT_SOBEL_THRESHOLD
}

fn default_canny_low() -> f64 {
    CannyParams::default().low
}

fn default_canny_high() -> f64 {
    CannyParams::default().high
}

fn default_sigma() -> f64 {
    CannyParams::default().sigma
}

fn default_true() -> bool {
    true
}

impl Default for ImageMode {
    fn default() -> Self {
        ImageMode::Sobel {
            threshold: edge::DEFAULT_SOBEL_THRESHOLD,
            invert: true,
        }
    }
}

impl ImageMode {
    /// Process a buffer. Dark output pixels (< 128) become printed dots.
    pub fn apply(&self, pixels: &PixelBuffer) -> GrayscaleBuffer {
        match *self {
            ImageMode::Sobel { threshold, invert } => {
                let edges = EdgeAlgorithm::Sobel { threshold }.detect(&pixels.to_grayscale());
                if invert { edge::invert(&edges) } else { edges }
            }
            ImageMode::Canny {
                low,
                high,
                sigma,
                invert,
            } => {
                let edges = EdgeAlgorithm::Canny(CannyParams { low, high, sigma }).detect(&pixels.to_grayscale());
                if invert { edge::invert(&edges) } else { edges }
            }
            ImageMode::Dither { algorithm } => dither::dither(pixels, algorithm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sobel_inverts_to_white_paper() {
        // Flat image has no edges; inverted output is all white (no dots)
        let out = ImageMode::default().apply(&PixelBuffer::filled(20, 20, [90, 90, 90, 255]));
        assert!(out.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_mode_from_json() {
        let mode: ImageMode = serde_json::from_str(r#"{"mode":"canny","low":30}"#).unwrap();
        assert_eq!(
            mode,
            ImageMode::Canny {
                low: 30.0,
                high: 100.0,
                sigma: 1.4,
                invert: true
            }
        );
        let mode: ImageMode = serde_json::from_str(r#"{"mode":"dither","algorithm":"atkinson"}"#).unwrap();
        assert_eq!(
            mode,
            ImageMode::Dither {
                algorithm: DitheringAlgorithm::Atkinson
            }
        );
    }
}
