//! # Text Rasterization
//!
//! Text reaches the printer as pixels. The pipeline only needs *something*
//! that turns a string into a [`PixelBuffer`], so the capability is a trait:
//! callers with a real font engine implement [`TextRasterizer`] themselves.
//!
//! [`SpleenRasterizer`] is the built-in implementation. It uses the Spleen
//! bitmap fonts (6x12 and 12x24), scaled by whole pixels, so it needs no font
//! files at runtime.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────── width (384) ────────────┐
//! │            padding                  │
//! │  line 1 ......................      │  line pitch = glyph height * line_height
//! │  line 2 ..............              │
//! │            padding                  │
//! └─────────────────────────────────────┘
//! ```
//!
//! Words wrap greedily; a word longer than a whole line is split by
//! characters. Explicit `\n` starts a new line.

use serde::{Deserialize, Serialize};
use spleen_font::{FONT_6X12, FONT_12X24, PSF2Font};

use super::buffer::PixelBuffer;
use crate::error::{PrintError, PrintResult};
use crate::protocol::bitmap::RASTER_WIDTH;

const INK: [u8; 4] = [0, 0, 0, 255];
const PAPER: [u8; 4] = [255, 255, 255, 255];

/// Horizontal alignment of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Text layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Nominal glyph height in pixels
    pub font_size: usize,
    /// Line pitch as a multiple of the glyph height
    pub line_height: f32,
    /// Horizontal padding in pixels
    pub padding_x: usize,
    /// Vertical padding in pixels
    pub padding_y: usize,
    pub align: Align,
    /// Output width in pixels
    pub width: usize,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 24,
            line_height: 1.4,
            padding_x: 20,
            padding_y: 20,
            align: Align::Left,
            width: RASTER_WIDTH,
        }
    }
}

impl TextStyle {
    /// Centered single-purpose label (e.g. a caption under a photo).
    pub fn label() -> Self {
        Self {
            font_size: 20,
            line_height: 1.0,
            padding_x: 0,
            padding_y: 15,
            align: Align::Center,
            width: RASTER_WIDTH,
        }
    }
}

/// Turns text into pixels.
pub trait TextRasterizer: Send + Sync {
    fn rasterize(&self, text: &str, style: &TextStyle) -> PrintResult<PixelBuffer>;
}

// ============================================================================
// SPLEEN RASTERIZER
// ============================================================================

/// Bitmap-font rasterizer using Spleen glyphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpleenRasterizer;

/// Base font and integer scale chosen for a nominal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FontChoice {
    data: &'static [u8],
    glyph_w: usize,
    glyph_h: usize,
    scale: usize,
}

impl FontChoice {
    fn for_size(font_size: usize) -> Self {
        if font_size < 24 {
            Self {
                data: FONT_6X12,
                glyph_w: 6,
                glyph_h: 12,
                scale: ((font_size as f32 / 12.0).round() as usize).max(1),
            }
        } else {
            Self {
                data: FONT_12X24,
                glyph_w: 12,
                glyph_h: 24,
                scale: ((font_size as f32 / 24.0).round() as usize).max(1),
            }
        }
    }

    fn char_width(&self) -> usize {
        self.glyph_w * self.scale
    }

    fn char_height(&self) -> usize {
        self.glyph_h * self.scale
    }
}

/// Greedy word wrap by character count.
pub fn wrap_lines(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            // Split words that cannot fit on any line
            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > max_chars && line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }

        lines.push(line);
    }

    lines
}

impl TextRasterizer for SpleenRasterizer {
    fn rasterize(&self, text: &str, style: &TextStyle) -> PrintResult<PixelBuffer> {
        let font = FontChoice::for_size(style.font_size);
        let mut psf = PSF2Font::new(font.data)
            .map_err(|_| PrintError::InvalidImage("embedded Spleen font failed to load".into()))?;

        let usable = style.width.saturating_sub(style.padding_x * 2);
        let max_chars = usable / font.char_width();
        let lines = wrap_lines(text, max_chars);

        let pitch = ((font.char_height() as f32 * style.line_height).ceil() as usize).max(font.char_height());
        let height = style.padding_y * 2 + pitch * lines.len();
        let mut canvas = PixelBuffer::filled(style.width, height, PAPER);

        for (row, line) in lines.iter().enumerate() {
            let line_w = line.chars().count() * font.char_width();
            let x0 = match style.align {
                Align::Left => style.padding_x,
                Align::Center => (style.width.saturating_sub(line_w)) / 2,
                Align::Right => style.width.saturating_sub(style.padding_x + line_w),
            };
            // Center the glyph inside the line pitch
            let y0 = style.padding_y + row * pitch + (pitch - font.char_height()) / 2;

            for (i, ch) in line.chars().enumerate() {
                let utf8 = ch.to_string();
                let Some(glyph) = psf.glyph_for_utf8(utf8.as_bytes()) else {
                    continue;
                };
                let cx = x0 + i * font.char_width();
                for (gy, glyph_row) in glyph.enumerate() {
                    for (gx, on) in glyph_row.enumerate() {
                        if !on {
                            continue;
                        }
                        for sy in 0..font.scale {
                            for sx in 0..font.scale {
                                let px = cx + gx * font.scale + sx;
                                let py = y0 + gy * font.scale + sy;
                                if px < canvas.width() && py < canvas.height() {
                                    canvas.set_pixel(px, py, INK);
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_greedy() {
        assert_eq!(wrap_lines("the quick brown fox", 10), vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_long_word_and_newlines() {
        assert_eq!(wrap_lines("abcdefghij\nxy", 4), vec!["abcd", "efgh", "ij", "xy"]);
        assert_eq!(wrap_lines("", 4), vec![""]);
    }

    #[test]
    fn test_font_choice() {
        assert_eq!(FontChoice::for_size(12).char_height(), 12);
        assert_eq!(FontChoice::for_size(20).char_height(), 24);
        assert_eq!(FontChoice::for_size(24).char_width(), 12);
        assert_eq!(FontChoice::for_size(48).char_width(), 24);
    }

    #[test]
    fn test_rasterize_dimensions_and_ink() {
        let style = TextStyle::default();
        let img = SpleenRasterizer.rasterize("HELLO\nWORLD", &style).unwrap();
        assert_eq!(img.width(), RASTER_WIDTH);
        // 2 lines * ceil(24 * 1.4) + 2 * 20 padding
        assert_eq!(img.height(), 2 * 34 + 40);

        let inked = img.as_bytes().chunks_exact(4).filter(|px| px[0] == 0).count();
        assert!(inked > 0);
        // Padding rows stay blank
        for x in 0..img.width() {
            assert_eq!(img.pixel(x, 0), PAPER);
        }
    }

    #[test]
    fn test_label_is_centered() {
        let img = SpleenRasterizer.rasterize("I", &TextStyle::label()).unwrap();
        let inked: Vec<usize> = (0..img.width())
            .filter(|&x| (0..img.height()).any(|y| img.pixel(x, y)[0] == 0))
            .collect();
        let mid = (inked[0] + inked[inked.len() - 1]) / 2;
        assert!((mid as isize - 192).abs() <= 12, "mid {}", mid);
    }
}
