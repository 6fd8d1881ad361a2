//! # Bitmap Packing
//!
//! The print head is a fixed row of 384 heating elements. Every draw command
//! carries exactly one row, packed 8 dots per byte:
//!
//! ```text
//! 384 dots / 8 = 48 bytes per row
//! ```
//!
//! ## Bit Order
//!
//! Firmware variants disagree on which bit is the leftmost dot, so the order
//! comes from the printer profile:
//!
//! ```text
//! dots:        █ █ ░ ░ ░ ░ ░ ░
//! MSB-first:   0b1100_0000 = 0xC0   (bit 7 = leftmost)
//! LSB-first:   0b0000_0011 = 0x03   (bit 0 = leftmost)
//! ```
//!
//! ## Cropping and Padding
//!
//! Columns past the raster width are dropped, columns past the image width
//! are blank. Each row is always exactly `ceil(raster_width / 8)` bytes.
//!
//! ## Example
//!
//! ```
//! use catprint::protocol::bitmap::{BitOrder, BitmapPacker};
//! use catprint::render::buffer::BinaryMask;
//!
//! let mask = BinaryMask::new(384, 200, true);
//! let rows = BitmapPacker::new(BitOrder::MsbFirst).pack_mask(&mask);
//!
//! assert_eq!(rows.len(), 200);
//! assert!(rows.iter().all(|row| row.len() == 48 && row.iter().all(|&b| b == 0xFF)));
//! ```

use serde::{Deserialize, Serialize};

use crate::render::buffer::{BinaryMask, GrayscaleBuffer, MARK_LEVEL};

/// Print head width in dots.
pub const RASTER_WIDTH: usize = 384;

/// Bytes per packed row at [`RASTER_WIDTH`].
pub const BYTES_PER_LINE: usize = RASTER_WIDTH / 8;

/// Which bit of a byte holds the leftmost dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BitOrder {
    /// Bit 0 = leftmost dot
    LsbFirst,
    /// Bit 7 = leftmost dot
    MsbFirst,
}

impl BitOrder {
    /// Bit mask for a dot at `x` within its byte.
    #[inline]
    pub fn bit(self, x: usize) -> u8 {
        match self {
            BitOrder::LsbFirst => 1 << (x % 8),
            BitOrder::MsbFirst => 1 << (7 - x % 8),
        }
    }
}

/// Packs masks into fixed-width printer rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapPacker {
    pub raster_width: usize,
    pub bit_order: BitOrder,
}

impl BitmapPacker {
    /// Packer for the standard 384-dot head.
    pub fn new(bit_order: BitOrder) -> Self {
        Self {
            raster_width: RASTER_WIDTH,
            bit_order,
        }
    }

    /// Bytes in every packed row.
    pub fn row_bytes(&self) -> usize {
        self.raster_width.div_ceil(8)
    }

    /// Pack one mask row.
    pub fn pack_row(&self, mask: &BinaryMask, y: usize) -> Vec<u8> {
        let mut row = vec![0u8; self.row_bytes()];
        if y >= mask.height {
            return row;
        }
        for x in 0..mask.width.min(self.raster_width) {
            if mask.get(x, y) {
                row[x / 8] |= self.bit_order.bit(x);
            }
        }
        row
    }

    /// Pack every row of a mask.
    pub fn pack_mask(&self, mask: &BinaryMask) -> Vec<Vec<u8>> {
        (0..mask.height).map(|y| self.pack_row(mask, y)).collect()
    }

    /// Pack a processed grayscale image; values below 128 are printed.
    pub fn pack(&self, gray: &GrayscaleBuffer) -> Vec<Vec<u8>> {
        self.pack_mask(&gray.to_mask(MARK_LEVEL))
    }

    /// Pack and pad with blank rows up to `min_rows`.
    pub fn pack_rows(&self, mask: &BinaryMask, min_rows: usize) -> Vec<Vec<u8>> {
        let rows = mask.height.max(min_rows);
        (0..rows).map(|y| self.pack_row(mask, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mask_from_row(pixels: &[bool]) -> BinaryMask {
        BinaryMask {
            width: pixels.len(),
            height: 1,
            data: pixels.to_vec(),
        }
    }

    #[test]
    fn test_bit_orders_disagree() {
        let mask = mask_from_row(&[true, true, false, false, false, false, false, false]);
        assert_eq!(BitmapPacker::new(BitOrder::MsbFirst).pack_row(&mask, 0)[0], 0xC0);
        assert_eq!(BitmapPacker::new(BitOrder::LsbFirst).pack_row(&mask, 0)[0], 0x03);
    }

    #[test]
    fn test_row_length_is_fixed() {
        for width in [0, 1, 7, 100, 383, 384, 385, 1000] {
            let mask = BinaryMask::new(width, 2, true);
            for order in [BitOrder::LsbFirst, BitOrder::MsbFirst] {
                let rows = BitmapPacker::new(order).pack_mask(&mask);
                assert!(rows.iter().all(|r| r.len() == BYTES_PER_LINE), "width {}", width);
            }
        }
    }

    #[test]
    fn test_narrow_image_is_zero_padded() {
        let mask = BinaryMask::new(12, 1, true);
        let row = BitmapPacker::new(BitOrder::MsbFirst).pack_row(&mask, 0);
        assert_eq!(&row[..2], &[0xFF, 0xF0]);
        assert!(row[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wide_image_is_cropped() {
        let mut mask = BinaryMask::new(400, 1, false);
        for x in 384..400 {
            mask.set(x, 0, true);
        }
        let row = BitmapPacker::new(BitOrder::LsbFirst).pack_row(&mask, 0);
        assert!(row.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_all_mark_msb_scenario() {
        let rows = BitmapPacker::new(BitOrder::MsbFirst).pack_mask(&BinaryMask::new(384, 200, true));
        assert_eq!(rows.len(), 200);
        assert_eq!(rows[0], vec![0xFF; 48]);
        assert_eq!(rows[199], vec![0xFF; 48]);
    }

    #[test]
    fn test_pack_grayscale_uses_mark_level() {
        let gray = GrayscaleBuffer::from_raw(3, 1, vec![127, 128, 0]).unwrap();
        let row = &BitmapPacker::new(BitOrder::LsbFirst).pack(&gray)[0];
        assert_eq!(row[0], 0b0000_0101);
    }

    #[test]
    fn test_pack_rows_pads_height() {
        let rows = BitmapPacker::new(BitOrder::LsbFirst).pack_rows(&BinaryMask::new(8, 2, true), 5);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1][0], 0xFF);
        assert_eq!(rows[4], vec![0; 48]);
    }
}
