//! # Cat Printer Commands
//!
//! Command builders for the `0x51 0x78` printer family (X5, GB01/GB02,
//! MX-series). The protocol is undocumented; opcodes and payloads come from
//! captured traffic.
//!
//! ## Opcodes
//!
//! | Opcode | Command | Payload |
//! |--------|---------|---------|
//! | 0xA0 | Retract paper | rows, 0x00 |
//! | 0xA1 | Feed paper | rows, 0x00 |
//! | 0xA2 | Draw bitmap line | [prefix] + 48 bytes |
//! | 0xA3 | Get status | 0x00 |
//! | 0xA4 | Print quality | quality bytes |
//! | 0xA6 | Lattice control | 11-byte magic blob |
//! | 0xA8 | Get device info | 0x00 |
//! | 0xAE | Flow control | - |
//! | 0xAF | Energy (heat) | u16 little-endian |
//! | 0xBD | Speed | speed byte |
//! | 0xBE | Drawing mode | 0x00 = image |
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 8000 (0x1F40) is sent as bytes `[0x40, 0x1F]`
//!
//! Every builder takes the profile's [`FramingStrategy`] so the same command
//! can be emitted in either frame layout.

use serde::{Deserialize, Serialize};

use super::bitmap::BYTES_PER_LINE;
use super::framing::{CommandPacket, FramingStrategy};

pub const CMD_RETRACT_PAPER: u8 = 0xA0;
pub const CMD_FEED_PAPER: u8 = 0xA1;
pub const CMD_DRAW_BITMAP: u8 = 0xA2;
pub const CMD_GET_STATUS: u8 = 0xA3;
pub const CMD_QUALITY: u8 = 0xA4;
pub const CMD_LATTICE: u8 = 0xA6;
pub const CMD_GET_INFO: u8 = 0xA8;
pub const CMD_FLOW_CONTROL: u8 = 0xAE;
pub const CMD_ENERGY: u8 = 0xAF;
pub const CMD_SPEED: u8 = 0xBD;
pub const CMD_DRAWING_MODE: u8 = 0xBE;

/// Drawing mode payload selecting bitmap (image) mode.
pub const DRAWING_MODE_IMAGE: u8 = 0x00;

/// Lattice start blob sent before the first row.
pub const LATTICE_START: [u8; 11] = [0xAA, 0x55, 0x17, 0x38, 0x44, 0x5F, 0x5F, 0x5F, 0x44, 0x38, 0x2C];

/// Lattice end blob sent after the last feed.
pub const LATTICE_END: [u8; 11] = [0xAA, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17];

/// Default heat energy. Printers accept roughly 8000-17500.
pub const DEFAULT_ENERGY: u16 = 8000;

/// Optional bytes placed before each row's bitmap data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinePrefix {
    /// Bitmap data only
    #[default]
    None,
    /// Row index as little-endian u16
    LineNumber,
    /// Row width in bytes
    Width,
}

/// Convert a u16 to little-endian bytes
#[inline]
pub fn u16_le(n: u16) -> [u8; 2] {
    n.to_le_bytes()
}

/// # Set Heat Energy (0xAF)
///
/// Higher values burn darker and print slower.
pub fn set_energy(framing: &FramingStrategy, level: u16) -> CommandPacket {
    framing.frame(CMD_ENERGY, &u16_le(level))
}

/// # Lattice Control (0xA6)
///
/// The payload is an opaque vendor blob, sent verbatim.
pub fn set_lattice(framing: &FramingStrategy, blob: &[u8]) -> CommandPacket {
    framing.frame(CMD_LATTICE, blob)
}

/// # Print Quality (0xA4)
pub fn set_quality(framing: &FramingStrategy, quality: &[u8]) -> CommandPacket {
    framing.frame(CMD_QUALITY, quality)
}

/// # Drawing Mode (0xBE)
pub fn set_drawing_mode(framing: &FramingStrategy, mode: u8) -> CommandPacket {
    framing.frame(CMD_DRAWING_MODE, &[mode])
}

/// # Draw Bitmap Line (0xA2)
///
/// The row is truncated or zero-padded to exactly 48 bytes, then the
/// profile's line prefix (if any) is prepended.
///
/// ## Example
///
/// ```
/// use catprint::protocol::commands::{self, LinePrefix};
/// use catprint::protocol::framing::FramingStrategy;
///
/// let row = [0xFFu8; 10];
/// let p = commands::draw_bitmap_line(&FramingStrategy::VARIANT_A, &row, LinePrefix::None, 0);
/// assert_eq!(p.payload.len(), 48);
/// assert_eq!(&p.payload[..10], &[0xFF; 10]);
/// ```
pub fn draw_bitmap_line(framing: &FramingStrategy, row: &[u8], prefix: LinePrefix, line: u16) -> CommandPacket {
    let mut payload = Vec::with_capacity(BYTES_PER_LINE + 2);
    match prefix {
        LinePrefix::None => {}
        LinePrefix::LineNumber => payload.extend_from_slice(&u16_le(line)),
        LinePrefix::Width => payload.push(BYTES_PER_LINE as u8),
    }
    let take = row.len().min(BYTES_PER_LINE);
    payload.extend_from_slice(&row[..take]);
    payload.resize(payload.len() + (BYTES_PER_LINE - take), 0);
    framing.frame(CMD_DRAW_BITMAP, &payload)
}

/// # Feed Paper (0xA1)
///
/// Advances `rows` dot rows. One row is 1/8 mm at 203 DPI.
pub fn feed_paper(framing: &FramingStrategy, rows: u8) -> CommandPacket {
    framing.frame(CMD_FEED_PAPER, &[rows, 0x00])
}

/// # Retract Paper (0xA0)
pub fn retract_paper(framing: &FramingStrategy, rows: u8) -> CommandPacket {
    framing.frame(CMD_RETRACT_PAPER, &[rows, 0x00])
}

/// # Get Status (0xA3)
pub fn get_status(framing: &FramingStrategy) -> CommandPacket {
    framing.frame(CMD_GET_STATUS, &[0x00])
}

/// # Get Device Info (0xA8)
pub fn get_info(framing: &FramingStrategy) -> CommandPacket {
    framing.frame(CMD_GET_INFO, &[0x00])
}

/// # Print Speed (0xBD)
pub fn set_speed(framing: &FramingStrategy, speed: u8) -> CommandPacket {
    framing.frame(CMD_SPEED, &[speed])
}
