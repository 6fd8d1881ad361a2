//! # Cat Printer Protocol Implementation
//!
//! This module provides low-level builders for the binary protocol spoken by
//! cheap BLE thermal printers (X5, GB01/GB02 and relatives).
//!
//! ## Module Structure
//!
//! - [`bitmap`]: Packs masks into 48-byte raster rows
//! - [`checksum`]: CRC-8 and XOR checksums
//! - [`framing`]: Frame layouts (Variant A / Variant B)
//! - [`commands`]: Opcode builders (energy, lattice, draw, feed...)
//!
//! ## Usage Example
//!
//! ```
//! use catprint::protocol::{bitmap, commands, framing::FramingStrategy};
//!
//! let framing = FramingStrategy::VARIANT_A;
//! let mut data = Vec::new();
//!
//! data.extend(commands::set_energy(&framing, 8000).bytes);
//! data.extend(commands::set_lattice(&framing, &commands::LATTICE_START).bytes);
//!
//! // One black row
//! let row = vec![0xFF; bitmap::BYTES_PER_LINE];
//! data.extend(commands::draw_bitmap_line(&framing, &row, commands::LinePrefix::None, 0).bytes);
//!
//! data.extend(commands::feed_paper(&framing, 1).bytes);
//! data.extend(commands::set_lattice(&framing, &commands::LATTICE_END).bytes);
//!
//! // Send `data` to the printer characteristic...
//! ```

pub mod bitmap;
pub mod checksum;
pub mod commands;
pub mod framing;
